#![allow(dead_code)]

pub mod common;
pub mod proto;

pub use proto::convert::{ContractPass, ConversionReport, Converter, ServiceActivationSource};
pub use proto::host::ContractSet;
pub use proto::rpc_types::error::{Error, Result};
