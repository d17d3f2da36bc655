pub mod rpc_impl;
pub mod rpc_types;

pub mod convert;
pub mod discover;
pub mod host;
pub mod marshaller;
pub mod resolve;
pub mod schema;
pub mod synth;
pub mod type_model;
