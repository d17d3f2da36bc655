//! Proto3 schema text generation and the reverse path recovery used to check it.
mod generator;
mod parse;

pub use generator::{GeneratedSchema, SchemaGenerator};
pub use parse::parse_rpc_paths;
