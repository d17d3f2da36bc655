pub const PROTOBIND_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Marker stripped from interface names when deriving service names.
pub const DEFAULT_INTERFACE_PREFIX: &str = "I";

pub const DEFAULT_LOG_LEVEL: &str = "warn";
