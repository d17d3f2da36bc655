use std::sync::Arc;

use crate::proto::discover::{AttributeConvention, ContractConvention};
use crate::proto::marshaller::MarshallerRegistry;

pub mod binder;
pub mod route_table;

/// Collaborators shared by one binding/generation pass.
#[derive(Clone)]
pub struct BinderConfiguration {
    pub convention: Arc<dyn ContractConvention>,
    pub marshallers: Arc<MarshallerRegistry>,
    /// Overrides the package derived from the contract namespace.
    pub package: Option<String>,
}

impl Default for BinderConfiguration {
    fn default() -> Self {
        Self {
            convention: Arc::new(AttributeConvention::default()),
            marshallers: Arc::new(MarshallerRegistry::default()),
            package: None,
        }
    }
}

impl std::fmt::Debug for BinderConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinderConfiguration")
            .field("marshallers", &self.marshallers)
            .field("package", &self.package)
            .finish()
    }
}
