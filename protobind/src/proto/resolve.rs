//! The shared step between binding and schema generation: turning a discovered operation
//! into concrete request/response messages with marshallers attached.
//!
//! Both consumers go through the same [`OperationResolver`], so an operation dropped for one
//! of them is dropped for the other.
use std::sync::Arc;

use super::marshaller::{Marshaller, MarshallerRegistry};
use super::rpc_types::descriptor::{OperationDescriptor, ServiceDescriptor};
use super::rpc_types::error::{Error, Result};
use super::synth::Synthesizer;
use super::type_model::TypeDescriptor;

#[derive(Clone, Debug)]
pub struct ResolvedOperation {
    pub operation: OperationDescriptor,
    pub path: String,
    pub request: Arc<TypeDescriptor>,
    pub response: Arc<TypeDescriptor>,
    pub request_marshaller: Arc<Marshaller>,
    pub response_marshaller: Arc<Marshaller>,
}

pub struct OperationResolver {
    synth: Arc<Synthesizer>,
    marshallers: Arc<MarshallerRegistry>,
}

impl OperationResolver {
    pub fn new(synth: Arc<Synthesizer>, marshallers: Arc<MarshallerRegistry>) -> Self {
        Self { synth, marshallers }
    }

    pub fn synthesizer(&self) -> &Arc<Synthesizer> {
        &self.synth
    }

    pub fn marshallers(&self) -> &Arc<MarshallerRegistry> {
        &self.marshallers
    }

    pub fn resolve(
        &self,
        service: &ServiceDescriptor,
        op: &OperationDescriptor,
    ) -> Result<ResolvedOperation> {
        let path = service.route_path(op);
        let resolve = || -> Result<ResolvedOperation> {
            let request = self.synth.synthesize_request(op)?;
            let response = self.synth.synthesize_response(op)?;
            self.synth.types().ensure_complete(&request)?;
            self.synth.types().ensure_complete(&response)?;
            let request_marshaller = self.marshallers.get_marshaller(&request)?;
            let response_marshaller = self.marshallers.get_marshaller(&response)?;
            Ok(ResolvedOperation {
                operation: op.clone(),
                path: path.clone(),
                request,
                response,
                request_marshaller,
                response_marshaller,
            })
        };
        resolve().map_err(|e| e.in_operation(&path))
    }

    /// Resolves every operation of a service. Failures are returned alongside the
    /// operations that did resolve, in operation order.
    pub fn resolve_all(&self, service: &ServiceDescriptor) -> (Vec<ResolvedOperation>, Vec<Error>) {
        let mut resolved = Vec::with_capacity(service.operations.len());
        let mut errors = Vec::new();
        for op in &service.operations {
            match self.resolve(service, op) {
                Ok(r) => resolved.push(r),
                Err(e) => {
                    tracing::warn!(%e, "operation dropped");
                    errors.push(e);
                }
            }
        }
        (resolved, errors)
    }
}
