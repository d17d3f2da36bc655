use std::sync::Arc;

use crate::proto::resolve::{OperationResolver, ResolvedOperation};
use crate::proto::rpc_types::descriptor::ServiceDescriptor;
use crate::proto::rpc_types::error::Error;

use super::route_table::{MethodRouteEntry, RouteTable};

#[derive(Debug, Default)]
pub struct BindOutcome {
    pub table: RouteTable,
    /// Operations that could not be bound. They are absent from `table`.
    pub errors: Vec<Error>,
}

pub struct MethodBinder {
    resolver: Arc<OperationResolver>,
}

impl MethodBinder {
    pub fn new(resolver: Arc<OperationResolver>) -> Self {
        Self { resolver }
    }

    /// Builds the route table of one service. A failing operation is reported and skipped,
    /// the remaining ones are still bound.
    pub fn bind(&self, service: &ServiceDescriptor) -> BindOutcome {
        let (resolved, errors) = self.resolver.resolve_all(service);
        let entries = resolved
            .iter()
            .map(|r| Self::route_entry(service, r))
            .collect();
        let table = RouteTable::new(entries);
        tracing::info!(
            service = %service.proto_name(),
            routes = table.len(),
            errors = errors.len(),
            "service bound"
        );
        BindOutcome { table, errors }
    }

    fn route_entry(service: &ServiceDescriptor, r: &ResolvedOperation) -> MethodRouteEntry {
        MethodRouteEntry {
            full_path: r.path.clone(),
            service: service.proto_name(),
            method: r.operation.name.clone(),
            request_type: r.request.name.clone(),
            response_type: r.response.name.clone(),
            shape: r.operation.shape,
        }
    }
}
