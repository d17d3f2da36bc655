//! Descriptors for discovered services and the operations they expose.
//!
//! A [`ServiceDescriptor`] is the output of contract discovery and the shared input of the
//! method binder and the schema generator. It is immutable once built.
use std::fmt;
use std::sync::Arc;

use crate::proto::host::TypeRef;

/// The four RPC shapes, derived from whether each side of a method is streamed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MethodShape {
    Unary,
    ClientStreaming,
    ServerStreaming,
    Duplex,
}

impl MethodShape {
    pub fn from_streaming(request_streamed: bool, response_streamed: bool) -> Self {
        match (request_streamed, response_streamed) {
            (false, false) => MethodShape::Unary,
            (true, false) => MethodShape::ClientStreaming,
            (false, true) => MethodShape::ServerStreaming,
            (true, true) => MethodShape::Duplex,
        }
    }

    pub fn request_streamed(&self) -> bool {
        matches!(self, MethodShape::ClientStreaming | MethodShape::Duplex)
    }

    pub fn response_streamed(&self) -> bool {
        matches!(self, MethodShape::ServerStreaming | MethodShape::Duplex)
    }
}

impl fmt::Display for MethodShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MethodShape::Unary => "unary",
            MethodShape::ClientStreaming => "client-streaming",
            MethodShape::ServerStreaming => "server-streaming",
            MethodShape::Duplex => "duplex",
        };
        f.write_str(s)
    }
}

/// A meaningful operation parameter, with call-context parameters already stripped.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParameterDescriptor {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationDescriptor {
    /// Canonical operation name, used in the route path and the rpc line.
    pub name: String,
    /// Name of the host method the operation was discovered on.
    pub method_name: String,
    /// The interface that declared the method.
    pub declaring_interface: String,
    pub shape: MethodShape,
    /// Request parameters. For streamed requests this is the single stream element.
    pub parameters: Vec<ParameterDescriptor>,
    /// Response payload with any `task` and `stream` wrapper removed.
    pub response: TypeRef,
}

impl OperationDescriptor {
    /// Whether two operations describe the same remote signature.
    pub fn same_signature(&self, other: &OperationDescriptor) -> bool {
        self.name == other.name
            && self.shape == other.shape
            && self.response == other.response
            && self.parameters.iter().map(|p| &p.ty).eq(other.parameters.iter().map(|p| &p.ty))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Canonical service name.
    pub name: String,
    /// Schema package the service lives in; empty when the contract has no namespace.
    pub package: String,
    pub source_interface: String,
    /// Operations pooled from the whole inheritance closure, sorted by name.
    pub operations: Vec<OperationDescriptor>,
    /// Tagged base interfaces, each described as a service of its own.
    pub base_services: Vec<Arc<ServiceDescriptor>>,
}

impl ServiceDescriptor {
    /// The package-qualified service name, as it appears in route paths.
    pub fn proto_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    pub fn route_path(&self, op: &OperationDescriptor) -> String {
        format!("/{}/{}", self.proto_name(), op.name)
    }

    pub fn operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|op| op.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    fn shape_from_streaming(#[values(false, true)] req: bool, #[values(false, true)] resp: bool) {
        let shape = MethodShape::from_streaming(req, resp);
        assert_eq!(shape.request_streamed(), req);
        assert_eq!(shape.response_streamed(), resp);
    }

    #[test]
    fn route_path_uses_package() {
        let mut svc = ServiceDescriptor {
            name: "MyService".to_string(),
            package: "Demo.Contracts".to_string(),
            source_interface: "IMyService".to_string(),
            operations: vec![OperationDescriptor {
                name: "Unary".to_string(),
                method_name: "Unary".to_string(),
                declaring_interface: "IMyService".to_string(),
                shape: MethodShape::Unary,
                parameters: vec![],
                response: TypeRef::Void,
            }],
            base_services: vec![],
        };
        let op = svc.operations[0].clone();
        assert_eq!(svc.route_path(&op), "/Demo.Contracts.MyService/Unary");
        svc.package.clear();
        assert_eq!(svc.route_path(&op), "/MyService/Unary");
    }
}
