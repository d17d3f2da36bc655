//! Service contract discovery.
//!
//! Resolves a candidate (an interface, or a class implementing one) to the service interface
//! it stands for, walks that interface's inheritance closure and classifies every eligible
//! method into one of the four RPC shapes. Independent failures are collected in the
//! [`DiscoveryReport`] instead of aborting the whole service.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::host::{Candidate, ContractSet, InterfaceDef, MethodDef, TypeExpr, TypeRef};
use super::rpc_types::descriptor::{
    MethodShape, OperationDescriptor, ParameterDescriptor, ServiceDescriptor,
};
use super::rpc_types::error::{Error, Result};
use crate::common::constants::DEFAULT_INTERFACE_PREFIX;

/// Decides which interfaces and methods form the RPC surface and what they are called.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait ContractConvention: Send + Sync {
    fn is_service_contract(&self, iface: &InterfaceDef) -> bool;

    /// Canonical name of a service interface.
    fn service_name(&self, iface: &InterfaceDef) -> String;

    /// Canonical name of an operation, or `None` when the method is not one.
    fn operation_name(&self, method: &MethodDef) -> Option<String>;

    /// The interface name a class is expected to implement, used to break ties.
    fn conventional_interface(&self, class_name: &str) -> String {
        format!("{}{}", DEFAULT_INTERFACE_PREFIX, class_name)
    }
}

/// Tag-driven convention: services and operations are whatever carries the matching tag.
#[derive(Clone, Debug)]
pub struct AttributeConvention {
    pub interface_prefix: String,
    /// When false every method of a service interface is an operation unless it opts out.
    pub require_operation_tag: bool,
}

impl Default for AttributeConvention {
    fn default() -> Self {
        Self {
            interface_prefix: DEFAULT_INTERFACE_PREFIX.to_string(),
            require_operation_tag: true,
        }
    }
}

impl AttributeConvention {
    fn strip_prefix<'a>(&self, name: &'a str) -> &'a str {
        match name.strip_prefix(self.interface_prefix.as_str()) {
            Some(rest)
                if !self.interface_prefix.is_empty()
                    && rest.chars().next().is_some_and(char::is_uppercase) =>
            {
                rest
            }
            _ => name,
        }
    }
}

impl ContractConvention for AttributeConvention {
    fn is_service_contract(&self, iface: &InterfaceDef) -> bool {
        iface.service.is_some()
    }

    fn service_name(&self, iface: &InterfaceDef) -> String {
        match iface.service.as_ref().and_then(|s| s.name.clone()) {
            Some(name) => name,
            None => self.strip_prefix(&iface.name).to_string(),
        }
    }

    fn operation_name(&self, method: &MethodDef) -> Option<String> {
        match &method.operation {
            Some(op) if op.ignore => None,
            Some(op) => Some(op.name.clone().unwrap_or_else(|| method.name.clone())),
            None if self.require_operation_tag => None,
            None => Some(method.name.clone()),
        }
    }

    fn conventional_interface(&self, class_name: &str) -> String {
        format!("{}{}", self.interface_prefix, class_name)
    }
}

/// Schema package for a namespace: anything outside `[A-Za-z0-9_.]` becomes `_`.
pub fn normalize_package(namespace: &str) -> String {
    namespace
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug)]
pub struct DiscoveryReport {
    pub service: Arc<ServiceDescriptor>,
    /// Per-operation failures; the affected operations are absent from `service`.
    pub errors: Vec<Error>,
}

/// One interface of the closure with its generic parameters resolved.
struct BoundInterface<'a> {
    def: &'a InterfaceDef,
    bound: HashMap<String, TypeRef>,
    unbound: Vec<String>,
}

impl BoundInterface<'_> {
    fn key(&self) -> String {
        let mut args: Vec<_> = self
            .bound
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        args.sort();
        format!("{}<{}>", self.def.name, args.join(","))
    }

    fn resolve(&self, ty: &TypeRef) -> TypeRef {
        ty.substitute(&self.bound, &self.unbound)
    }
}

pub struct Discoverer {
    contracts: Arc<ContractSet>,
    convention: Arc<dyn ContractConvention>,
    package: Option<String>,
}

impl Discoverer {
    pub fn new(
        contracts: Arc<ContractSet>,
        convention: Arc<dyn ContractConvention>,
        package: Option<String>,
    ) -> Self {
        Self {
            contracts,
            convention,
            package,
        }
    }

    pub fn contracts(&self) -> &Arc<ContractSet> {
        &self.contracts
    }

    /// Discovers the service a candidate type stands for.
    pub fn discover(&self, candidate: &str) -> Result<DiscoveryReport> {
        let root = match self.contracts.candidate(candidate) {
            Some(Candidate::Class(class)) => self.resolve_class(&class.name, &class.implements)?,
            Some(Candidate::Interface(iface)) => {
                if !self.convention.is_service_contract(iface) {
                    return Err(Error::Contract(format!(
                        "{} is not marked as a service contract",
                        iface.name
                    )));
                }
                BoundInterface {
                    def: iface,
                    bound: HashMap::new(),
                    unbound: iface.generics.clone(),
                }
            }
            None => {
                return Err(Error::InvalidInput(format!(
                    "unknown contract type {}",
                    candidate
                )))
            }
        };

        let mut errors = Vec::new();
        let service = self.describe_service(&root, &mut errors, &mut Vec::new())?;
        tracing::info!(
            candidate,
            service = %service.proto_name(),
            operations = service.operations.len(),
            errors = errors.len(),
            "service discovered"
        );
        Ok(DiscoveryReport {
            service: Arc::new(service),
            errors,
        })
    }

    fn resolve_class(&self, class: &str, implements: &[TypeExpr]) -> Result<BoundInterface<'_>> {
        let mut tagged: Vec<BoundInterface<'_>> = Vec::new();
        for expr in implements {
            let bound = self.bind(expr, &HashMap::new(), &[])?;
            let inherited = self.closure(&bound)?;
            for iface in std::iter::once(bound).chain(inherited) {
                if self.convention.is_service_contract(iface.def)
                    && !tagged.iter().any(|t| t.key() == iface.key())
                {
                    tagged.push(iface);
                }
            }
        }

        if tagged.len() > 1 {
            let expected = self.convention.conventional_interface(class);
            tagged.retain(|b| b.def.name == expected);
            if tagged.len() != 1 {
                return Err(Error::Contract(format!(
                    "class {} implements more than one service contract and none is named {}; \
                     pass the interface to discover directly",
                    class, expected
                )));
            }
        }
        tagged.pop().ok_or_else(|| {
            Error::Contract(format!("service interface not found for class {}", class))
        })
    }

    /// Binds a base or implemented interface expression in the context of its referrer.
    fn bind(
        &self,
        expr: &TypeExpr,
        outer: &HashMap<String, TypeRef>,
        outer_unbound: &[String],
    ) -> Result<BoundInterface<'_>> {
        let def = self.contracts.interface(&expr.name).ok_or_else(|| {
            Error::InvalidInput(format!("unknown interface {}", expr.name))
        })?;
        if def.generics.len() != expr.args.len() {
            return Err(Error::Contract(format!(
                "{} expects {} type arguments, got {}",
                def.name,
                def.generics.len(),
                expr.args.len()
            )));
        }
        let mut bound = HashMap::new();
        for (param, arg) in def.generics.iter().zip(&expr.args) {
            let ty: TypeRef = arg.to_string().parse()?;
            bound.insert(param.clone(), ty.substitute(outer, outer_unbound));
        }
        Ok(BoundInterface {
            def,
            bound,
            unbound: Vec::new(),
        })
    }

    /// Collects the closure of `root` in depth-first order, root first.
    fn closure<'a>(&'a self, root: &BoundInterface<'a>) -> Result<Vec<BoundInterface<'a>>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(root.key());
        let mut stack = vec![(
            root.def.name.clone(),
            root.def.bases.clone(),
            root.bound.clone(),
            root.unbound.clone(),
        )];
        while let Some((from, bases, outer, outer_unbound)) = stack.pop() {
            for expr in bases.iter().rev() {
                let base = self.bind(expr, &outer, &outer_unbound)?;
                if base.def.name == root.def.name || base.def.name == from {
                    return Err(Error::Contract(format!(
                        "interface {} inherits from itself",
                        base.def.name
                    )));
                }
                if !seen.insert(base.key()) {
                    continue;
                }
                stack.push((
                    base.def.name.clone(),
                    base.def.bases.clone(),
                    base.bound.clone(),
                    base.unbound.clone(),
                ));
                out.push(base);
            }
        }
        Ok(out)
    }

    fn describe_service(
        &self,
        root: &BoundInterface<'_>,
        errors: &mut Vec<Error>,
        lineage: &mut Vec<String>,
    ) -> Result<ServiceDescriptor> {
        if lineage.contains(&root.def.name) {
            return Err(Error::Contract(format!(
                "interface {} inherits from itself",
                root.def.name
            )));
        }
        lineage.push(root.def.name.clone());

        let name = self.convention.service_name(root.def);
        let package = match &self.package {
            Some(package) => package.clone(),
            None => normalize_package(self.contracts.namespace_of(&root.def.namespace)),
        };
        let mut service = ServiceDescriptor {
            name,
            package,
            source_interface: root.def.name.clone(),
            operations: Vec::new(),
            base_services: Vec::new(),
        };

        let closure = self.closure(root)?;
        let mut operations: BTreeMap<String, OperationDescriptor> = BTreeMap::new();
        let mut ambiguous = HashSet::new();
        for iface in std::iter::once(root).chain(closure.iter()) {
            if !self.convention.is_service_contract(iface.def) {
                tracing::debug!(interface = %iface.def.name, "not a service contract, skipped");
                continue;
            }
            for method in &iface.def.methods {
                let Some(op_name) = self.convention.operation_name(method) else {
                    continue;
                };
                let path = format!("/{}/{}", service.proto_name(), op_name);
                let op = match self.classify(iface, method, op_name) {
                    Ok(Some(op)) => op,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(%path, %e, "operation rejected");
                        errors.push(e.in_operation(path));
                        continue;
                    }
                };
                if ambiguous.contains(&op.name) {
                    continue;
                }
                match operations.get(&op.name) {
                    Some(existing)
                        if existing.declaring_interface == op.declaring_interface
                            && existing.method_name != op.method_name =>
                    {
                        errors.push(Error::Contract(format!(
                            "methods {} and {} of {} both map to operation {}",
                            existing.method_name, op.method_name, op.declaring_interface, op.name
                        )));
                        ambiguous.insert(op.name.clone());
                        operations.remove(&op.name);
                    }
                    Some(existing) if existing.same_signature(&op) => {}
                    Some(existing) => {
                        errors.push(Error::Contract(format!(
                            "operation {} of service {} is declared with different signatures on {} and {}",
                            op.name, service.name, existing.declaring_interface, op.declaring_interface
                        )));
                        ambiguous.insert(op.name.clone());
                        operations.remove(&op.name);
                    }
                    None => {
                        operations.insert(op.name.clone(), op);
                    }
                }
            }
        }
        service.operations = operations.into_values().collect();

        for expr in &root.def.bases {
            let base = self.bind(expr, &root.bound, &root.unbound)?;
            if self.convention.is_service_contract(base.def) {
                // errors of bases are already part of the flattened pass above
                let described = self.describe_service(&base, &mut Vec::new(), lineage)?;
                service.base_services.push(Arc::new(described));
            }
        }

        lineage.pop();
        Ok(service)
    }

    /// Maps a method signature to an operation. `Ok(None)` skips methods that still mention
    /// an unbound generic parameter.
    fn classify(
        &self,
        iface: &BoundInterface<'_>,
        method: &MethodDef,
        name: String,
    ) -> Result<Option<OperationDescriptor>> {
        let shape_error = |reason: &str| Error::ShapeClassification {
            operation: name.clone(),
            reason: reason.to_string(),
        };

        let mut params: Vec<ParameterDescriptor> = method
            .params
            .iter()
            .map(|p| ParameterDescriptor {
                name: p.name.clone(),
                ty: iface.resolve(&p.ty),
            })
            .collect();
        while params.last().is_some_and(|p| p.ty.is_call_context()) {
            params.pop();
        }
        if params.iter().any(|p| p.ty.is_call_context()) {
            return Err(shape_error("call context must be the trailing parameter"));
        }

        let returns = iface.resolve(&method.returns);
        if returns.contains_generic() || params.iter().any(|p| p.ty.contains_generic()) {
            tracing::debug!(method = %method.name, "skipping open generic method");
            return Ok(None);
        }

        let (response, response_streamed) = match returns {
            TypeRef::Void | TypeRef::Task(None) => (TypeRef::Void, false),
            TypeRef::Task(Some(inner)) => match *inner {
                TypeRef::Stream(_) => {
                    return Err(shape_error("an awaited stream is not a valid response"))
                }
                TypeRef::Task(_) => return Err(shape_error("nested tasks are not supported")),
                inner => (inner, false),
            },
            TypeRef::Stream(inner) => (*inner, true),
            other => (other, false),
        };
        if response.is_call_context() {
            return Err(shape_error("call context is not a valid response"));
        }
        if has_nested_async(&response) {
            return Err(shape_error("conflicting streaming markers on the response"));
        }

        let streamed: Vec<_> = params
            .iter()
            .filter(|p| matches!(p.ty, TypeRef::Stream(_)))
            .collect();
        let request_streamed = match (streamed.len(), params.len()) {
            (0, _) => false,
            (1, 1) => true,
            (1, _) => {
                return Err(shape_error(
                    "a streamed request cannot be combined with other parameters",
                ))
            }
            _ => return Err(shape_error("more than one streamed parameter")),
        };
        if request_streamed {
            let element = match &params[0].ty {
                TypeRef::Stream(inner) => (**inner).clone(),
                other => other.clone(),
            };
            params[0].ty = element;
        }
        if params.iter().any(|p| has_nested_async(&p.ty) || matches!(p.ty, TypeRef::Task(_))) {
            return Err(shape_error("conflicting streaming markers on a parameter"));
        }
        if request_streamed && matches!(params[0].ty, TypeRef::Void) {
            return Err(shape_error("stream of void"));
        }

        Ok(Some(OperationDescriptor {
            name,
            method_name: method.name.clone(),
            declaring_interface: iface.def.name.clone(),
            shape: MethodShape::from_streaming(request_streamed, response_streamed),
            parameters: params,
            response,
        }))
    }
}

/// Whether a payload type still carries a `stream` or `task` marker inside it.
fn has_nested_async(ty: &TypeRef) -> bool {
    match ty {
        TypeRef::Stream(_) | TypeRef::Task(_) => true,
        TypeRef::List(inner) => has_nested_async(inner),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discoverer(src: &str) -> Discoverer {
        Discoverer::new(
            Arc::new(ContractSet::from_toml(src).unwrap()),
            Arc::new(AttributeConvention::default()),
            None,
        )
    }

    const CLASSES: &str = r#"
namespace = "Demo-Contracts"

[[interface]]
name = "IA"
service = {}

[[interface]]
name = "IB"
service = {}

[[interface]]
name = "IPlain"

[[class]]
name = "OnlyPlain"
implements = ["IPlain"]

[[class]]
name = "Single"
implements = ["IPlain", "IA"]

[[class]]
name = "A"
implements = ["IA", "IB"]

[[class]]
name = "Both"
implements = ["IA", "IB"]

[[interface]]
name = "IDerived"
service = {}
bases = ["IB"]

[[class]]
name = "Impl"
implements = ["IDerived"]

[[class]]
name = "Derived"
implements = ["IDerived"]
"#;

    #[rstest::rstest]
    #[case("Single", Some("IA"))]
    #[case("A", Some("IA"))]
    #[case("OnlyPlain", None)]
    #[case("Both", None)]
    #[case("Impl", None)]
    #[case("Derived", Some("IDerived"))]
    #[case("IPlain", None)]
    fn class_resolution(#[case] candidate: &str, #[case] expected: Option<&str>) {
        let d = discoverer(CLASSES);
        match (d.discover(candidate), expected) {
            (Ok(report), Some(iface)) => {
                assert_eq!(report.service.source_interface, iface);
                assert_eq!(report.service.package, "Demo_Contracts");
            }
            (Err(Error::Contract(_)), None) => {}
            (other, _) => panic!("unexpected result {:?}", other.map(|r| r.service)),
        }
    }

    #[rstest::rstest]
    #[case("IMyService", "MyService")]
    #[case("Item", "Item")]
    #[case("I", "I")]
    #[case("Greeter", "Greeter")]
    fn service_names_strip_prefix(#[case] iface: &str, #[case] expected: &str) {
        let convention = AttributeConvention::default();
        let def = InterfaceDef {
            name: iface.to_string(),
            namespace: None,
            generics: vec![],
            service: Some(Default::default()),
            bases: vec![],
            methods: vec![],
        };
        assert_eq!(convention.service_name(&def), expected);
    }

    const SHAPES: &str = r#"
namespace = "Demo"

[[message]]
name = "Req"
fields = [{ name = "Id", type = "int32" }]

[[interface]]
name = "IShapes"
service = { name = "Shapes" }

[[interface.method]]
name = "Unary"
operation = {}
params = [{ name = "req", type = "Req" }, { name = "ctx", type = "context" }]
returns = "task<Req>"

[[interface.method]]
name = "Upload"
operation = { name = "Push" }
params = [{ name = "items", type = "stream<Req>" }, { name = "token", type = "cancellation" }]
returns = "Req"

[[interface.method]]
name = "Watch"
operation = {}
params = [{ name = "req", type = "Req" }]
returns = "stream<Req>"

[[interface.method]]
name = "Chat"
operation = {}
params = [{ name = "items", type = "stream<Req>" }]
returns = "stream<Req>"

[[interface.method]]
name = "Helper"
params = [{ name = "req", type = "Req" }]

[[interface.method]]
name = "BadContext"
operation = {}
params = [{ name = "ctx", type = "context" }, { name = "req", type = "Req" }]

[[interface.method]]
name = "BadStreams"
operation = {}
params = [{ name = "a", type = "stream<Req>" }, { name = "b", type = "stream<Req>" }]

[[interface.method]]
name = "BadMix"
operation = {}
params = [{ name = "a", type = "stream<Req>" }, { name = "b", type = "int32" }]

[[interface.method]]
name = "BadTask"
operation = {}
returns = "task<stream<Req>>"

[[interface.method]]
name = "BadList"
operation = {}
returns = "list<stream<Req>>"
"#;

    #[test]
    fn shapes_are_classified() {
        let report = discoverer(SHAPES).discover("IShapes").unwrap();
        let svc = &report.service;
        assert_eq!(svc.proto_name(), "Demo.Shapes");
        let shapes: Vec<_> = svc.operations.iter().map(|o| (o.name.as_str(), o.shape)).collect();
        assert_eq!(
            shapes,
            vec![
                ("Chat", MethodShape::Duplex),
                ("Push", MethodShape::ClientStreaming),
                ("Unary", MethodShape::Unary),
                ("Watch", MethodShape::ServerStreaming),
            ]
        );
        let push = svc.operation("Push").unwrap();
        assert_eq!(push.method_name, "Upload");
        assert_eq!(push.parameters.len(), 1);
        assert_eq!(push.parameters[0].ty, TypeRef::named("Req"));
        assert_eq!(svc.operation("Unary").unwrap().parameters.len(), 1);
    }

    #[test]
    fn shape_errors_are_collected_per_operation() {
        let report = discoverer(SHAPES).discover("IShapes").unwrap();
        let mut failed: Vec<_> = report
            .errors
            .iter()
            .map(|e| {
                assert!(matches!(e.root(), Error::ShapeClassification { .. }));
                e.operation_path().unwrap().to_string()
            })
            .collect();
        failed.sort();
        assert_eq!(
            failed,
            vec![
                "/Demo.Shapes/BadContext",
                "/Demo.Shapes/BadList",
                "/Demo.Shapes/BadMix",
                "/Demo.Shapes/BadStreams",
                "/Demo.Shapes/BadTask",
            ]
        );
    }

    #[test]
    fn implicit_operations() {
        let src = r#"
[[interface]]
name = "ICalc"
service = {}

[[interface.method]]
name = "Add"
params = [{ name = "x", type = "int32" }, { name = "y", type = "int32" }]
returns = "int32"

[[interface.method]]
name = "Internal"
operation = { ignore = true }
"#;
        let d = Discoverer::new(
            Arc::new(ContractSet::from_toml(src).unwrap()),
            Arc::new(AttributeConvention {
                require_operation_tag: false,
                ..Default::default()
            }),
            Some("calc.v1".to_string()),
        );
        let svc = d.discover("ICalc").unwrap().service;
        assert_eq!(svc.proto_name(), "calc.v1.Calc");
        assert_eq!(svc.operations.len(), 1);
        assert_eq!(svc.operations[0].name, "Add");
    }

    const INHERITED: &str = r#"
namespace = "Demo"

[[message]]
name = "MyRequest"

[[message]]
name = "MyResponse"

[[interface]]
name = "ISomeGenericService"
generics = ["TRequest", "TResponse"]
service = {}

[[interface.method]]
name = "SomeGenericMethod"
operation = {}
params = [{ name = "request", type = "TRequest" }]
returns = "task<TResponse>"

[[interface]]
name = "INotAService"

[[interface.method]]
name = "NotAServiceMethod"
operation = {}

[[interface]]
name = "IInherited"
service = {}
bases = ["ISomeGenericService<MyRequest, MyResponse>", "INotAService"]

[[interface.method]]
name = "InheritedMethod"
operation = {}
params = [{ name = "request", type = "MyRequest" }]
returns = "MyResponse"

[[interface.method]]
name = "SomeGenericMethod"
operation = {}
params = [{ name = "request", type = "MyRequest" }]
returns = "MyResponse"
"#;

    #[test]
    fn inherited_operations_are_pooled() {
        let report = discoverer(INHERITED).discover("IInherited").unwrap();
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        let svc = &report.service;
        let names: Vec<_> = svc.operations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["InheritedMethod", "SomeGenericMethod"]);

        let generic = svc.operation("SomeGenericMethod").unwrap();
        assert_eq!(generic.response, TypeRef::named("MyResponse"));
        assert_eq!(svc.base_services.len(), 1);
        assert_eq!(svc.base_services[0].name, "SomeGenericService");
        assert_eq!(svc.base_services[0].operations.len(), 1);
    }

    #[test]
    fn open_generic_service_has_no_operations() {
        let report = discoverer(INHERITED).discover("ISomeGenericService").unwrap();
        assert!(report.service.operations.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn conflicting_inherited_signatures_are_ambiguous() {
        let src = r#"
[[message]]
name = "MyRequest"

[[interface]]
name = "IBase"
service = {}

[[interface.method]]
name = "Get"
operation = {}
params = [{ name = "request", type = "MyRequest" }]

[[interface]]
name = "IDerived"
service = {}
bases = ["IBase"]

[[interface.method]]
name = "Get"
operation = {}
returns = "MyRequest"

[[interface.method]]
name = "Other"
operation = {}
"#;
        let report = discoverer(src).discover("IDerived").unwrap();
        let names: Vec<_> = report
            .service
            .operations
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(names, vec!["Other"]);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], Error::Contract(_)));
    }

    #[test]
    fn overrides_mapping_two_methods_to_one_operation() {
        let src = r#"
[[message]]
name = "MyRequest"

[[interface]]
name = "IStore"
service = {}

[[interface.method]]
name = "Get"
operation = {}
params = [{ name = "request", type = "MyRequest" }]

[[interface.method]]
name = "Fetch"
operation = { name = "Get" }
params = [{ name = "request", type = "MyRequest" }]

[[interface.method]]
name = "Put"
operation = {}
params = [{ name = "request", type = "MyRequest" }]
"#;
        let report = discoverer(src).discover("IStore").unwrap();
        let names: Vec<_> = report
            .service
            .operations
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(names, vec!["Put"]);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], Error::Contract(_)));
    }

    #[test]
    fn unknown_candidate() {
        assert!(matches!(
            discoverer(CLASSES).discover("Missing"),
            Err(Error::InvalidInput(_))
        ));
    }
}
