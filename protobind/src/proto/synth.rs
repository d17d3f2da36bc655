//! Request and response message synthesis.
//!
//! Every RPC carries exactly one message on each side. Operations whose payload is not
//! already a single message get one invented for them here: a `<Method>Parameters` message
//! for multi-parameter requests, a well-known wrapper or `<Enum>Value` for bare scalar and
//! enum responses, and `IEnumerable_<Element>` for bare list responses.
use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use super::host::TypeRef;
use super::rpc_types::descriptor::OperationDescriptor;
use super::rpc_types::error::{Error, Result};
use super::type_model::{
    FieldDescriptor, FieldType, TypeDescriptor, TypeKind, TypeModel, TypeOrigin, WellKnownType,
};

/// Memo key: the declaring interface plus the concrete signature, so generic bases bound
/// differently by two services do not share an entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct OperationKey {
    interface: String,
    method: String,
    signature: String,
}

impl OperationKey {
    fn new(op: &OperationDescriptor) -> Self {
        let params: Vec<String> = op.parameters.iter().map(|p| p.ty.to_string()).collect();
        Self {
            interface: op.declaring_interface.clone(),
            method: op.method_name.clone(),
            signature: format!("{}({}) -> {}", op.shape, params.join(", "), op.response),
        }
    }
}

pub fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct Synthesizer {
    types: Arc<TypeModel>,
    requests: DashMap<OperationKey, Arc<TypeDescriptor>>,
    responses: DashMap<OperationKey, Arc<TypeDescriptor>>,
}

impl Synthesizer {
    pub fn new(types: Arc<TypeModel>) -> Self {
        Self {
            types,
            requests: DashMap::new(),
            responses: DashMap::new(),
        }
    }

    pub fn types(&self) -> &Arc<TypeModel> {
        &self.types
    }

    /// The request message of an operation. Memoized: repeated calls return the same `Arc`.
    pub fn synthesize_request(&self, op: &OperationDescriptor) -> Result<Arc<TypeDescriptor>> {
        let key = OperationKey::new(op);
        if let Some(hit) = self.requests.get(&key) {
            return Ok(hit.value().clone());
        }
        let ret = self
            .requests
            .entry(key)
            .or_try_insert_with(|| self.build_request(op))?;
        Ok(ret.value().clone())
    }

    /// The response message of an operation, wrapping bare values.
    pub fn synthesize_response(&self, op: &OperationDescriptor) -> Result<Arc<TypeDescriptor>> {
        let key = OperationKey::new(op);
        if let Some(hit) = self.responses.get(&key) {
            return Ok(hit.value().clone());
        }
        let ret = self
            .responses
            .entry(key)
            .or_try_insert_with(|| self.build_response(op))?;
        Ok(ret.value().clone())
    }

    fn build_request(&self, op: &OperationDescriptor) -> Result<Arc<TypeDescriptor>> {
        if op.shape.request_streamed() {
            let element = match op.parameters.as_slice() {
                [element] => &element.ty,
                _ => {
                    return Err(Error::ShapeClassification {
                        operation: op.name.clone(),
                        reason: "a streamed request carries exactly one element type".to_string(),
                    })
                }
            };
            return self.streamed_element(op, element);
        }

        match op.parameters.as_slice() {
            [] => return Ok(self.types.well_known(WellKnownType::Empty)),
            [single] => {
                let desc = self.types.describe(&single.ty)?;
                if desc.is_message()
                    || matches!(
                        desc.kind,
                        TypeKind::WellKnown(
                            WellKnownType::Empty | WellKnownType::Timestamp | WellKnownType::Duration
                        )
                    )
                {
                    return Ok(desc);
                }
            }
            _ => {}
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(op.parameters.len());
        for (idx, param) in op.parameters.iter().enumerate() {
            let name = upper_first(&param.name);
            if !seen.insert(name.clone()) {
                return Err(Error::Contract(format!(
                    "parameters of {} map to the same field name {}",
                    op.method_name, name
                )));
            }
            let ty = self.types.field_type(&param.ty)?;
            fields.push(FieldDescriptor::new(name, ty, idx as u32 + 1));
        }
        let name = format!("{}Parameters", op.method_name);
        tracing::debug!(%name, fields = fields.len(), "synthesized request message");
        self.types
            .register(TypeDescriptor::message(name, fields, TypeOrigin::Synthesized))
    }

    fn build_response(&self, op: &OperationDescriptor) -> Result<Arc<TypeDescriptor>> {
        if op.shape.response_streamed() {
            return self.streamed_element(op, &op.response);
        }
        let desc = self.types.describe(&op.response)?;
        let ret = match &desc.kind {
            TypeKind::Message(_) | TypeKind::WellKnown(_) => desc,
            TypeKind::Scalar(s) => self.types.well_known(s.wrapper()),
            TypeKind::Enum(_) => {
                let field = FieldDescriptor::new("value", FieldType::Enum(desc.name.clone()), 1);
                self.types.register(TypeDescriptor::message(
                    format!("{}Value", desc.name),
                    vec![field],
                    TypeOrigin::Synthesized,
                ))?
            }
            TypeKind::RepeatedOf(element) => {
                let item = match &op.response {
                    TypeRef::List(inner) => self.types.field_type(inner)?,
                    other => {
                        return Err(Error::InvalidInput(format!(
                            "{} does not describe a list",
                            other
                        )))
                    }
                };
                let field = FieldDescriptor::new("items", FieldType::Repeated(Box::new(item)), 1);
                let name = format!("IEnumerable_{}", element.short_name());
                tracing::debug!(%name, "synthesized list wrapper");
                self.types.register(TypeDescriptor::message(
                    name,
                    vec![field],
                    TypeOrigin::Synthesized,
                ))?
            }
        };
        Ok(ret)
    }

    fn streamed_element(
        &self,
        op: &OperationDescriptor,
        element: &TypeRef,
    ) -> Result<Arc<TypeDescriptor>> {
        let desc = self.types.describe(element)?;
        if !desc.is_message_like() {
            return Err(Error::ShapeClassification {
                operation: op.name.clone(),
                reason: format!("stream element {} is not a message", element),
            });
        }
        Ok(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::host::ContractSet;
    use crate::proto::rpc_types::descriptor::{MethodShape, ParameterDescriptor};

    const CONTRACTS: &str = r#"
[[enum]]
name = "Category"
values = [{ name = "Default", value = 0 }]

[[message]]
name = "MyRequest"
fields = [{ name = "Id", type = "int32", order = 1 }]

[[message]]
name = "ConferenceOverview"
fields = [{ name = "Title", type = "string", order = 1 }]
"#;

    fn synthesizer() -> Synthesizer {
        let set = ContractSet::from_toml(CONTRACTS).unwrap();
        Synthesizer::new(Arc::new(TypeModel::new(Arc::new(set))))
    }

    fn op(name: &str, shape: MethodShape, params: &[(&str, &str)], response: &str) -> OperationDescriptor {
        OperationDescriptor {
            name: name.to_string(),
            method_name: name.to_string(),
            declaring_interface: "IDemo".to_string(),
            shape,
            parameters: params
                .iter()
                .map(|(n, t)| ParameterDescriptor {
                    name: n.to_string(),
                    ty: t.parse().unwrap(),
                })
                .collect(),
            response: response.parse().unwrap(),
        }
    }

    #[test]
    fn single_message_parameter_is_reused() {
        let s = synthesizer();
        let req = s
            .synthesize_request(&op("Get", MethodShape::Unary, &[("req", "MyRequest")], "void"))
            .unwrap();
        assert_eq!(req.name, "MyRequest");
        assert!(matches!(req.origin, TypeOrigin::Declared(_)));
    }

    #[test]
    fn scalar_parameters_are_aggregated() {
        let s = synthesizer();
        let operation = op(
            "Add",
            MethodShape::Unary,
            &[("x", "int32"), ("y", "int32"), ("tags", "list<string>")],
            "int32",
        );
        let req = s.synthesize_request(&operation).unwrap();
        assert_eq!(req.name, "AddParameters");
        assert_eq!(
            req.fields()
                .iter()
                .map(|f| (f.name.as_str(), f.position))
                .collect::<Vec<_>>(),
            vec![("X", 1), ("Y", 2), ("Tags", 3)]
        );
        assert!(req.fields()[2].ty.is_repeated());

        let again = s.synthesize_request(&operation).unwrap();
        assert!(Arc::ptr_eq(&req, &again));

        let resp = s.synthesize_response(&operation).unwrap();
        assert_eq!(resp.name, ".google.protobuf.Int32Value");
    }

    #[test]
    fn single_scalar_parameter_is_wrapped_in_message() {
        let s = synthesizer();
        let req = s
            .synthesize_request(&op("Find", MethodShape::Unary, &[("name", "string")], "void"))
            .unwrap();
        assert_eq!(req.name, "FindParameters");
        assert_eq!(req.fields()[0].name, "Name");
    }

    #[test]
    fn empty_request_and_response() {
        let s = synthesizer();
        let operation = op("Ping", MethodShape::Unary, &[], "void");
        assert!(s.synthesize_request(&operation).unwrap().is_empty_marker());
        assert!(s.synthesize_response(&operation).unwrap().is_empty_marker());
    }

    #[test]
    fn list_and_enum_responses_are_wrapped() {
        let s = synthesizer();
        let list = s
            .synthesize_response(&op("List", MethodShape::Unary, &[], "list<ConferenceOverview>"))
            .unwrap();
        assert_eq!(list.name, "IEnumerable_ConferenceOverview");
        assert_eq!(list.fields().len(), 1);
        assert_eq!(list.fields()[0].name, "items");
        assert_eq!(list.fields()[0].position, 1);
        assert_eq!(list.fields()[0].ty.to_string(), "repeated ConferenceOverview");

        let value = s
            .synthesize_response(&op("Kind", MethodShape::Unary, &[], "Category"))
            .unwrap();
        assert_eq!(value.name, "CategoryValue");
        assert_eq!(value.fields()[0].ty, FieldType::Enum("Category".to_string()));
    }

    #[rstest::rstest]
    #[case(MethodShape::ClientStreaming, "int32", "MyRequest")]
    #[case(MethodShape::ServerStreaming, "MyRequest", "string")]
    fn scalar_stream_elements_are_rejected(
        #[case] shape: MethodShape,
        #[case] request: &str,
        #[case] response: &str,
    ) {
        let s = synthesizer();
        let operation = op("Watch", shape, &[("item", request)], response);
        let res = s
            .synthesize_request(&operation)
            .and_then(|_| s.synthesize_response(&operation));
        assert!(matches!(res, Err(Error::ShapeClassification { .. })));
    }

    #[test]
    fn synthesized_name_clash_is_reported() {
        let s = synthesizer();
        s.synthesize_request(&op("Add", MethodShape::Unary, &[("x", "int32"), ("y", "int32")], "void"))
            .unwrap();
        let mut other = op("Add", MethodShape::Unary, &[("a", "string"), ("b", "string")], "void");
        other.declaring_interface = "IOther".to_string();
        assert_eq!(
            s.synthesize_request(&other).unwrap_err(),
            Error::NamingCollision("AddParameters".to_string())
        );
    }
}
