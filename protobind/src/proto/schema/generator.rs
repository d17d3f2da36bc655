use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::{self, Write as _};
use std::sync::Arc;

use heck::ToShoutySnakeCase as _;

use crate::proto::resolve::{OperationResolver, ResolvedOperation};
use crate::proto::rpc_types::descriptor::ServiceDescriptor;
use crate::proto::rpc_types::error::{Error, Result};
use crate::proto::type_model::{FieldType, TypeDescriptor, TypeKind, TypeModel};

const INDENT: &str = "   ";

#[derive(Debug, Clone)]
pub struct GeneratedSchema {
    pub package: String,
    pub text: String,
    /// Soft errors: dropped operations and enums that needed a placeholder zero value.
    pub errors: Vec<Error>,
}

pub struct SchemaGenerator {
    resolver: Arc<OperationResolver>,
}

/// Everything a schema references, deduplicated by name and kept in name order.
#[derive(Clone)]
struct Collector<'a> {
    types: &'a TypeModel,
    messages: BTreeMap<String, Arc<TypeDescriptor>>,
    enums: BTreeMap<String, Arc<TypeDescriptor>>,
    imports: BTreeSet<&'static str>,
}

impl<'a> Collector<'a> {
    fn new(types: &'a TypeModel) -> Self {
        Self {
            types,
            messages: BTreeMap::new(),
            enums: BTreeMap::new(),
            imports: BTreeSet::new(),
        }
    }

    fn insert(
        map: &mut BTreeMap<String, Arc<TypeDescriptor>>,
        desc: &Arc<TypeDescriptor>,
    ) -> Result<bool> {
        match map.get(&desc.name) {
            Some(existing) if Arc::ptr_eq(existing, desc) || existing.kind == desc.kind => {
                Ok(false)
            }
            Some(_) => Err(Error::NamingCollision(desc.name.clone())),
            None => {
                map.insert(desc.name.clone(), desc.clone());
                Ok(true)
            }
        }
    }

    fn visit(&mut self, desc: &Arc<TypeDescriptor>) -> Result<()> {
        match &desc.kind {
            TypeKind::Message(fields) => {
                if Self::insert(&mut self.messages, desc)? {
                    for field in fields {
                        self.visit_field(&field.ty)?;
                    }
                }
            }
            TypeKind::Enum(_) => {
                Self::insert(&mut self.enums, desc)?;
            }
            TypeKind::WellKnown(w) => {
                self.imports.insert(w.import_path());
            }
            TypeKind::Scalar(_) => {}
            TypeKind::RepeatedOf(inner) => self.visit(inner)?,
        }
        Ok(())
    }

    fn visit_field(&mut self, ty: &FieldType) -> Result<()> {
        match ty {
            FieldType::Scalar(_) => Ok(()),
            FieldType::WellKnown(w) => {
                self.imports.insert(w.import_path());
                Ok(())
            }
            FieldType::Message(name) | FieldType::Enum(name) => {
                let desc = self.types.by_name(name).ok_or_else(|| {
                    Error::InvalidInput(format!("type {} is referenced but was never described", name))
                })?;
                self.visit(&desc)
            }
            FieldType::Repeated(inner) => self.visit_field(inner),
        }
    }
}

impl SchemaGenerator {
    pub fn new(resolver: Arc<OperationResolver>) -> Self {
        Self { resolver }
    }

    /// Generates one schema document describing all given services. The services must
    /// share a package and have distinct names.
    pub fn generate(&self, services: &[Arc<ServiceDescriptor>]) -> Result<GeneratedSchema> {
        let first = services
            .first()
            .ok_or_else(|| Error::InvalidInput("no services to describe".to_string()))?;
        let package = first.package.clone();
        let mut names = HashSet::new();
        for svc in services {
            if svc.package != package {
                return Err(Error::InvalidInput(format!(
                    "services {} and {} belong to different packages",
                    first.name, svc.name
                )));
            }
            if !names.insert(svc.name.as_str()) {
                return Err(Error::NamingCollision(svc.name.clone()));
            }
        }

        let types = self.resolver.synthesizer().types().clone();
        let mut collector = Collector::new(&types);
        let mut errors = Vec::new();
        let mut blocks = Vec::with_capacity(services.len());
        for svc in services {
            let (resolved, failed) = self.resolver.resolve_all(svc);
            errors.extend(failed);
            let mut kept = Vec::with_capacity(resolved.len());
            for r in resolved {
                let mut staged = collector.clone();
                match staged
                    .visit(&r.request)
                    .and_then(|_| staged.visit(&r.response))
                {
                    Ok(()) => {
                        collector = staged;
                        kept.push(r);
                    }
                    Err(e) => {
                        tracing::warn!(path = %r.path, %e, "operation left out of schema");
                        errors.push(e.in_operation(&r.path));
                    }
                }
            }
            blocks.push((svc, kept));
        }
        blocks.sort_by(|a, b| a.0.name.cmp(&b.0.name));

        for desc in collector.enums.values().filter(|e| e.missing_zero_value()) {
            tracing::warn!(name = %desc.name, "enum has no zero value");
            errors.push(Error::MissingZeroValue(desc.name.clone()));
        }

        let mut text = String::new();
        Self::write_schema(&mut text, &package, &collector, &blocks)
            .map_err(|e| Error::InvalidInput(format!("failed to render schema: {}", e)))?;
        tracing::info!(
            %package,
            services = blocks.len(),
            messages = collector.messages.len(),
            enums = collector.enums.len(),
            "schema generated"
        );
        Ok(GeneratedSchema {
            package,
            text,
            errors,
        })
    }

    fn write_schema(
        buf: &mut String,
        package: &str,
        collector: &Collector<'_>,
        blocks: &[(&Arc<ServiceDescriptor>, Vec<ResolvedOperation>)],
    ) -> fmt::Result {
        writeln!(buf, r#"syntax = "proto3";"#)?;
        if !package.is_empty() {
            writeln!(buf, "package {};", package)?;
        }
        for import in &collector.imports {
            writeln!(buf, r#"import "{}";"#, import)?;
        }
        writeln!(buf)?;

        for desc in collector.enums.values() {
            Self::write_enum(buf, desc)?;
        }
        for desc in collector.messages.values() {
            Self::write_message(buf, desc)?;
        }
        for (svc, ops) in blocks {
            Self::write_service(buf, svc, ops)?;
        }
        Ok(())
    }

    fn write_enum(buf: &mut String, desc: &TypeDescriptor) -> fmt::Result {
        let TypeKind::Enum(values) = &desc.kind else {
            return Ok(());
        };
        writeln!(buf, "enum {} {{", desc.name)?;
        let zero = values.iter().position(|v| v.value == 0);
        match zero {
            Some(idx) => {
                let v = &values[idx];
                writeln!(buf, "{}{} = {};", INDENT, v.name, v.value)?;
            }
            None => writeln!(
                buf,
                "{}{}_ZERO = 0; // proto3 requires a zero value as the first item",
                INDENT,
                desc.name.to_shouty_snake_case()
            )?,
        }
        for (idx, v) in values.iter().enumerate() {
            if Some(idx) != zero {
                writeln!(buf, "{}{} = {};", INDENT, v.name, v.value)?;
            }
        }
        writeln!(buf, "}}")
    }

    fn write_message(buf: &mut String, desc: &TypeDescriptor) -> fmt::Result {
        writeln!(buf, "message {} {{", desc.name)?;
        for field in desc.fields() {
            write!(buf, "{}{} {} = {};", INDENT, field.ty, field.name, field.position)?;
            if let Some(default) = &field.suppressed_default {
                write!(buf, " // default value could not be applied: {}", default)?;
            }
            writeln!(buf)?;
        }
        writeln!(buf, "}}")
    }

    fn write_service(
        buf: &mut String,
        svc: &ServiceDescriptor,
        ops: &[ResolvedOperation],
    ) -> fmt::Result {
        let stream = |streamed: bool| if streamed { "stream " } else { "" };
        writeln!(buf, "service {} {{", svc.name)?;
        let mut ops: Vec<_> = ops.iter().collect();
        ops.sort_by(|a, b| a.operation.name.cmp(&b.operation.name));
        for r in ops {
            writeln!(
                buf,
                "{indent}rpc {name} ({req_stream}{req}) returns ({resp_stream}{resp});",
                indent = INDENT,
                name = r.operation.name,
                req_stream = stream(r.operation.shape.request_streamed()),
                req = r.request.name,
                resp_stream = stream(r.operation.shape.response_streamed()),
                resp = r.response.name,
            )?;
        }
        writeln!(buf, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::discover::{AttributeConvention, Discoverer};
    use crate::proto::host::ContractSet;
    use crate::proto::marshaller::MarshallerRegistry;
    use crate::proto::synth::Synthesizer;

    fn generate(src: &str, candidates: &[&str]) -> Result<GeneratedSchema> {
        let contracts = Arc::new(ContractSet::from_toml(src).unwrap());
        let discoverer = Discoverer::new(
            contracts.clone(),
            Arc::new(AttributeConvention::default()),
            None,
        );
        let synth = Arc::new(Synthesizer::new(Arc::new(TypeModel::new(contracts))));
        let resolver = Arc::new(OperationResolver::new(
            synth,
            Arc::new(MarshallerRegistry::default()),
        ));
        let services: Vec<_> = candidates
            .iter()
            .map(|c| discoverer.discover(c).unwrap().service)
            .collect();
        SchemaGenerator::new(resolver).generate(&services)
    }

    #[test]
    fn enum_without_zero_gets_placeholder() {
        let src = r#"
[[enum]]
name = "AccessLevel"
values = [{ name = "Read", value = 1 }, { name = "Write", value = 2 }]

[[interface]]
name = "IAccess"
service = {}

[[interface.method]]
name = "Level"
operation = {}
returns = "AccessLevel"
"#;
        let schema = generate(src, &["IAccess"]).unwrap();
        assert_eq!(
            schema.text,
            r#"syntax = "proto3";
import "google/protobuf/empty.proto";

enum AccessLevel {
   ACCESS_LEVEL_ZERO = 0; // proto3 requires a zero value as the first item
   Read = 1;
   Write = 2;
}
message AccessLevelValue {
   AccessLevel value = 1;
}
service Access {
   rpc Level (.google.protobuf.Empty) returns (AccessLevelValue);
}
"#
        );
        assert_eq!(
            schema.errors,
            vec![Error::MissingZeroValue("AccessLevel".to_string())]
        );
    }

    #[test]
    fn scalar_parameters_and_responses() {
        let src = r#"
namespace = "calc"

[[interface]]
name = "ICalculator"
service = {}

[[interface.method]]
name = "Add"
operation = {}
params = [{ name = "x", type = "int32" }, { name = "y", type = "int32" }, { name = "ctx", type = "context" }]
returns = "task<int64>"

[[interface.method]]
name = "Stamp"
operation = {}
params = [{ name = "id", type = "guid" }]
returns = "datetime"
"#;
        let schema = generate(src, &["ICalculator"]).unwrap();
        assert_eq!(
            schema.text,
            r#"syntax = "proto3";
package calc;
import "google/protobuf/timestamp.proto";
import "google/protobuf/wrappers.proto";

message AddParameters {
   int32 X = 1;
   int32 Y = 2;
}
message StampParameters {
   string Id = 1; // default value could not be applied: 00000000-0000-0000-0000-000000000000
}
service Calculator {
   rpc Add (AddParameters) returns (.google.protobuf.Int64Value);
   rpc Stamp (StampParameters) returns (.google.protobuf.Timestamp);
}
"#
        );
        assert!(schema.errors.is_empty());
    }

    #[test]
    fn services_must_share_a_package() {
        let src = r#"
[[interface]]
name = "IA"
namespace = "one"
service = {}

[[interface]]
name = "IB"
namespace = "two"
service = {}
"#;
        assert!(matches!(
            generate(src, &["IA", "IB"]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(generate(src, &[]), Err(Error::InvalidInput(_))));
    }
}
