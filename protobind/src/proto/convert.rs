//! Batch conversion: discover, bind and describe a list of services in one pass.
use std::sync::Arc;

use super::discover::{AttributeConvention, Discoverer, DiscoveryReport};
use super::host::ContractSet;
use super::marshaller::MarshallerRegistry;
use super::resolve::OperationResolver;
use super::rpc_impl::binder::{BindOutcome, MethodBinder};
use super::rpc_impl::route_table::RouteTable;
use super::rpc_impl::BinderConfiguration;
use super::rpc_types::descriptor::ServiceDescriptor;
use super::rpc_types::error::{Error, Result};
use super::schema::{parse_rpc_paths, GeneratedSchema, SchemaGenerator};
use super::synth::Synthesizer;
use super::type_model::TypeModel;
use crate::common::config::{ConfigLoader, TomlConfigLoader};

/// Supplies the services to convert when the caller names none.
#[auto_impl::auto_impl(&, Box, Arc)]
pub trait ServiceActivationSource: Send + Sync {
    fn activated_services(&self) -> Vec<String>;
}

impl ServiceActivationSource for Vec<String> {
    fn activated_services(&self) -> Vec<String> {
        self.clone()
    }
}

impl ServiceActivationSource for TomlConfigLoader {
    fn activated_services(&self) -> Vec<String> {
        self.get_activation_services()
    }
}

/// The discovery, binding and generation components over one contract set. Binder and
/// generator share a resolver so both see the same synthesized types.
pub struct ContractPass {
    discoverer: Discoverer,
    resolver: Arc<OperationResolver>,
    binder: MethodBinder,
    generator: SchemaGenerator,
}

impl ContractPass {
    pub fn new(contracts: Arc<ContractSet>, config: BinderConfiguration) -> Self {
        let types = Arc::new(TypeModel::new(contracts.clone()));
        let synth = Arc::new(Synthesizer::new(types));
        let resolver = Arc::new(OperationResolver::new(synth, config.marshallers));
        Self {
            discoverer: Discoverer::new(contracts, config.convention, config.package),
            binder: MethodBinder::new(resolver.clone()),
            generator: SchemaGenerator::new(resolver.clone()),
            resolver,
        }
    }

    pub fn discover(&self, candidate: &str) -> Result<DiscoveryReport> {
        self.discoverer.discover(candidate)
    }

    pub fn bind(&self, service: &ServiceDescriptor) -> BindOutcome {
        self.binder.bind(service)
    }

    pub fn generate(&self, services: &[Arc<ServiceDescriptor>]) -> Result<GeneratedSchema> {
        self.generator.generate(services)
    }

    pub fn resolver(&self) -> &Arc<OperationResolver> {
        &self.resolver
    }
}

#[derive(Debug, Clone)]
pub struct ConvertedService {
    pub candidate: String,
    pub service: Arc<ServiceDescriptor>,
    pub routes: RouteTable,
    pub schema: GeneratedSchema,
}

#[derive(Debug, Default)]
pub struct ConversionReport {
    pub services: Vec<ConvertedService>,
    /// Every independent failure of the pass, each reported once.
    pub errors: Vec<Error>,
}

pub struct Converter {
    pass: ContractPass,
    activation: Box<dyn ServiceActivationSource>,
}

impl Converter {
    pub fn new(
        contracts: Arc<ContractSet>,
        config: BinderConfiguration,
        activation: Box<dyn ServiceActivationSource>,
    ) -> Self {
        Self {
            pass: ContractPass::new(contracts, config),
            activation,
        }
    }

    pub fn from_config(contracts: Arc<ContractSet>, config: &TomlConfigLoader) -> Self {
        let convention = AttributeConvention {
            interface_prefix: config.get_interface_prefix(),
            require_operation_tag: config.get_require_operation_tag(),
        };
        let binder_config = BinderConfiguration {
            convention: Arc::new(convention),
            marshallers: Arc::new(MarshallerRegistry::default()),
            package: config.get_package(),
        };
        Self::new(contracts, binder_config, Box::new(config.clone()))
    }

    pub fn pass(&self) -> &ContractPass {
        &self.pass
    }

    /// Converts the named services, or the activated ones when `names` is empty. Fails
    /// without output only when there is nothing to convert.
    pub fn convert_services(&self, names: &[String]) -> Result<ConversionReport> {
        let names = if names.is_empty() {
            self.activation.activated_services()
        } else {
            names.to_vec()
        };
        if names.is_empty() {
            return Err(Error::MissingActivationList);
        }

        let mut report = ConversionReport::default();
        for name in &names {
            match self.convert_service(name) {
                Ok((converted, errors)) => {
                    report.services.push(converted);
                    report.errors.extend(errors);
                }
                Err(e) => {
                    tracing::warn!(candidate = %name, %e, "service conversion failed");
                    report.errors.push(e);
                }
            }
        }
        tracing::info!(
            services = report.services.len(),
            errors = report.errors.len(),
            "conversion finished"
        );
        Ok(report)
    }

    /// Converts one service, returning it with its per-operation soft errors.
    pub fn convert_service(&self, candidate: &str) -> Result<(ConvertedService, Vec<Error>)> {
        let discovered = self.pass.discover(candidate)?;
        let bound = self.pass.bind(&discovered.service);
        let schema = self.pass.generate(std::slice::from_ref(&discovered.service))?;

        let mut errors = Vec::new();
        let soft = discovered
            .errors
            .into_iter()
            .chain(bound.errors)
            .chain(schema.errors.iter().cloned());
        for e in soft {
            if !errors.contains(&e) {
                errors.push(e);
            }
        }
        if let Err(e) = Self::verify_consistency(&bound.table, &schema) {
            errors.push(e);
        }

        Ok((
            ConvertedService {
                candidate: candidate.to_string(),
                service: discovered.service,
                routes: bound.table,
                schema,
            },
            errors,
        ))
    }

    /// Checks that the schema declares exactly the paths of the route table.
    pub fn verify_consistency(routes: &RouteTable, schema: &GeneratedSchema) -> Result<()> {
        let via_schema = parse_rpc_paths(&schema.text)?;
        let via_routes = routes.paths();
        if via_schema == via_routes {
            return Ok(());
        }
        let missing: Vec<_> = via_routes.iter().filter(|p| !via_schema.contains(p)).collect();
        let extra: Vec<_> = via_schema.iter().filter(|p| !via_routes.contains(p)).collect();
        Err(Error::InconsistentSurface(format!(
            "missing from schema: {:?}, missing from route table: {:?}",
            missing, extra
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::rpc_impl::route_table::MethodRouteEntry;
    use crate::proto::rpc_types::descriptor::MethodShape;

    const CONTRACTS: &str = r#"
namespace = "Demo"

[[message]]
name = "Req"
fields = [{ name = "Id", type = "int32" }]

[[interface]]
name = "IGreeter"
service = {}

[[interface.method]]
name = "Greet"
operation = {}
params = [{ name = "req", type = "Req" }]
returns = "Req"

[[interface]]
name = "INotAService"
"#;

    fn converter(activated: Vec<String>) -> Converter {
        Converter::new(
            Arc::new(ContractSet::from_toml(CONTRACTS).unwrap()),
            BinderConfiguration::default(),
            Box::new(activated),
        )
    }

    #[test]
    fn nothing_to_convert_is_fatal() {
        assert_eq!(
            converter(vec![]).convert_services(&[]).unwrap_err(),
            Error::MissingActivationList
        );
    }

    #[test]
    fn activated_services_are_used() {
        let report = converter(vec!["IGreeter".to_string()])
            .convert_services(&[])
            .unwrap();
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.services.len(), 1);
        assert_eq!(report.services[0].routes.paths(), vec!["/Demo.Greeter/Greet"]);
    }

    #[test]
    fn independent_failures_are_accumulated() {
        let names = vec![
            "INotAService".to_string(),
            "IGreeter".to_string(),
            "Missing".to_string(),
        ];
        let report = converter(vec![]).convert_services(&names).unwrap();
        assert_eq!(report.services.len(), 1);
        assert_eq!(report.errors.len(), 2);
        assert!(matches!(report.errors[0], Error::Contract(_)));
        assert!(matches!(report.errors[1], Error::InvalidInput(_)));
    }

    #[test]
    fn config_drives_conversion() {
        let config = TomlConfigLoader::new_from_str(
            r#"
package = "greet.v1"

[activation]
services = ["IGreeter"]
"#,
        )
        .unwrap();
        let contracts = Arc::new(ContractSet::from_toml(CONTRACTS).unwrap());
        let report = Converter::from_config(contracts, &config)
            .convert_services(&[])
            .unwrap();
        assert!(report.services[0].schema.text.contains("package greet.v1;"));
        assert_eq!(report.services[0].routes.paths(), vec!["/greet.v1.Greeter/Greet"]);
    }

    #[test]
    fn inconsistent_surface_is_detected() {
        let (converted, _) = converter(vec![]).convert_service("IGreeter").unwrap();
        let mut routes = converted.routes.clone();
        routes.merge(RouteTable::new(vec![MethodRouteEntry {
            full_path: "/Demo.Greeter/Extra".to_string(),
            service: "Demo.Greeter".to_string(),
            method: "Extra".to_string(),
            request_type: "Req".to_string(),
            response_type: "Req".to_string(),
            shape: MethodShape::Unary,
        }]));
        assert!(Converter::verify_consistency(&converted.routes, &converted.schema).is_ok());
        assert!(matches!(
            Converter::verify_consistency(&routes, &converted.schema),
            Err(Error::InconsistentSurface(_))
        ));
    }
}
