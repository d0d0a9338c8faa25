//! CLI entry point for jaxws-inspect
//!
//! Loads a WSDL contract, builds the client description of each service it
//! declares and prints what a dispatch client would see on every port.
//!
//! # Examples
//!
//! ```bash
//! jaxws-inspect --wsdl calc.wsdl
//! jaxws-inspect --wsdl calc.wsdl --service '{http://example.com/calc}CalcService' --port CalcSoap12Port
//! ```

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use jaxws_description::description::{
    config::{ConfigurationScope, DescriptionConfig},
    core::{CallerScope, EndpointUpdate, ServiceRequest},
    infrastructure::{naming::QName, wsdl::locator::WsdlLocator},
    services::DescriptionRegistry,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "jaxws-inspect")]
#[command(about = "Inspect the web-service description built from a WSDL contract", long_about = None)]
struct InspectArgs {
    /// WSDL location: a path, a file or http(s) URL, or a name under a resource root
    #[arg(short, long, env = "JAXWS_INSPECT_WSDL")]
    wsdl: String,

    /// Service to inspect, as `{namespace}local`; every service when omitted
    #[arg(short, long)]
    service: Option<String>,

    /// Local name of the port to inspect; every declared port when omitted
    #[arg(short, long)]
    port: Option<String>,

    /// Directory searched for relative WSDL locations
    #[arg(short, long = "resource-root")]
    resource_roots: Vec<String>,

    /// Expose only @WebMethod methods when any method carries the annotation
    #[arg(long, default_value_t = false)]
    legacy_web_method_rules: bool,
}

#[cfg(not(tarpaulin_include))]
fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().compact()).init();

    let args = InspectArgs::parse();

    let mut config = args
        .resource_roots
        .iter()
        .fold(DescriptionConfig::from_env(), |config, root| config.with_resource_root(root));
    if args.legacy_web_method_rules {
        config = config.with_legacy_web_method_rules(true);
    }
    let scope = ConfigurationScope::new(config);

    let definition = WsdlLocator::new(scope.config())
        .load(&args.wsdl)
        .with_context(|| format!("cannot load {}", args.wsdl))?;
    let services = match &args.service {
        Some(service) => vec![QName::parse(service)?],
        None => definition.services.iter().map(|s| s.name.clone()).collect(),
    };
    if services.is_empty() {
        bail!("{} declares no service", args.wsdl);
    }

    let registry = DescriptionRegistry::new();
    for service in services {
        inspect_service(&registry, &scope, &args, service)?;
    }
    Ok(())
}

#[cfg(not(tarpaulin_include))]
fn inspect_service(
    registry: &DescriptionRegistry,
    scope: &Arc<ConfigurationScope>,
    args: &InspectArgs,
    service: QName,
) -> anyhow::Result<()> {
    let caller = CallerScope::new();
    let request = ServiceRequest::new(service.clone()).with_wsdl_location(&args.wsdl);
    let handle = registry.get_or_create(scope, request, Some(&caller))?;
    info!("inspecting {}", service);
    println!("service {}", service);

    let ports: Vec<QName> = handle
        .ports(Some(&caller))?
        .into_iter()
        .filter(|p| args.port.as_deref().is_none_or(|wanted| p.local_part == wanted))
        .collect();
    if ports.is_empty() {
        println!("  (no matching port)");
    }

    for port in ports {
        let id = handle
            .update_endpoint(EndpointUpdate::create_dispatch(port.clone()), Some(&caller))
            .with_context(|| format!("cannot create dispatch for {}", port))?;
        let graph = handle.snapshot();
        let Some(endpoint) = graph.endpoint_by_id(id) else {
            bail!("endpoint {} vanished", port);
        };

        println!("  port {}", port.local_part);
        println!("    client name : {}", endpoint.client_name().unwrap_or("-"));
        println!("    binding     : {}", endpoint.binding_type());
        println!("    client id   : {}", endpoint.client_binding_id());
        println!("    address     : {}", endpoint.endpoint_address().as_deref().unwrap_or("-"));
        println!("    mtom        : {}", endpoint.is_mtom_enabled(Some(caller.key())));

        let Some(interface) = endpoint.interface() else {
            println!("    (no interface description)");
            continue;
        };
        println!("    port type   : {}", interface.port_type());
        println!("    style       : {} {} {}", interface.style(), interface.use_(), interface.parameter_style());
        for operation in interface.dispatchable_operations() {
            println!(
                "    operation {}{} action={} input={}",
                operation.operation_name(),
                if operation.is_one_way() { " (one-way)" } else { "" },
                operation.action(),
                operation.input_action(),
            );
        }
        for (key, operation) in interface.routing_keys() {
            let key = key.map(|k| k.to_string()).unwrap_or_else(|| "(empty body)".to_string());
            println!("    route {} -> {}", key, operation.operation_name());
        }
    }

    handle.release()?;
    Ok(())
}
