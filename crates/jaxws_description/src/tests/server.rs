use std::{collections::BTreeSet, sync::Arc};

use crate::description::{
    config::{ConfigurationScope, DescriptionConfig},
    core::{ServiceDescriptor, operation::GENERIC_PROVIDER_OPERATION},
    error::DescriptionError,
    facts::{
        ClassFacts, MethodFacts, Mode, ParameterFacts, ParameterStyle, ServiceMode, SoapBindingFacts, Style,
        WebFaultFacts, WebMethodFacts, WebServiceFacts, WebServiceProviderFacts,
    },
    infrastructure::naming::{QName, binding, java},
    services::registry::{create_server_description, create_server_descriptions},
};

use super::fixtures::{
    CALC_NS, CALC_WSDL_NAME, Catalog, SOAP11_ADDRESS, calc_implementation, calc_port, calc_scope, echo_provider,
    empty_scope,
};

/// Document/literal/bare SEI with a fault and a conflicting body element.
fn bare_sei() -> ClassFacts {
    ClassFacts::interface("com.example.calc.CalcSei")
        .with_web_service(WebServiceFacts {
            name: Some("Calculator".into()),
            target_namespace: Some("urn:calc".into()),
            ..Default::default()
        })
        .with_soap_binding(SoapBindingFacts { parameter_style: Some(ParameterStyle::Bare), ..Default::default() })
        .with_method(MethodFacts::new("echo", "java.lang.String").param("java.lang.String").throws("java.io.IOException"))
        .with_method(
            MethodFacts::new("square", "int")
                .with_parameter(ParameterFacts::new("int").named("value"))
                .throws("com.example.calc.CalcFault"),
        )
        .with_method(
            MethodFacts::new("mirror", "java.lang.String")
                .with_parameter(ParameterFacts::new("java.lang.String").named("echo")),
        )
}

fn bare_implementation() -> ClassFacts {
    ClassFacts::new("com.example.calc.CalcImpl")
        .with_web_service(WebServiceFacts {
            endpoint_interface: Some("com.example.calc.CalcSei".into()),
            ..Default::default()
        })
        .implements("com.example.calc.CalcSei")
        .with_method(MethodFacts::new("echo", "java.lang.String").param("java.lang.String"))
        .with_method(MethodFacts::new("square", "int").param("int").throws("com.example.calc.CalcFault"))
        .with_method(MethodFacts::new("mirror", "java.lang.String").param("java.lang.String"))
}

fn calc_fault() -> ClassFacts {
    ClassFacts::new("com.example.calc.CalcFault")
        .extends("java.lang.Exception")
        .with_web_fault(WebFaultFacts { name: Some("CalcFaultInfo".into()), ..Default::default() })
}

#[test]
fn integration_server_implicit_sei_scenario() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let catalog = Catalog::new().with(calc_implementation()).shared();
    let scope = empty_scope();
    let service = ServiceDescriptor::server(catalog, "com.example.Calc", &scope).unwrap();
    assert!(service.is_server_side());
    assert_eq!(service.service_qname(), &QName::new("http://example.com", "Calc"));

    let port = QName::new("http://example.com", "CalcPort");
    let graph = service.snapshot();
    let endpoint = graph.endpoint(&port).unwrap();
    assert!(endpoint.is_endpoint_based());
    assert_eq!(endpoint.service_mode(), None);
    assert_eq!(endpoint.binding_type(), binding::SOAP11_HTTP);
    assert_eq!(endpoint.client_name(), Some("Calc"));

    let add = operation!(graph, port, "add");
    assert_eq!(add.style(), Style::Document);
    assert_eq!(add.parameter_style(), ParameterStyle::Wrapped);
    let names: Vec<String> = add.parameters().iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["arg0", "arg1"]);
    assert!(add.parameters().iter().all(|p| p.mode() == Mode::In));
    assert_eq!(add.result_name().as_deref(), Some("return"));
    assert_eq!(add.input_action(), "http://example.com/Calc/addRequest");
    assert_eq!(add.output_action(), "http://example.com/Calc/addResponse");

    let notify = operation!(graph, port, "notify");
    assert!(notify.is_one_way());
    assert_eq!(notify.input_action(), "http://example.com/Calc/notify");
    assert_eq!(notify.output_action(), "http://example.com/Calc/notifyResponse");

    // The same class builds an equal but distinct description.
    let again = create_server_description(Catalog::new().with(calc_implementation()).shared(), "com.example.Calc", &scope)
        .unwrap();
    assert!(!Arc::ptr_eq(&service, &again));
    assert_eq!(again.snapshot().endpoint(&port).unwrap().client_name(), Some("Calc_1"));
}

#[test]
fn integration_server_generated_wsdl() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let catalog = Catalog::new().with(calc_implementation()).shared();
    let service = ServiceDescriptor::server(catalog.clone(), "com.example.Calc", &empty_scope()).unwrap();
    let graph = service.snapshot();
    let endpoint = graph.endpoint(&QName::new("http://example.com", "CalcPort")).unwrap();

    let generated = endpoint.generated_wsdl().unwrap().clone();
    assert_eq!(generated.wsdl.file_name, "calc.wsdl");
    let definition = &generated.definition;
    let port = definition.port(&QName::new("http://example.com", "Calc"), "CalcPort").unwrap();
    let port_type = definition.port_type_for_port(port).unwrap();
    assert_eq!(port_type.name, QName::new("http://example.com", "Calc"));
    assert!(!port_type.operation("add").unwrap().is_one_way());
    assert!(port_type.operation("notify").unwrap().is_one_way());
    assert!(Arc::ptr_eq(&generated, &endpoint.generated_wsdl().unwrap()));
    assert!(Arc::ptr_eq(&generated.definition, &endpoint.published_definition().unwrap().unwrap()));

    // The contract lives on the endpoint and survives cache resets.
    service.reset_caches().unwrap();
    let graph = service.snapshot();
    let endpoint = graph.endpoint(&QName::new("http://example.com", "CalcPort")).unwrap();
    assert!(Arc::ptr_eq(&generated, endpoint.generated_wsdl().unwrap()));

    // Changing the address rebuilds it.
    let port = QName::new("http://example.com", "CalcPort");
    service.set_endpoint_address(&port, None, "http://host/calc").unwrap();
    let graph = service.snapshot();
    let regenerated = graph.endpoint(&port).unwrap().generated_wsdl().unwrap();
    assert!(!Arc::ptr_eq(&generated, regenerated));
    let port_element = regenerated.definition.port(&QName::new("http://example.com", "Calc"), "CalcPort").unwrap();
    assert_eq!(port_element.soap_address(), Some("http://host/calc"));

    let disabled = ConfigurationScope::new(DescriptionConfig::default().with_generate_wsdl(false));
    let service = ServiceDescriptor::server(catalog, "com.example.Calc", &disabled).unwrap();
    let graph = service.snapshot();
    assert!(graph.endpoints()[0].generated_wsdl().is_none());
}

#[test]
fn integration_server_bare_routing_and_faults() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let catalog = Catalog::new().with(bare_sei()).with(bare_implementation()).with(calc_fault()).shared();
    let service = ServiceDescriptor::server(catalog, "com.example.calc.CalcImpl", &empty_scope()).unwrap();
    assert_eq!(service.service_qname(), &QName::new("http://calc.example.com/", "CalcImplService"));

    let graph = service.snapshot();
    let endpoint = graph.endpoint(&QName::new("http://calc.example.com/", "CalcImplPort")).unwrap();
    assert_eq!(endpoint.sei_class_name(), Some("com.example.calc.CalcSei"));
    let interface = endpoint.require_interface().unwrap();
    assert_eq!(interface.port_type(), QName::new("urn:calc", "Calculator"));

    let echo = interface.operation("echo").unwrap();
    assert!(echo.is_document_literal_bare());
    assert_eq!(echo.parameter(0).unwrap().name(), "echo");
    assert_eq!(echo.parameter(0).unwrap().target_namespace(), "urn:calc");
    assert_eq!(echo.result_name().as_deref(), Some("echoResponse"));
    assert_eq!(echo.request_wrapper_local_name(), None);
    assert_eq!(echo.input_action(), "urn:calc:Calculator:echoRequest");
    assert!(echo.faults().is_empty());

    // mirror claims the echo body element too; the first claimant keeps it.
    let echo_key = Some(QName::new("urn:calc", "echo"));
    assert_eq!(echo.routing_key(), Ok(Some(echo_key.clone())));
    assert_eq!(interface.routing_operation(&echo_key).unwrap().operation_name(), "echo");
    let square = interface.routing_operation(&Some(QName::new("urn:calc", "value"))).unwrap();
    assert_eq!(square.operation_name(), "square");
    assert_eq!(interface.routing_keys().len(), 2);
    assert_eq!(interface.dispatchable_operation("mirror").len(), 1);

    let fault = square.resolve_fault_by_exception_name("CalcFault").unwrap();
    assert_eq!(fault.name, "CalcFaultInfo");
    assert_eq!(fault.target_namespace, "urn:calc");
    assert_eq!(fault.fault_bean, "com.example.calc.jaxws.CalcFaultBean");
    assert_eq!(fault.message_name, "CalcFault");
    assert_eq!(
        square.fault_action("com.example.calc.CalcFault").as_deref(),
        Some("urn:calc:Calculator:square:Fault:CalcFaultInfo")
    );
    assert_eq!(square.fault_action("java.io.IOException"), None);
}

#[test]
fn integration_server_provider_without_wsdl() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let catalog = Catalog::new().with(echo_provider()).shared();
    let service = ServiceDescriptor::server(catalog, "com.example.EchoProvider", &empty_scope()).unwrap();
    assert_eq!(service.service_qname(), &QName::new("http://example.com/", "EchoProviderService"));

    let graph = service.snapshot();
    let endpoint = graph.endpoint(&QName::new("http://example.com/", "EchoProviderPort")).unwrap();
    assert!(endpoint.is_provider_based());
    assert_eq!(endpoint.service_mode(), Some(ServiceMode::Payload));
    assert_eq!(endpoint.name(), "");
    let operations = endpoint.require_interface().unwrap().operations();
    assert_eq!(operations.len(), 1);
    assert!(operations[0].is_generic_provider());
    assert_eq!(operations[0].operation_name(), GENERIC_PROVIDER_OPERATION);
}

#[test]
fn integration_server_with_wsdl_contract() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let implementation = ClassFacts::new("com.example.calc.CalcEndpoint")
        .with_web_service(WebServiceFacts {
            name: Some("Calc".into()),
            target_namespace: Some(CALC_NS.into()),
            service_name: Some("CalcService".into()),
            port_name: Some("CalcSoap11Port".into()),
            wsdl_location: Some(CALC_WSDL_NAME.into()),
            ..Default::default()
        })
        .with_method(MethodFacts::new("add", "int").param("int").param("int"))
        .with_method(MethodFacts::new("ping", java::VOID).param("java.lang.String").one_way());
    let catalog = Catalog::new().with(implementation).shared();
    let service = ServiceDescriptor::server(catalog, "com.example.calc.CalcEndpoint", &calc_scope()).unwrap();
    assert_eq!(service.wsdl_location().as_deref(), Some(CALC_WSDL_NAME));

    let port = calc_port("CalcSoap11Port");
    let graph = service.snapshot();
    let endpoint = graph.endpoint(&port).unwrap();
    assert_eq!(endpoint.endpoint_address().as_deref(), Some(SOAP11_ADDRESS));
    assert!(endpoint.generated_wsdl().is_none());

    let dispatchable: Vec<String> = endpoint.dispatchable_operations().iter().map(|o| o.operation_name()).collect();
    assert_eq!(dispatchable, vec!["add", "ping", "upload"]);
    assert_eq!(operation!(graph, port, "add").action(), "urn:calc:add");
    assert_eq!(operation!(graph, port, "add").java_declaring_class(), Some("com.example.calc.CalcEndpoint"));
    assert!(operation!(graph, port, "upload").method().is_none());
}

#[test]
fn integration_server_legacy_web_method_rules() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let implementation = ClassFacts::new("com.example.Legacy")
        .with_web_service(WebServiceFacts::default())
        .with_method(MethodFacts::new("add", "int").param("int").with_web_method(WebMethodFacts::default()))
        .with_method(MethodFacts::new("sub", "int").param("int"))
        .with_method(MethodFacts::new("helper", java::VOID).static_method());
    let catalog = Catalog::new().with(implementation).shared();
    let exposed = |scope: &Arc<ConfigurationScope>| {
        let service = ServiceDescriptor::server(catalog.clone(), "com.example.Legacy", scope).unwrap();
        let graph = service.snapshot();
        graph.endpoints()[0].require_interface().unwrap().operations().iter().map(|o| o.operation_name()).collect::<Vec<_>>()
    };

    assert_eq!(exposed(&empty_scope()), vec!["add", "sub"]);
    let legacy = ConfigurationScope::new(DescriptionConfig::default().with_legacy_web_method_rules(true));
    assert_eq!(exposed(&legacy), vec!["add"]);
}

#[test]
fn integration_server_rejects_invalid_classes() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let scope = empty_scope();
    let build = |class: ClassFacts| {
        let name = class.class_name.clone();
        ServiceDescriptor::server(Catalog::new().with(class).shared(), &name, &scope).map(|_| ())
    };

    assert_eq!(
        build(calc_implementation().final_class()),
        Err(DescriptionError::InvalidImplementation("com.example.Calc".into(), "class is final".into()))
    );
    assert!(matches!(
        build(
            ClassFacts::new("com.example.RawProvider")
                .with_web_service_provider(WebServiceProviderFacts::default())
                .implements(format!("{}<{}>", java::PROVIDER, java::SOAP_MESSAGE))
                .with_method(MethodFacts::new("invoke", java::SOAP_MESSAGE).param(java::SOAP_MESSAGE))
        ),
        Err(DescriptionError::InvalidProvider(class, _)) if class == "com.example.RawProvider"
    ));
    assert!(matches!(
        build(
            calc_implementation()
                .with_method(MethodFacts::new("addAsync", format!("{}<java.lang.Integer>", java::FUTURE)).param("int"))
        ),
        Err(DescriptionError::InvalidImplementation(_, reason)) if reason.contains("addAsync")
    ));
    assert_eq!(
        build(ClassFacts::new("com.example.Remote").with_web_service(WebServiceFacts {
            wsdl_location: Some("missing.wsdl".into()),
            ..Default::default()
        })),
        Err(DescriptionError::UnresolvableWsdlLocation("missing.wsdl".into()))
    );
    assert!(matches!(
        build(bare_implementation()),
        Err(DescriptionError::InvalidSei(sei, _)) if sei == "com.example.calc.CalcSei"
    ));
    assert_eq!(
        ServiceDescriptor::server(Catalog::new().shared(), "com.example.Missing", &scope).map(|_| ()),
        Err(DescriptionError::UnknownClass("com.example.Missing".into()))
    );
}

#[test]
fn integration_server_descriptions_for_catalog() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let catalog = Catalog::new()
        .with(calc_implementation())
        .with(echo_provider())
        .with(bare_sei())
        .with(bare_implementation())
        .with(calc_fault())
        .shared();
    let services = create_server_descriptions(catalog, &empty_scope()).unwrap();
    let names: BTreeSet<String> = services.iter().map(|s| s.service_qname().local_part.clone()).collect();
    assert_eq!(
        names,
        BTreeSet::from(["Calc".to_string(), "CalcImplService".to_string(), "EchoProviderService".to_string()])
    );
    assert!(services.iter().all(|s| s.is_server_side()));
}
