
mod lifecycle;
mod server;

use std::sync::Arc;

use fixtures::{
    CALC_NS, CALC_WSDL, CALC_WSDL_NAME, SOAP11_ADDRESS, SOAP12_ADDRESS, calc_port, calc_scope, calc_sei,
    calc_service, empty_scope, other_sei, serve_wsdl,
};

use crate::description::{
    core::{CallerScope, EndpointUpdate, ServiceDescriptor, ServiceRequest},
    error::DescriptionError,
    facts::{
        ClassFacts, MethodFacts, Mode, ParameterFacts, ParameterStyle, SparseComposite, Style, Use, WebMethodFacts,
        precedence::{FactOrigin, Resolved},
    },
    infrastructure::naming::{QName, binding, java},
};

fn calc_client() -> Arc<ServiceDescriptor> {
    let request = ServiceRequest::new(calc_service()).with_wsdl_location(CALC_WSDL_NAME);
    ServiceDescriptor::client(&calc_scope(), &request, None).unwrap()
}

#[test]
fn integration_client_default_port_from_wsdl() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let service = calc_client();
    assert_eq!(service.wsdl_location().as_deref(), Some(CALC_WSDL_NAME));
    assert_eq!(
        service.ports(None).unwrap(),
        vec![calc_port("CalcSoap11Port"), calc_port("CalcSoap12Port"), calc_port("CalcDraftPort")]
    );

    let id = get_port!(service, None, None, calc_sei());
    let graph = service.snapshot();
    let endpoint = graph.endpoint_by_id(id).unwrap();
    assert_eq!(endpoint.port_qname(), &calc_port("CalcSoap11Port"));
    assert_eq!(endpoint.client_name(), Some("CalcService.CalcSoap11Port"));
    assert_eq!(endpoint.sei_class_name(), Some("com.example.calc.Calc"));
    assert_eq!(
        endpoint.resolved_endpoint_address(),
        Resolved { value: Some(SOAP11_ADDRESS.to_string()), origin: FactOrigin::Wsdl }
    );

    // Re-fetching by SEI or by port name resolves to the same endpoint.
    assert_eq!(get_port!(service, None, None, calc_sei()), id);
    assert_eq!(get_port!(service, None, Some(calc_port("CalcSoap11Port")), calc_sei()), id);
    assert_eq!(service.snapshot().endpoints().len(), 1);
}

#[test]
fn integration_client_wsdl_binding_beats_annotation() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let service = calc_client();
    let soap11 = calc_port("CalcSoap11Port");
    let soap12 = calc_port("CalcSoap12Port");
    get_port!(service, None, Some(soap11.clone()), calc_sei());
    get_port!(service, None, Some(soap12.clone()), calc_sei());

    let graph = service.snapshot();
    let endpoint = graph.endpoint(&soap12).unwrap();
    assert_eq!(
        endpoint.resolved_binding_type(),
        Resolved { value: binding::SOAP12_HTTP.to_string(), origin: FactOrigin::Wsdl }
    );
    assert_eq!(endpoint.client_binding_id(), binding::SOAP12_HTTP);
    assert_eq!(endpoint.endpoint_address().as_deref(), Some(SOAP12_ADDRESS));
    assert!(!endpoint.is_mtom_enabled(None));

    assert_eq!(operation!(graph, soap11, "add").action(), "urn:calc:add");
    assert_eq!(operation!(graph, soap12, "add").action(), "urn:calc:add12");
    assert_eq!(graph.endpoint(&soap11).unwrap().binding_type(), binding::SOAP11_HTTP);
}

#[test]
fn integration_client_port_without_address() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let service = calc_client();
    let draft = calc_port("CalcDraftPort");
    get_port!(service, None, Some(draft.clone()), calc_sei());

    let graph = service.snapshot();
    let endpoint = graph.endpoint(&draft).unwrap();
    assert_eq!(endpoint.resolved_endpoint_address(), Resolved { value: None, origin: FactOrigin::Default });
    assert_eq!(endpoint.binding_type(), binding::SOAP11_HTTP);
    assert!(endpoint.is_wsdl_fully_specified());
    assert!(endpoint.generated_wsdl().is_none());
}

#[test]
fn integration_client_wrapped_operations() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let service = calc_client();
    let port = calc_port("CalcSoap11Port");
    get_port!(service, None, Some(port.clone()), calc_sei());

    let graph = service.snapshot();
    let interface = graph.endpoint(&port).unwrap().require_interface().unwrap();
    assert_eq!(interface.port_type(), QName::new(CALC_NS, "Calc"));
    assert_eq!(interface.resolved_style(), Resolved { value: Style::Document, origin: FactOrigin::Wsdl });
    assert_eq!(interface.use_(), Use::Literal);
    assert_eq!(interface.parameter_style(), ParameterStyle::Wrapped);

    let names: Vec<String> = interface.operations().iter().map(|o| o.operation_name()).collect();
    assert_eq!(names, vec!["add", "ping", "upload", "add", "audit"]);

    let add = operation!(graph, port, "add");
    assert_eq!(add.java_method_name(), Some("add"));
    let parameters = add.parameters();
    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters[0].name(), "arg0");
    assert_eq!(parameters[1].name(), "arg1");
    assert_eq!(parameters[1].mode(), Mode::In);
    assert_eq!(parameters[0].target_namespace(), "");
    assert_eq!(add.result_name().as_deref(), Some("return"));
    assert_eq!(add.result_type(), Some("int"));
    assert_eq!(add.request_wrapper_local_name().as_deref(), Some("add"));
    assert_eq!(add.response_wrapper_local_name().as_deref(), Some("addResponse"));
    assert_eq!(add.request_wrapper_target_namespace().as_deref(), Some(CALC_NS));
    assert_eq!(add.input_action(), "http://example.com/calc/Calc/addRequest");
    assert_eq!(add.output_action(), "http://example.com/calc/Calc/addResponse");
    assert_eq!(add.routing_key(), Ok(None));

    let ping = operation!(graph, port, "ping");
    assert!(ping.is_one_way());
    assert!(!ping.has_result());
    assert_eq!(ping.result_name(), None);
    assert_eq!(ping.input_action(), "http://example.com/calc/Calc/ping");
    assert_eq!(ping.output_action(), "http://example.com/calc/Calc/pingResponse");
}

#[test]
fn integration_client_async_and_excluded_methods_are_not_dispatched() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let service = calc_client();
    let port = calc_port("CalcSoap11Port");
    get_port!(service, None, Some(port.clone()), calc_sei());

    let graph = service.snapshot();
    let interface = graph.endpoint(&port).unwrap().require_interface().unwrap();
    assert!(!interface.is_dispatch_table_built());
    let dispatchable: Vec<String> = interface.dispatchable_operations().iter().map(|o| o.operation_name()).collect();
    assert_eq!(dispatchable, vec!["add", "ping", "upload"]);
    assert!(interface.is_dispatch_table_built());
    assert_eq!(interface.dispatchable_operation("add").len(), 1);
    assert!(interface.dispatchable_operation("audit").is_empty());

    let audit = interface.operation("audit").unwrap();
    assert!(audit.is_excluded());

    let add_async = interface.operation_for_java_method("addAsync").pop().unwrap();
    assert!(add_async.is_async_client_method());
    assert_eq!(add_async.operation_name(), "add");
    assert_eq!(add_async.result_actual_type(), Some("java.lang.Integer"));
    assert_eq!(add_async.sync_operation().unwrap().java_method_name(), Some("add"));
    assert!(operation!(graph, port, "add").sync_operation().is_none());
}

#[test]
fn integration_client_attachments_from_mime_binding() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let service = calc_client();
    let soap11 = calc_port("CalcSoap11Port");
    let soap12 = calc_port("CalcSoap12Port");
    get_port!(service, None, Some(soap11.clone()), calc_sei());
    get_port!(service, None, Some(soap12.clone()), calc_sei());

    let graph = service.snapshot();
    let upload = operation!(graph, soap11, "upload");
    let photo = upload.attachment("photo").unwrap();
    assert_eq!(photo.mime_types, vec!["image/jpeg".to_string(), "image/png".to_string()]);
    assert!(upload.has_request_swa_ref_attachments());
    assert!(!upload.has_response_swa_ref_attachments());
    assert_eq!(upload.parameter(1).unwrap().attachment(), Some(photo));
    assert_eq!(upload.parameter(0).unwrap().attachment(), None);
    assert_eq!(upload.result_attachment(), None);

    // The SOAP 1.2 binding does not bind upload at all.
    let upload = operation!(graph, soap12, "upload");
    assert!(upload.attachments().is_empty());
    assert_eq!(upload.action(), "");
}

#[test]
fn integration_client_holder_parameters_are_inout() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let sei = ClassFacts::interface("com.example.bank.Account").with_method(
        MethodFacts::new("transfer", java::VOID)
            .with_parameter(ParameterFacts::holder("java.lang.Integer"))
            .with_parameter(ParameterFacts::holder("java.lang.String").with_mode(Mode::Out))
            .with_parameter(ParameterFacts::new("int").with_mode(Mode::In)),
    );
    let request = ServiceRequest::new(QName::new("http://bank.example.com/", "AccountService"));
    let service = ServiceDescriptor::client(&empty_scope(), &request, None).unwrap();
    let id = get_port!(service, None, None, sei);

    let graph = service.snapshot();
    let endpoint = graph.endpoint_by_id(id).unwrap();
    assert_eq!(endpoint.port_qname(), &QName::new("http://bank.example.com/", "AccountPort"));
    let transfer = endpoint.require_interface().unwrap().operation("transfer").unwrap();
    let parameters = transfer.parameters();
    assert_eq!(parameters[0].resolved_mode(), Resolved { value: Mode::InOut, origin: FactOrigin::Default });
    assert!(parameters[0].is_holder());
    assert_eq!(parameters[0].parameter_actual_type(), "java.lang.Integer");
    assert_eq!(parameters[1].mode(), Mode::Out);
    assert_eq!(parameters[2].mode(), Mode::In);
    assert!(!parameters[2].is_holder());
}

#[test]
fn integration_client_overrides_beat_wsdl_and_annotations() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let service = calc_client();
    let caller = CallerScope::new();
    let port = calc_port("CalcSoap11Port");
    let update = EndpointUpdate::get_port(Some(port.clone()), Some(Arc::new(calc_sei())))
        .with_composite(SparseComposite::new().with_mtom_enabled(true));
    service.update_endpoint(update, Some(&caller)).unwrap();

    let graph = service.snapshot();
    let endpoint = graph.endpoint(&port).unwrap();
    assert_eq!(endpoint.resolved_mtom(Some(caller.key())), Resolved { value: true, origin: FactOrigin::Override });
    assert_eq!(endpoint.resolved_mtom(None), Resolved { value: false, origin: FactOrigin::Default });

    service.set_endpoint_address(&port, None, "http://proxy:9090/calc").unwrap();
    service.set_client_binding_id(&port, None, Some(binding::SOAP11_HTTP_MTOM)).unwrap();
    service.set_property(&port, None, "timeout", "30").unwrap();

    let graph = service.snapshot();
    let endpoint = graph.endpoint(&port).unwrap();
    assert_eq!(
        endpoint.resolved_endpoint_address(),
        Resolved { value: Some("http://proxy:9090/calc".to_string()), origin: FactOrigin::Override }
    );
    assert_eq!(
        endpoint.resolved_client_binding_id(),
        Resolved { value: binding::SOAP11_HTTP_MTOM.to_string(), origin: FactOrigin::Override }
    );
    assert_eq!(endpoint.binding_type(), binding::SOAP11_HTTP);
    assert_eq!(endpoint.property("timeout"), Some("30"));

    assert_eq!(
        service.set_client_binding_id(&port, None, Some("urn:bogus")),
        Err(DescriptionError::InvalidBindingId(port.to_string(), "urn:bogus".into()))
    );
    assert_eq!(
        service.set_endpoint_address(&calc_port("Nowhere"), None, "http://x"),
        Err(DescriptionError::EndpointNotFound(calc_service().to_string(), calc_port("Nowhere").to_string()))
    );
}

#[test]
fn integration_client_update_rules() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let service = calc_client();
    let caller = CallerScope::new();
    let soap11 = calc_port("CalcSoap11Port");
    let extra = calc_port("Extra");
    get_port!(service, None, Some(soap11.clone()), calc_sei());

    assert_eq!(
        service.update_endpoint(EndpointUpdate::add_port(soap11.clone(), None, None), Some(&caller)),
        Err(DescriptionError::PortDeclaredInWsdl(soap11.to_string()))
    );
    assert_eq!(
        service.update_endpoint(
            EndpointUpdate::add_port(extra.clone(), None, None).with_composite(SparseComposite::new()),
            Some(&caller)
        ),
        Err(DescriptionError::CompositeNotAllowed("ADD_PORT".into(), extra.to_string()))
    );
    assert_eq!(
        service.update_endpoint(EndpointUpdate::get_port(Some(soap11.clone()), None), None),
        Err(DescriptionError::MissingSei(soap11.to_string()))
    );
    assert_eq!(
        service.update_endpoint(EndpointUpdate::get_port(Some(extra.clone()), Some(Arc::new(calc_sei()))), None),
        Err(DescriptionError::UndeclaredPort(calc_service().to_string(), extra.to_string()))
    );
    assert_eq!(
        service.update_endpoint(EndpointUpdate::get_port(Some(soap11.clone()), Some(Arc::new(other_sei()))), None),
        Err(DescriptionError::AmbiguousSei(
            soap11.to_string(),
            "com.example.calc.Calc".into(),
            "com.example.calc.Other".into()
        ))
    );
    assert_eq!(
        service.update_endpoint(
            EndpointUpdate::create_dispatch(calc_port("CalcDraftPort")).with_sei(Arc::new(calc_sei())),
            None
        ),
        Err(DescriptionError::SeiNotAllowed(calc_port("CalcDraftPort").to_string()))
    );
    assert_eq!(
        service.update_endpoint(EndpointUpdate::create_dispatch(QName::local("")), None),
        Err(DescriptionError::EmptyPortName(calc_service().to_string()))
    );

    // A dynamic port never takes an SEI.
    add_port!(service, Some(&caller), extra.clone());
    assert_eq!(
        service.update_endpoint(
            EndpointUpdate::get_port(Some(extra.clone()), Some(Arc::new(calc_sei()))),
            Some(&caller)
        ),
        Err(DescriptionError::DynamicPortWithSei(extra.to_string()))
    );
    assert_eq!(service.snapshot().endpoints().len(), 1);
}

#[test]
fn integration_client_dispatch_then_proxy_on_same_port() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let service = calc_client();
    let port = calc_port("CalcSoap11Port");
    let id = create_dispatch!(service, None, port.clone());
    assert_eq!(create_dispatch!(service, None, port.clone()), id);

    let graph = service.snapshot();
    let interface = graph.endpoint(&port).unwrap().require_interface().unwrap();
    assert_eq!(interface.sei_class_name(), None);
    assert_eq!(interface.name(), "Calc");
    assert_eq!(interface.dispatchable_operations().len(), 3);
    let add = interface.operation("add").unwrap();
    assert!(add.method().is_none());
    assert!(add.parameters().is_empty());
    assert_eq!(add.input_action(), "http://example.com/calc/Calc/addRequest");

    assert_eq!(get_port!(service, None, Some(port.clone()), calc_sei()), id);
    let graph = service.snapshot();
    let interface = graph.endpoint(&port).unwrap().require_interface().unwrap();
    assert_eq!(interface.sei_class_name(), Some("com.example.calc.Calc"));
    assert_eq!(interface.operations().len(), 5);
    assert_eq!(interface.operation("add").unwrap().parameters().len(), 2);
    assert_eq!(interface.dispatchable_operations().len(), 3);
}

#[test]
fn integration_client_dispatch_table_follows_attached_sei() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let service = calc_client();
    let port = calc_port("CalcSoap11Port");
    create_dispatch!(service, None, port.clone());
    {
        let graph = service.snapshot();
        let interface = graph.endpoint(&port).unwrap().require_interface().unwrap();
        assert_eq!(interface.dispatchable_operation("add").len(), 1);
        assert!(interface.dispatchable_operation("multiply").is_empty());
        assert!(interface.is_dispatch_table_built());
    }

    let sei = calc_sei().with_method(
        MethodFacts::new("multiply", "int").param("int").param("int").with_web_method(WebMethodFacts::default()),
    );
    get_port!(service, None, Some(port.clone()), sei);
    let graph = service.snapshot();
    let interface = graph.endpoint(&port).unwrap().require_interface().unwrap();
    assert!(!interface.is_dispatch_table_built());
    let multiply = interface.dispatchable_operation("multiply");
    assert_eq!(multiply.len(), 1);
    assert_eq!(multiply[0].java_method_name(), Some("multiply"));
    assert_eq!(interface.dispatchable_operation("add").len(), 1);
    assert_eq!(interface.dispatchable_operations().len(), 4);
}

#[test]
fn integration_client_fetches_remote_wsdl() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let (port, server) = serve_wsdl(CALC_WSDL, 1);
    let location = format!("http://127.0.0.1:{}/calc?wsdl", port);
    let request = ServiceRequest::new(calc_service()).with_wsdl_location(&location);
    let service = ServiceDescriptor::client(&empty_scope(), &request, None).unwrap();
    server.join().unwrap();
    assert_eq!(service.wsdl_location(), Some(location));
    assert_eq!(service.ports(None).unwrap().len(), 3);

    let id = get_port!(service, None, Some(calc_port("CalcSoap12Port")), calc_sei());
    let graph = service.snapshot();
    assert_eq!(graph.endpoint_by_id(id).unwrap().endpoint_address().as_deref(), Some(SOAP12_ADDRESS));
}

#[test]
fn integration_client_wsdl_resolution_errors() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let scope = calc_scope();
    let missing = ServiceRequest::new(QName::new(CALC_NS, "Missing")).with_wsdl_location(CALC_WSDL_NAME);
    assert_eq!(
        ServiceDescriptor::client(&scope, &missing, None).unwrap_err(),
        DescriptionError::ServiceNotInWsdl(QName::new(CALC_NS, "Missing").to_string())
    );

    let overridden = ServiceRequest::new(calc_service())
        .with_sparse(SparseComposite::new().with_wsdl_location("nowhere/calc.wsdl"));
    assert_eq!(
        ServiceDescriptor::client(&scope, &overridden, None).unwrap_err(),
        DescriptionError::UnresolvableWsdlLocation("nowhere/calc.wsdl".into())
    );

    // The override wins over the request location.
    let caller = CallerScope::new();
    let overridden = ServiceRequest::new(calc_service())
        .with_wsdl_location("nowhere/calc.wsdl")
        .with_sparse(SparseComposite::new().with_wsdl_location(CALC_WSDL_NAME));
    let service = ServiceDescriptor::client(&scope, &overridden, Some(&caller)).unwrap();
    assert_eq!(service.wsdl_location().as_deref(), Some(CALC_WSDL_NAME));
    assert!(service.snapshot().sparse_composite(caller.key()).is_some());
}
