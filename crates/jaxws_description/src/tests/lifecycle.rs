use std::{fs, sync::Arc, thread};

use crate::description::{
    config::{ConfigurationScope, DescriptionConfig},
    core::{CallerScope, EndpointUpdate, ServiceDescriptor, ServiceRequest},
    error::DescriptionError,
    facts::{SparseComposite, precedence::FactOrigin},
    infrastructure::naming::{QName, binding},
    services::registry::DescriptionRegistry,
};

use super::fixtures::{CALC_NS, CALC_WSDL, CALC_WSDL_NAME, calc_port, calc_scope, calc_sei, calc_service, empty_scope};

fn calc_request() -> ServiceRequest {
    ServiceRequest::new(calc_service()).with_wsdl_location(CALC_WSDL_NAME)
}

#[test]
fn integration_registry_shares_one_description() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let registry = DescriptionRegistry::new();
    let scope = calc_scope();
    let first = registry.get_or_create(&scope, calc_request(), None).unwrap();
    let second = registry.get_or_create(&scope, calc_request(), None).unwrap();
    assert!(Arc::ptr_eq(first.service(), second.service()));
    assert_eq!(registry.use_count(first.key()), 2);
    assert_eq!(registry.len(), 1);

    // A request without WSDL location is another description.
    let other = registry.get_or_create(&scope, ServiceRequest::new(calc_service()), None).unwrap();
    assert!(!Arc::ptr_eq(first.service(), other.service()));
    assert_eq!(registry.len(), 2);

    let id = get_port!(first, None, None, calc_sei());
    assert_eq!(get_port!(second, None, None, calc_sei()), id);

    let key = first.key().clone();
    let service = first.service().clone();
    assert_eq!(first.release(), Ok(false));
    assert_eq!(registry.use_count(&key), 1);
    assert!(!service.is_released());
    assert_eq!(second.release(), Ok(true));
    assert!(!registry.contains(&key));
    assert!(service.is_released());
    assert!(!scope.is_client_name_registered("CalcService.CalcSoap11Port"));
    assert_eq!(
        service.update_endpoint(EndpointUpdate::create_dispatch(calc_port("CalcSoap11Port")), None),
        Err(DescriptionError::AlreadyReleased(calc_service().to_string()))
    );
}

#[test]
fn integration_registry_concurrent_acquire() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let registry = DescriptionRegistry::new();
    let scope = calc_scope();
    let handles = thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    let handle = registry.get_or_create(&scope, calc_request(), None).unwrap();
                    let id = get_port!(handle, None, None, calc_sei());
                    (handle, id)
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect::<Vec<_>>()
    });

    let (first, id) = &handles[0];
    assert!(handles.iter().all(|(h, i)| Arc::ptr_eq(h.service(), first.service()) && i == id));
    assert_eq!(registry.use_count(first.key()), 8);
    assert_eq!(first.snapshot().endpoints().len(), 1);

    let key = first.key().clone();
    drop(handles);
    assert!(!registry.contains(&key));
    assert!(registry.is_empty());
}

#[test]
fn integration_registry_caller_release_keeps_shared_description() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let registry = DescriptionRegistry::new();
    let scope = calc_scope();
    let alice = CallerScope::new();
    let bob = CallerScope::new();
    let extra = calc_port("Extra");

    let for_alice = registry
        .get_or_create(
            &scope,
            calc_request().with_sparse(SparseComposite::new().with_preferred_port(calc_port("CalcSoap12Port"))),
            Some(&alice),
        )
        .unwrap();
    let for_bob = registry.get_or_create(&scope, calc_request(), Some(&bob)).unwrap();
    assert!(Arc::ptr_eq(for_alice.service(), for_bob.service()));

    add_port!(for_alice, Some(&alice), extra.clone());
    let graph = for_alice.snapshot();
    assert_eq!(graph.preferred_port(Some(alice.key())), Some(calc_port("CalcSoap12Port")));
    assert_eq!(graph.preferred_port(Some(bob.key())), None);
    assert!(for_alice.ports(Some(&alice)).unwrap().contains(&extra));
    assert!(!for_bob.ports(Some(&bob)).unwrap().contains(&extra));

    // Alice's preferred port is used when she gives none. Bob then finds the
    // endpoint already bound to the SEI.
    let id = get_port!(for_alice, Some(&alice), None, calc_sei());
    assert_eq!(for_alice.snapshot().endpoint_by_id(id).unwrap().port_qname(), &calc_port("CalcSoap12Port"));
    assert_eq!(get_port!(for_bob, Some(&bob), None, calc_sei()), id);

    let service = for_bob.service().clone();
    assert_eq!(for_alice.release(), Ok(false));
    let graph = service.snapshot();
    assert!(graph.endpoint_for_caller(&extra, Some(alice.key())).is_none());
    assert_eq!(graph.preferred_port(Some(alice.key())), None);
    assert!(!scope.is_client_name_registered("CalcService.Extra"));
    assert!(!service.is_released());

    assert_eq!(for_bob.release(), Ok(true));
    assert!(service.is_released());
}

#[test]
fn integration_dynamic_ports_are_shared_until_last_caller() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let scope = empty_scope();
    let registry = DescriptionRegistry::new();
    let handle = registry.get_or_create(&scope, ServiceRequest::new(QName::new(CALC_NS, "DynService")), None).unwrap();
    let port = calc_port("Dyn");
    let update = || EndpointUpdate::add_port(port.clone(), Some(binding::HTTP), Some("http://host/dyn"));

    let alice = CallerScope::new();
    let bob = CallerScope::new();
    let alice_key = alice.key();
    let first = handle.update_endpoint(update(), Some(&alice)).unwrap();
    let second = handle.update_endpoint(update(), Some(&bob)).unwrap();
    assert_eq!(first, second);
    assert_eq!(handle.update_endpoint(update(), Some(&alice)), Ok(first));
    assert!(handle.ports(None).unwrap().is_empty());

    let graph = handle.snapshot();
    let endpoint = graph.endpoint_for_caller(&port, Some(alice_key)).unwrap();
    assert!(endpoint.is_dynamic());
    assert!(endpoint.interface().is_none());
    assert!(endpoint.dispatchable_operations().is_empty());
    assert_eq!(endpoint.resolved_binding_type().origin, FactOrigin::Annotation);
    assert_eq!(endpoint.binding_type(), binding::HTTP);
    assert_eq!(endpoint.endpoint_address().as_deref(), Some("http://host/dyn"));
    assert_eq!(endpoint.client_name(), Some("DynService.Dyn"));

    drop(alice);
    assert_eq!(handle.pending_reclaims(), 0);
    let graph = handle.snapshot();
    assert!(graph.endpoint_for_caller(&port, Some(alice_key)).is_none());
    assert_eq!(graph.endpoint_for_caller(&port, Some(bob.key())).unwrap().id(), first);
    assert!(scope.is_client_name_registered("DynService.Dyn"));

    drop(bob);
    assert!(!scope.is_client_name_registered("DynService.Dyn"));
    assert!(handle.snapshot().endpoint_by_id(first).is_none());

    // A new caller gets a fresh endpoint; the released one is never reused.
    let carol = CallerScope::new();
    let third = handle.update_endpoint(update(), Some(&carol)).unwrap();
    assert_ne!(third, first);
    assert_eq!(handle.snapshot().endpoint_by_id(third).unwrap().client_name(), Some("DynService.Dyn"));
}

#[test]
fn integration_released_dynamic_ports_leave_the_graph() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let scope = empty_scope();
    let service = ServiceDescriptor::client(&scope, &ServiceRequest::new(QName::new(CALC_NS, "DynService")), None).unwrap();
    for i in 0..200 {
        let caller = CallerScope::new();
        add_port!(service, Some(&caller), calc_port(&format!("Dyn{}", i)));
    }
    let caller = CallerScope::new();
    let id = add_port!(service, Some(&caller), calc_port("Last"));
    assert_eq!(service.pending_reclaims(), 0);

    let graph = service.snapshot();
    assert_eq!(graph.endpoint_count(), 1);
    assert_eq!(graph.endpoints_for_caller(Some(caller.key())).len(), 1);
    assert_eq!(graph.endpoint_by_id(id).unwrap().client_name(), Some("DynService.Last"));
    assert!(!scope.is_client_name_registered("DynService.Dyn0"));
    assert!(!scope.is_client_name_registered("DynService.Dyn199"));

    service.release_resources(None);
    assert_eq!(service.snapshot().endpoint_count(), 0);
    assert!(!scope.is_client_name_registered("DynService.Last"));
}

#[test]
fn integration_dynamic_port_then_dispatch_without_wsdl() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let scope = empty_scope();
    let registry = DescriptionRegistry::new();
    let handle = registry.get_or_create(&scope, ServiceRequest::new(QName::new(CALC_NS, "DynService")), None).unwrap();
    let caller = CallerScope::new();
    let port = calc_port("Dyn");

    assert_eq!(
        handle.update_endpoint(EndpointUpdate::create_dispatch(port.clone()), Some(&caller)),
        Err(DescriptionError::UndeclaredPort(QName::new(CALC_NS, "DynService").to_string(), port.to_string()))
    );
    let id = add_port!(handle, Some(&caller), port.clone());
    assert_eq!(create_dispatch!(handle, Some(&caller), port.clone()), id);
    assert_eq!(
        handle.update_endpoint(EndpointUpdate::add_port(port.clone(), None, None), None),
        Err(DescriptionError::MissingCallerKey(port.to_string()))
    );
}

#[test]
fn integration_reloadable_wsdl_definition() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let scope = ConfigurationScope::new(
        DescriptionConfig::default().with_resource(CALC_WSDL_NAME, CALC_WSDL).with_reduce_wsdl_memory(true),
    );
    let registry = DescriptionRegistry::new();
    let handle = registry.get_or_create(&scope, calc_request(), None).unwrap();
    assert!(handle.wsdl_definition().unwrap().is_some());
    let id = get_port!(handle, None, Some(calc_port("CalcSoap12Port")), calc_sei());
    let graph = handle.snapshot();
    let endpoint = graph.endpoint_by_id(id).unwrap();
    assert_eq!(endpoint.binding_type(), binding::SOAP12_HTTP);
    assert_eq!(endpoint.wsdl_port().map(|p| p.name), Some("CalcSoap12Port".to_string()));
}

#[test]
fn integration_reloadable_wsdl_reports_missing_document() {
    #[cfg(feature = "description_tracing")]
    crate::description_tracing::init();
    let dir = std::env::temp_dir().join(format!("jaxws-reload-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(CALC_WSDL_NAME);
    fs::write(&path, CALC_WSDL).unwrap();
    let location = path.display().to_string();
    let scope = ConfigurationScope::new(DescriptionConfig::default().with_reduce_wsdl_memory(true));
    let request = ServiceRequest::new(calc_service()).with_wsdl_location(location.clone());
    let service = ServiceDescriptor::client(&scope, &request, None).unwrap();

    // Holders share one reloaded definition, even once the document is gone.
    let held = service.wsdl_definition().unwrap().unwrap();
    assert!(Arc::ptr_eq(&held, &service.wsdl_definition().unwrap().unwrap()));
    fs::remove_file(&path).unwrap();
    assert!(Arc::ptr_eq(&held, &service.wsdl_definition().unwrap().unwrap()));
    assert_eq!(service.ports(None).unwrap().len(), 3);

    drop(held);
    assert!(matches!(service.wsdl_definition(), Err(DescriptionError::WsdlRead(l, _)) if l == location));
    assert!(matches!(service.ports(None), Err(DescriptionError::WsdlRead(..))));
    assert!(matches!(
        service.update_endpoint(EndpointUpdate::create_dispatch(calc_port("CalcSoap11Port")), None),
        Err(DescriptionError::WsdlRead(..))
    ));
    fs::remove_dir_all(&dir).unwrap();
}
