//! Endpoint interface descriptors.
//!
//! ## Construction
//!
//! An interface is seeded from the WSDL port type of its endpoint (one
//! operation per port type operation, in document order), then augmented
//! from Java methods: a method whose operation name matches a port type
//! operation not yet bound to a method is attached to it, any other method
//! is appended as a new operation. Without WSDL and without methods, a provider
//! endpoint gets the single generic provider operation.
//!
//! Methods come from an explicit SEI (all methods, super-interfaces included)
//! or from the implementation class acting as implicit SEI, filtered by the
//! method-exposure rules.
//!
//! ## Dispatch
//!
//! The dispatch table groups the non-excluded, non-asynchronous operations by
//! wire operation name. It is built on first access and reset with the other
//! caches when an update adds operations. Document/literal/bare operations are
//! additionally routed by body element name; that table is built eagerly so
//! that conflicting keys fail construction.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    sync::Arc,
};

#[cfg(feature = "description_tracing")]
use tracing::{debug, warn};

use crate::description::{
    core::{
        endpoint::EndpointDescriptor,
        graph::{
            DescriptionGraph, EndpointId, InterfaceId, InterfaceNode, OperationId, OperationNode, ParameterNode,
            RoutingKey,
        },
        operation::{OperationDescriptor, method_faults, method_operation_name},
    },
    error::DescriptionError,
    facts::{
        ClassFacts, FactsCatalog, MethodFacts, ParameterStyle, Style, Use,
        precedence::{Attribute, Candidates, Memo, Resolved, resolve, text},
    },
    infrastructure::{
        naming::{QName, namespace_from_class, simple_class_name},
        wsdl::model::PortType,
    },
};

#[derive(Debug, Clone, Default)]
pub(crate) struct InterfaceCache {
    name: Memo<String>,
    target_namespace: Memo<String>,
    style: Memo<Resolved<Style>>,
    use_: Memo<Resolved<Use>>,
    parameter_style: Memo<Resolved<ParameterStyle>>,
    dispatch: Memo<BTreeMap<String, Vec<OperationId>>>,
}

impl InterfaceCache {
    pub(crate) fn reset(&mut self) {
        self.name.reset();
        self.target_namespace.reset();
        self.style.reset();
        self.use_.reset();
        self.parameter_style.reset();
        self.dispatch.reset();
    }

    pub(crate) fn is_dispatch_built(&self) -> bool {
        self.dispatch.is_initialized()
    }
}

/// `@WebService.name` of an SEI, else its simple class name.
pub(crate) fn sei_name(sei: &ClassFacts) -> String {
    text(sei.web_service.as_ref().and_then(|w| w.name.as_deref()))
        .unwrap_or_else(|| simple_class_name(&sei.class_name).to_string())
}

/// `@WebService.targetNamespace` of an SEI, else the package-derived default.
pub(crate) fn sei_target_namespace(sei: &ClassFacts) -> String {
    text(sei.web_service.as_ref().and_then(|w| w.target_namespace.as_deref()))
        .unwrap_or_else(|| namespace_from_class(&sei.class_name))
}

/// Methods of an explicit SEI, super-interfaces included.
pub(crate) fn sei_methods(sei: &ClassFacts, catalog: &FactsCatalog) -> Result<Vec<Arc<MethodFacts>>, DescriptionError> {
    let mut methods: Vec<Arc<MethodFacts>> = Vec::new();
    let inherited = catalog.super_interfaces(sei);
    let declared = sei.methods.iter().chain(inherited.iter().flat_map(|i| i.methods.iter()));
    for method in declared {
        if method.is_constructor() || method.is_object_method() {
            continue;
        }
        if !method.is_public {
            return Err(DescriptionError::InvalidSei(
                sei.class_name.clone(),
                format!("method {} is not public", method.name),
            ));
        }
        if !methods.iter().any(|m| m.same_signature(method)) {
            methods.push(method.clone());
        }
    }
    Ok(methods)
}

/// Public methods of a class and of its superclasses carrying `@WebService`,
/// overridden methods counted once.
pub(crate) fn implicit_candidates(class: &ClassFacts, catalog: &FactsCatalog) -> Vec<Arc<MethodFacts>> {
    let parents = catalog.superclasses(class);
    let web_service_parents = parents.iter().take_while(|p| p.web_service.is_some());
    let mut methods: Vec<Arc<MethodFacts>> = Vec::new();
    for method in class.methods.iter().chain(web_service_parents.flat_map(|p| p.methods.iter())) {
        if method.is_constructor() || method.is_object_method() || !method.is_public {
            continue;
        }
        if !methods.iter().any(|m| m.same_signature(method)) {
            methods.push(method.clone());
        }
    }
    methods
}

/// Methods an implementation class exposes when it acts as its own SEI.
///
/// Standard rules expose every public, non-static, non-final method minus the
/// excluded ones. Legacy rules expose only `@WebMethod` methods when any
/// method carries one.
pub(crate) fn implicit_methods(class: &ClassFacts, catalog: &FactsCatalog, legacy: bool) -> Vec<Arc<MethodFacts>> {
    let candidates = implicit_candidates(class, catalog);
    let annotated: Vec<_> =
        candidates.iter().filter(|m| m.web_method.as_ref().is_some_and(|w| !w.exclude)).cloned().collect();
    if legacy && !annotated.is_empty() {
        return annotated.into_iter().filter(|m| !m.is_static).collect();
    }
    candidates
        .into_iter()
        .filter(|m| !m.web_method.as_ref().is_some_and(|w| w.exclude) && !m.is_static && !m.is_final)
        .collect()
}

/// Builds the interface of an endpoint. Returns `None` when the endpoint has
/// neither a port type nor methods and is not a provider.
pub(crate) fn build_interface(
    graph: &mut DescriptionGraph,
    endpoint: EndpointId,
    sei: Option<Arc<ClassFacts>>,
    explicit: bool,
) -> Result<Option<InterfaceId>, DescriptionError> {
    let wsdl_operations: Option<Vec<String>> = EndpointDescriptor::new(graph, endpoint)
        .with_wsdl_port_type(|_, port_type| port_type.operations.iter().map(|o| o.name.clone()).collect());
    let methods = match &sei {
        Some(sei) if explicit => sei_methods(sei, graph.catalog())?,
        Some(sei) => {
            let legacy = graph.scope().config().legacy_web_method_rules;
            implicit_methods(sei, graph.catalog(), legacy)
        }
        None => Vec::new(),
    };
    let is_provider = graph.endpoint_node(endpoint).implementation.as_ref().is_some_and(|i| i.is_provider());
    if wsdl_operations.is_none() && sei.is_none() && !is_provider {
        return Ok(None);
    }

    let interface = graph.push_interface(InterfaceNode {
        endpoint,
        sei: sei.clone(),
        operations: Vec::new(),
        routing: BTreeMap::new(),
        cache: InterfaceCache::default(),
    });
    graph.endpoint_node_mut(endpoint).interface = Some(interface);

    for name in wsdl_operations.iter().flatten() {
        let operation = new_operation(interface, None, Some(name.clone()), false);
        push_operation(graph, interface, operation);
    }
    if is_provider && wsdl_operations.is_none() {
        let operation = new_operation(interface, None, None, true);
        push_operation(graph, interface, operation);
    } else if let Some(sei) = &sei {
        attach_methods(graph, interface, sei, &methods);
    }

    graph.reset_endpoint_caches(endpoint);
    rebuild_routing(graph, interface)?;
    #[cfg(feature = "description_tracing")]
    debug!(
        "[interface] built interface for port {} with {} operation(s)",
        graph.endpoint_node(endpoint).port_qname,
        graph.interface_node(interface).operations.len()
    );
    Ok(Some(interface))
}

/// Attaches an SEI to an interface built without one.
pub(crate) fn update_with_sei(
    graph: &mut DescriptionGraph,
    interface: InterfaceId,
    sei: Arc<ClassFacts>,
) -> Result<(), DescriptionError> {
    let methods = sei_methods(&sei, graph.catalog())?;
    graph.interface_node_mut(interface).sei = Some(sei.clone());
    attach_methods(graph, interface, &sei, &methods);
    let endpoint = graph.interface_node(interface).endpoint;
    graph.reset_endpoint_caches(endpoint);
    rebuild_routing(graph, interface)
}

fn new_operation(
    interface: InterfaceId,
    method: Option<Arc<MethodFacts>>,
    wsdl_name: Option<String>,
    generic_provider: bool,
) -> OperationNode {
    OperationNode {
        interface,
        method,
        wsdl_name,
        generic_provider,
        parameters: Vec::new(),
        faults: Vec::new(),
        cache: Default::default(),
    }
}

fn push_operation(graph: &mut DescriptionGraph, interface: InterfaceId, operation: OperationNode) -> OperationId {
    let id = graph.push_operation(operation);
    graph.interface_node_mut(interface).operations.push(id);
    id
}

fn attach_methods(graph: &mut DescriptionGraph, interface: InterfaceId, sei: &ClassFacts, methods: &[Arc<MethodFacts>]) {
    let namespace = sei_target_namespace(sei);
    let server_side = graph.is_server_side();
    for method in methods {
        let name = method_operation_name(method);
        let unbound = graph.interface_node(interface).operations.iter().copied().find(|id| {
            let node = graph.operation_node(*id);
            !method.is_async() && node.method.is_none() && node.wsdl_name.as_deref() == Some(name.as_str())
        });
        let faults = method_faults(method, graph.catalog(), server_side, &namespace);
        let parameters: Vec<ParameterNode> =
            method.parameters.iter().enumerate().map(|(index, facts)| ParameterNode::new(index, facts.clone())).collect();
        match unbound {
            Some(id) => {
                let node = graph.operation_node_mut(id);
                node.method = Some(method.clone());
                node.parameters = parameters;
                node.faults = faults;
                node.reset_caches();
            }
            None => {
                let mut operation = new_operation(interface, Some(method.clone()), None, false);
                operation.parameters = parameters;
                operation.faults = faults;
                push_operation(graph, interface, operation);
            }
        }
    }
}

/// Rebuilds the body-element routing table. The first operation claiming a
/// key keeps it; later claimants are not registered.
pub(crate) fn rebuild_routing(graph: &mut DescriptionGraph, interface: InterfaceId) -> Result<(), DescriptionError> {
    let mut claims: Vec<(RoutingKey, OperationId)> = Vec::new();
    {
        let view = EndpointInterfaceDescriptor::new(graph, interface);
        for operation in view.operations() {
            if operation.is_excluded() || operation.is_async_client_method() {
                continue;
            }
            if let Some(key) = operation.routing_key()? {
                claims.push((key, operation.id()));
            }
        }
    }
    let mut routing = BTreeMap::new();
    for (key, operation) in claims {
        match routing.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(operation);
            }
            Entry::Occupied(_entry) => {
                #[cfg(feature = "description_tracing")]
                warn!(
                    "[interface] routing key {:?} already claimed by {:?}, {:?} not registered",
                    _entry.key(),
                    _entry.get(),
                    operation
                );
            }
        }
    }
    graph.interface_node_mut(interface).routing = routing;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct EndpointInterfaceDescriptor<'g> {
    graph: &'g DescriptionGraph,
    id: InterfaceId,
}

impl<'g> EndpointInterfaceDescriptor<'g> {
    pub(crate) fn new(graph: &'g DescriptionGraph, id: InterfaceId) -> Self {
        Self { graph, id }
    }

    fn node(&self) -> &'g InterfaceNode {
        self.graph.interface_node(self.id)
    }

    pub fn id(&self) -> InterfaceId {
        self.id
    }

    pub fn endpoint(&self) -> EndpointDescriptor<'g> {
        EndpointDescriptor::new(self.graph, self.node().endpoint)
    }

    /// SEI composite: the explicit SEI or the implementation acting as one.
    pub fn sei(&self) -> Option<&'g Arc<ClassFacts>> {
        self.node().sei.as_ref()
    }

    pub fn sei_class_name(&self) -> Option<&'g str> {
        self.sei().map(|s| s.class_name.as_str())
    }

    pub fn wsdl_port_type(&self) -> Option<PortType> {
        self.endpoint().with_wsdl_port_type(|_, port_type| port_type.clone())
    }

    pub fn name(&self) -> String {
        self.node()
            .cache
            .name
            .get_or_init(|| match self.sei() {
                Some(sei) => sei_name(sei),
                None => self
                    .wsdl_port_type()
                    .map(|p| p.name.local_part)
                    .unwrap_or_else(|| self.endpoint().port_qname().local_part.clone()),
            })
            .clone()
    }

    pub fn target_namespace(&self) -> String {
        self.node()
            .cache
            .target_namespace
            .get_or_init(|| match self.sei() {
                Some(sei) => sei_target_namespace(sei),
                None => self
                    .wsdl_port_type()
                    .map(|p| p.name.namespace)
                    .unwrap_or_else(|| self.graph.service_qname().namespace.clone()),
            })
            .clone()
    }

    pub fn port_type(&self) -> QName {
        QName::new(self.target_namespace(), self.name())
    }

    pub fn resolved_style(&self) -> Resolved<Style> {
        self.node()
            .cache
            .style
            .get_or_init(|| {
                let wsdl = self.endpoint().with_wsdl_binding(|_, b| b.soap_style().and_then(Style::parse)).flatten();
                let annotation = self.sei().and_then(|s| s.soap_binding.as_ref()).and_then(|b| b.style);
                resolve(Attribute::Style, Candidates::new().with_wsdl(wsdl).with_annotation(annotation), Style::default())
            })
            .clone()
    }

    pub fn style(&self) -> Style {
        self.resolved_style().value
    }

    pub fn resolved_use(&self) -> Resolved<Use> {
        self.node()
            .cache
            .use_
            .get_or_init(|| {
                let wsdl = self
                    .endpoint()
                    .with_wsdl_binding(|_, b| {
                        b.operations.iter().find_map(|o| o.input.as_ref().and_then(|i| i.soap_body_use()).and_then(Use::parse))
                    })
                    .flatten();
                let annotation = self.sei().and_then(|s| s.soap_binding.as_ref()).and_then(|b| b.use_);
                resolve(Attribute::Use, Candidates::new().with_wsdl(wsdl).with_annotation(annotation), Use::default())
            })
            .clone()
    }

    pub fn use_(&self) -> Use {
        self.resolved_use().value
    }

    pub fn resolved_parameter_style(&self) -> Resolved<ParameterStyle> {
        self.node()
            .cache
            .parameter_style
            .get_or_init(|| {
                let annotation = self.sei().and_then(|s| s.soap_binding.as_ref()).and_then(|b| b.parameter_style);
                resolve(Attribute::ParameterStyle, Candidates::new().with_annotation(annotation), ParameterStyle::default())
            })
            .clone()
    }

    pub fn parameter_style(&self) -> ParameterStyle {
        self.resolved_parameter_style().value
    }

    /// Operations in construction order.
    pub fn operations(&self) -> Vec<OperationDescriptor<'g>> {
        self.node().operations.iter().map(|id| OperationDescriptor::new(self.graph, *id)).collect()
    }

    /// First operation with a wire name.
    pub fn operation(&self, name: &str) -> Option<OperationDescriptor<'g>> {
        self.operations().into_iter().find(|o| o.operation_name() == name)
    }

    /// Every operation sharing the local part of `name`; the namespace is ignored.
    pub fn operations_by_qname(&self, name: &QName) -> Vec<OperationDescriptor<'g>> {
        self.operations().into_iter().filter(|o| o.operation_name() == name.local_part).collect()
    }

    pub fn operation_for_java_method(&self, method_name: &str) -> Vec<OperationDescriptor<'g>> {
        self.operations().into_iter().filter(|o| o.java_method_name() == Some(method_name)).collect()
    }

    /// Operation bound to a method with the same name and parameter types.
    pub fn operation_for_method(&self, method: &MethodFacts) -> Option<OperationDescriptor<'g>> {
        self.operations().into_iter().find(|o| o.method().is_some_and(|m| m.same_signature(method)))
    }

    fn dispatch_table(&self) -> &'g BTreeMap<String, Vec<OperationId>> {
        self.node().cache.dispatch.get_or_init(|| {
            let mut table: BTreeMap<String, Vec<OperationId>> = BTreeMap::new();
            for operation in self.operations() {
                if operation.is_excluded() || operation.is_async_client_method() {
                    continue;
                }
                table.entry(operation.operation_name()).or_default().push(operation.id());
            }
            table
        })
    }

    /// Operations usable for inbound routing, in construction order.
    pub fn dispatchable_operations(&self) -> Vec<OperationDescriptor<'g>> {
        let table = self.dispatch_table();
        self.operations().into_iter().filter(|o| table.values().any(|ids| ids.contains(&o.id()))).collect()
    }

    /// Dispatchable operations sharing a wire operation name.
    pub fn dispatchable_operation(&self, name: &str) -> Vec<OperationDescriptor<'g>> {
        self.dispatch_table()
            .get(name)
            .map(|ids| ids.iter().map(|id| OperationDescriptor::new(self.graph, *id)).collect())
            .unwrap_or_default()
    }

    /// Operation routed by a document/literal/bare body element.
    pub fn routing_operation(&self, key: &RoutingKey) -> Option<OperationDescriptor<'g>> {
        self.node().routing.get(key).map(|id| OperationDescriptor::new(self.graph, *id))
    }

    pub fn routing_keys(&self) -> Vec<(RoutingKey, OperationDescriptor<'g>)> {
        self.node()
            .routing
            .iter()
            .map(|(key, id)| (key.clone(), OperationDescriptor::new(self.graph, *id)))
            .collect()
    }

    pub fn is_dispatch_table_built(&self) -> bool {
        self.node().cache.is_dispatch_built()
    }
}
