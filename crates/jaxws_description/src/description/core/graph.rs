//! Arena holding the entities of one service description.
//!
//! Services, endpoints, endpoint interfaces and operations are stored in flat
//! arenas and refer to each other through typed ids; parameters live inline in
//! their operation. Parent links are ids as well, so the graph has no ownership
//! cycles and can be cloned as a whole. Ids are never reused: releasing an
//! endpoint removes it, its interface and its operations from the arenas.
//!
//! A [`DescriptionGraph`] is immutable once published. Updates clone the current
//! graph, mutate the clone, reset the caches of the affected subtree and publish
//! the clone; readers holding the previous snapshot keep a consistent view.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError, Weak},
};

#[cfg(feature = "description_tracing")]
use tracing::{debug, warn};

use crate::description::{
    config::ConfigurationScope,
    core::{
        endpoint::{EndpointCache, EndpointDescriptor, GeneratedDefinition},
        fault::FaultDescriptor,
        interface::{EndpointInterfaceDescriptor, InterfaceCache},
        operation::{OperationCache, OperationDescriptor},
        parameter::ParameterCache,
    },
    error::DescriptionError,
    facts::{
        ClassFacts, FactsCatalog, HandlerChainFacts, MethodFacts, ParameterFacts, SparseComposite,
        precedence::{Attribute, Candidates, resolve},
    },
    infrastructure::{
        naming::QName,
        wsdl::{Definition, locator::WsdlLocator},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub(crate) usize);

/// Identity of a caller scope, the key of caller-scoped overrides and dynamic ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallerKey(pub(crate) u64);

/// Access to the WSDL definition of a service.
#[derive(Debug, Clone, Default)]
pub(crate) enum WsdlHandle {
    #[default]
    Absent,
    /// Definition kept in memory for the lifetime of the description.
    Pinned { location: Option<String>, definition: Arc<Definition> },
    /// Definition reloaded from its location once no holder keeps it alive.
    /// The weak cache is shared by every snapshot of the description.
    Reloadable { location: String, cached: Arc<Mutex<Weak<Definition>>> },
}

impl WsdlHandle {
    pub(crate) fn new(location: Option<String>, definition: Arc<Definition>, reduce_memory: bool) -> Self {
        match location {
            Some(location) if reduce_memory => {
                Self::Reloadable { location, cached: Arc::new(Mutex::new(Arc::downgrade(&definition))) }
            }
            location => Self::Pinned { location, definition },
        }
    }

    pub(crate) fn location(&self) -> Option<&str> {
        match self {
            WsdlHandle::Absent => None,
            WsdlHandle::Pinned { location, .. } => location.as_deref(),
            WsdlHandle::Reloadable { location, .. } => Some(location),
        }
    }

    pub(crate) fn is_present(&self) -> bool {
        !matches!(self, WsdlHandle::Absent)
    }

    /// The definition, reloading it if every holder dropped it.
    pub(crate) fn definition(&self, scope: &ConfigurationScope) -> Result<Option<Arc<Definition>>, DescriptionError> {
        match self {
            WsdlHandle::Absent => Ok(None),
            WsdlHandle::Pinned { definition, .. } => Ok(Some(definition.clone())),
            WsdlHandle::Reloadable { location, cached } => {
                let mut cached = cached.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(definition) = cached.upgrade() {
                    return Ok(Some(definition));
                }
                let definition = WsdlLocator::new(scope.config()).load(location).map_err(|e| match e {
                    DescriptionError::UnresolvableWsdlLocation(_) => {
                        DescriptionError::WsdlRead(location.clone(), "document no longer available".to_string())
                    }
                    e => e,
                })?;
                #[cfg(feature = "description_tracing")]
                debug!("[wsdl] reloaded {}", location);
                *cached = Arc::downgrade(&definition);
                Ok(Some(definition))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ServiceNode {
    pub qname: QName,
    pub server_side: bool,
    pub scope: Arc<ConfigurationScope>,
    /// Service class composite on the client side, implementation composite on the server side.
    pub composite: Arc<ClassFacts>,
    pub catalog: Arc<FactsCatalog>,
    pub wsdl: WsdlHandle,
    pub sparse: BTreeMap<CallerKey, Arc<SparseComposite>>,
    /// Declared endpoints in creation order.
    pub declared: Vec<EndpointId>,
    pub dynamic: BTreeMap<CallerKey, BTreeMap<QName, EndpointId>>,
    /// Dynamic endpoints shared between callers, keyed by `port:binding:address`.
    pub shared_dynamic: BTreeMap<String, EndpointId>,
}

#[derive(Debug, Clone)]
pub(crate) struct EndpointNode {
    pub port_qname: QName,
    pub dynamic: bool,
    /// Server-side implementation composite.
    pub implementation: Option<Arc<ClassFacts>>,
    /// Explicit SEI composite.
    pub sei: Option<Arc<ClassFacts>>,
    pub interface: Option<InterfaceId>,
    pub sparse: BTreeMap<CallerKey, Arc<SparseComposite>>,
    pub client_binding_id: Option<String>,
    pub explicit_address: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub client_name: Option<String>,
    /// Contract synthesized for this endpoint, kept across cache resets.
    pub generated: Option<Arc<GeneratedDefinition>>,
    pub cache: EndpointCache,
}

impl EndpointNode {
    pub(crate) fn new(port_qname: QName, dynamic: bool) -> Self {
        Self {
            port_qname,
            dynamic,
            implementation: None,
            sei: None,
            interface: None,
            sparse: BTreeMap::new(),
            client_binding_id: None,
            explicit_address: None,
            properties: BTreeMap::new(),
            client_name: None,
            generated: None,
            cache: EndpointCache::default(),
        }
    }

    /// Composite carrying the endpoint-level annotations.
    pub(crate) fn composite(&self) -> Option<&Arc<ClassFacts>> {
        self.implementation.as_ref().or(self.sei.as_ref())
    }
}

/// Routing key of a document/literal/bare operation: the body element name,
/// or `None` for operations without a body parameter.
pub type RoutingKey = Option<QName>;

#[derive(Debug, Clone)]
pub(crate) struct InterfaceNode {
    pub endpoint: EndpointId,
    /// Explicit SEI, or the implementation class acting as implicit SEI.
    pub sei: Option<Arc<ClassFacts>>,
    pub operations: Vec<OperationId>,
    pub routing: BTreeMap<RoutingKey, OperationId>,
    pub cache: InterfaceCache,
}

#[derive(Debug, Clone)]
pub(crate) struct OperationNode {
    pub interface: InterfaceId,
    pub method: Option<Arc<MethodFacts>>,
    /// Port type operation this descriptor was created from.
    pub wsdl_name: Option<String>,
    pub generic_provider: bool,
    pub parameters: Vec<ParameterNode>,
    pub faults: Vec<FaultDescriptor>,
    pub cache: OperationCache,
}

#[derive(Debug, Clone)]
pub(crate) struct ParameterNode {
    pub index: usize,
    pub facts: ParameterFacts,
    pub cache: ParameterCache,
}

impl ParameterNode {
    pub(crate) fn new(index: usize, facts: ParameterFacts) -> Self {
        Self { index, facts, cache: ParameterCache::default() }
    }
}

/// Nodes of one kind keyed by a monotonically increasing index.
#[derive(Debug, Clone)]
pub(crate) struct Arena<T> {
    nodes: BTreeMap<usize, T>,
    next: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { nodes: BTreeMap::new(), next: 0 }
    }
}

impl<T> Arena<T> {
    fn insert(&mut self, node: T) -> usize {
        let index = self.next;
        self.next += 1;
        self.nodes.insert(index, node);
        index
    }

    fn get(&self, index: usize) -> Option<&T> {
        self.nodes.get(&index)
    }

    fn remove(&mut self, index: usize) -> Option<T> {
        self.nodes.remove(&index)
    }

    fn contains(&self, index: usize) -> bool {
        self.nodes.contains_key(&index)
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn indices(&self) -> Vec<usize> {
        self.nodes.keys().copied().collect()
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.nodes.values_mut()
    }
}

impl<T> std::ops::Index<usize> for Arena<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.nodes[&index]
    }
}

impl<T> std::ops::IndexMut<usize> for Arena<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        self.nodes.get_mut(&index).unwrap_or_else(|| panic!("no arena node at index {}", index))
    }
}

/// One immutable snapshot of a service description.
#[derive(Debug, Clone)]
pub struct DescriptionGraph {
    pub(crate) service: ServiceNode,
    pub(crate) endpoints: Arena<EndpointNode>,
    pub(crate) interfaces: Arena<InterfaceNode>,
    pub(crate) operations: Arena<OperationNode>,
}

impl DescriptionGraph {
    pub(crate) fn new(service: ServiceNode) -> Self {
        Self { service, endpoints: Arena::default(), interfaces: Arena::default(), operations: Arena::default() }
    }

    pub(crate) fn push_endpoint(&mut self, node: EndpointNode) -> EndpointId {
        EndpointId(self.endpoints.insert(node))
    }

    pub(crate) fn push_interface(&mut self, node: InterfaceNode) -> InterfaceId {
        InterfaceId(self.interfaces.insert(node))
    }

    pub(crate) fn push_operation(&mut self, node: OperationNode) -> OperationId {
        OperationId(self.operations.insert(node))
    }

    pub(crate) fn endpoint_node(&self, id: EndpointId) -> &EndpointNode {
        &self.endpoints[id.0]
    }

    pub(crate) fn endpoint_node_mut(&mut self, id: EndpointId) -> &mut EndpointNode {
        &mut self.endpoints[id.0]
    }

    pub(crate) fn interface_node(&self, id: InterfaceId) -> &InterfaceNode {
        &self.interfaces[id.0]
    }

    pub(crate) fn interface_node_mut(&mut self, id: InterfaceId) -> &mut InterfaceNode {
        &mut self.interfaces[id.0]
    }

    pub(crate) fn operation_node(&self, id: OperationId) -> &OperationNode {
        &self.operations[id.0]
    }

    pub(crate) fn operation_node_mut(&mut self, id: OperationId) -> &mut OperationNode {
        &mut self.operations[id.0]
    }

    /// Endpoint nodes held by this snapshot, declared and dynamic.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Removes an endpoint with its interface and operations. Returns its client name.
    fn remove_endpoint(&mut self, id: EndpointId) -> Option<String> {
        let node = self.endpoints.remove(id.0)?;
        if let Some(interface) = node.interface.and_then(|i| self.interfaces.remove(i.0)) {
            for operation in interface.operations {
                self.operations.remove(operation.0);
            }
        }
        node.client_name
    }

    /// Clears every memoized value below an endpoint.
    pub(crate) fn reset_endpoint_caches(&mut self, id: EndpointId) {
        let endpoint = self.endpoint_node_mut(id);
        endpoint.cache.reset();
        if let Some(interface) = endpoint.interface {
            self.reset_interface_caches(interface);
        }
    }

    pub(crate) fn reset_interface_caches(&mut self, id: InterfaceId) {
        let interface = self.interface_node_mut(id);
        interface.cache.reset();
        let operations = interface.operations.clone();
        for operation in operations {
            self.operation_node_mut(operation).reset_caches();
        }
    }

    /// Clears every memoized value of the graph.
    pub(crate) fn reset_caches(&mut self) {
        for index in self.endpoints.indices() {
            self.reset_endpoint_caches(EndpointId(index));
        }
    }

    pub fn scope(&self) -> &Arc<ConfigurationScope> {
        &self.service.scope
    }

    pub fn catalog(&self) -> &Arc<FactsCatalog> {
        &self.service.catalog
    }

    pub fn service_qname(&self) -> &QName {
        &self.service.qname
    }

    pub fn is_server_side(&self) -> bool {
        self.service.server_side
    }

    /// Composite of the service class (client) or implementation class (server).
    pub fn service_composite(&self) -> &Arc<ClassFacts> {
        &self.service.composite
    }

    pub fn wsdl_location(&self) -> Option<&str> {
        self.service.wsdl.location()
    }

    pub fn has_wsdl(&self) -> bool {
        self.service.wsdl.is_present()
    }

    /// WSDL definition of the service. A reloadable definition that can no
    /// longer be read fails with [`DescriptionError::WsdlRead`].
    pub fn wsdl_definition(&self) -> Result<Option<Arc<Definition>>, DescriptionError> {
        self.service.wsdl.definition(&self.service.scope)
    }

    /// Definition for attributes that fall back to annotations when the WSDL
    /// cannot be read.
    pub(crate) fn wsdl_definition_or_none(&self) -> Option<Arc<Definition>> {
        self.wsdl_definition().unwrap_or_else(|_e| {
            #[cfg(feature = "description_tracing")]
            warn!("[wsdl] {} read without WSDL: {}", self.service.qname, _e);
            None
        })
    }

    /// Declared endpoints in creation order.
    pub fn endpoints(&self) -> Vec<EndpointDescriptor<'_>> {
        self.service.declared.iter().map(|id| EndpointDescriptor::new(self, *id)).collect()
    }

    /// Declared endpoint for a port.
    pub fn endpoint(&self, port: &QName) -> Option<EndpointDescriptor<'_>> {
        self.declared_endpoint_id(port).map(|id| EndpointDescriptor::new(self, id))
    }

    /// Declared endpoint for a port, else the caller's dynamic port.
    pub fn endpoint_for_caller(&self, port: &QName, caller: Option<CallerKey>) -> Option<EndpointDescriptor<'_>> {
        self.declared_endpoint_id(port)
            .or_else(|| caller.and_then(|c| self.dynamic_endpoint_id(c, port)))
            .map(|id| EndpointDescriptor::new(self, id))
    }

    /// Declared endpoints followed by the caller's dynamic ports.
    pub fn endpoints_for_caller(&self, caller: Option<CallerKey>) -> Vec<EndpointDescriptor<'_>> {
        let mut endpoints = self.endpoints();
        if let Some(dynamic) = caller.and_then(|c| self.service.dynamic.get(&c)) {
            endpoints.extend(dynamic.values().map(|id| EndpointDescriptor::new(self, *id)));
        }
        endpoints
    }

    /// Any endpoint by id, declared or dynamic, unless released.
    pub fn endpoint_by_id(&self, id: EndpointId) -> Option<EndpointDescriptor<'_>> {
        self.endpoints.get(id.0).map(|_| EndpointDescriptor::new(self, id))
    }

    pub fn interface_by_id(&self, id: InterfaceId) -> Option<EndpointInterfaceDescriptor<'_>> {
        self.interfaces.contains(id.0).then(|| EndpointInterfaceDescriptor::new(self, id))
    }

    pub fn operation_by_id(&self, id: OperationId) -> Option<OperationDescriptor<'_>> {
        self.operations.contains(id.0).then(|| OperationDescriptor::new(self, id))
    }

    /// Port names from the WSDL service, then created endpoints, then the caller's dynamic ports.
    pub fn ports(&self, caller: Option<CallerKey>) -> Result<Vec<QName>, DescriptionError> {
        let mut ports = Vec::new();
        if let Some(definition) = self.wsdl_definition()?
            && let Some(service) = definition.service(&self.service.qname)
        {
            for port in &service.ports {
                ports.push(QName::new(self.service.qname.namespace.as_str(), port.name.as_str()));
            }
        }
        for endpoint in self.endpoints_for_caller(caller) {
            let port = endpoint.port_qname().clone();
            if !ports.contains(&port) {
                ports.push(port);
            }
        }
        Ok(ports)
    }

    /// A port is declared when the WSDL service lists it. Without WSDL every
    /// named port is considered declared, and so is an unnamed one.
    pub fn is_port_declared(&self, port: Option<&QName>) -> Result<bool, DescriptionError> {
        let Some(port) = port.filter(|p| !p.is_empty()) else {
            return Ok(true);
        };
        if !self.has_wsdl() {
            return Ok(true);
        }
        Ok(self.wsdl_definition()?.is_some_and(|d| d.port(&self.service.qname, &port.local_part).is_some()))
    }

    /// Port preferred by the caller's override, else by the service composite.
    pub fn preferred_port(&self, caller: Option<CallerKey>) -> Option<QName> {
        let override_value = caller
            .and_then(|c| self.service.sparse.get(&c))
            .and_then(|s| s.preferred_port.clone())
            .filter(|p| !p.is_empty());
        let declared = self.service.composite.preferred_port.clone().filter(|p| !p.is_empty());
        resolve(
            Attribute::PreferredPort,
            Candidates::new().with_override(override_value.map(Some)).with_annotation(declared.map(Some)),
            None,
        )
        .value
    }

    pub fn sparse_composite(&self, caller: CallerKey) -> Option<&Arc<SparseComposite>> {
        self.service.sparse.get(&caller)
    }

    pub fn service_ref_name(&self, caller: Option<CallerKey>) -> Option<&str> {
        caller.and_then(|c| self.service.sparse.get(&c)).and_then(|s| s.service_ref_name())
    }

    /// Service-level handler chain: the caller's override, else the service composite.
    pub fn handler_chain(&self, caller: Option<CallerKey>) -> Option<&HandlerChainFacts> {
        let override_value = caller.and_then(|c| self.service.sparse.get(&c)).and_then(|s| s.handler_chain.as_ref());
        let declared = self.service.composite.handler_chain.as_ref();
        resolve(
            Attribute::HandlerChain,
            Candidates::new().with_override(override_value.map(Some)).with_annotation(declared.map(Some)),
            None,
        )
        .value
    }

    pub(crate) fn declared_endpoint_id(&self, port: &QName) -> Option<EndpointId> {
        self.service
            .declared
            .iter()
            .copied()
            .find(|id| &self.endpoint_node(*id).port_qname == port)
    }

    pub(crate) fn dynamic_endpoint_id(&self, caller: CallerKey, port: &QName) -> Option<EndpointId> {
        self.service
            .dynamic
            .get(&caller)
            .and_then(|ports| ports.get(port))
            .copied()
    }

    /// Declared endpoint already bound to an SEI class.
    pub(crate) fn endpoint_id_for_sei(&self, sei_class: &str) -> Option<EndpointId> {
        self.service
            .declared
            .iter()
            .copied()
            .find(|id| self.endpoint_node(*id).sei.as_ref().is_some_and(|s| s.class_name == sei_class))
    }

    /// Endpoint ids of the caller's dynamic ports.
    pub(crate) fn dynamic_endpoint_ids(&self, caller: CallerKey) -> Vec<EndpointId> {
        self.service.dynamic.get(&caller).map(|m| m.values().copied().collect()).unwrap_or_default()
    }

    /// Removes the caller's dynamic ports not shared with another caller and
    /// drops its overrides. Returns the client names to free.
    pub(crate) fn release_caller(&mut self, caller: CallerKey) -> Vec<String> {
        self.service.sparse.remove(&caller);
        for endpoint in self.endpoints.values_mut() {
            endpoint.sparse.remove(&caller);
        }
        let Some(ports) = self.service.dynamic.remove(&caller) else {
            return Vec::new();
        };
        let mut names = Vec::new();
        for id in ports.into_values() {
            let shared = self.service.dynamic.values().any(|other| other.values().any(|o| *o == id));
            if shared {
                continue;
            }
            self.service.shared_dynamic.retain(|_, v| *v != id);
            names.extend(self.remove_endpoint(id));
        }
        names
    }

    /// Removes every endpoint. Returns the client names to free.
    pub(crate) fn release_all(&mut self) -> Vec<String> {
        self.service.declared.clear();
        self.service.dynamic.clear();
        self.service.shared_dynamic.clear();
        self.service.sparse.clear();
        self.endpoints.indices().into_iter().filter_map(|index| self.remove_endpoint(EndpointId(index))).collect()
    }
}
