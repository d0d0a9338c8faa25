//! Service descriptions.
//!
//! A [`ServiceDescriptor`] owns the published [`DescriptionGraph`] of one
//! service together with the locks that serialize its updates.
//!
//! ## Publication
//!
//! Readers take a [`snapshot`](ServiceDescriptor::snapshot) and navigate it
//! through the borrowing descriptor views. Writers hold the per-service update
//! lock, clone the current graph, apply the change and publish the clone only if
//! the change succeeded, so a failed update is never observable.
//!
//! ## Caller scopes
//!
//! A [`CallerScope`] identifies one client (typically one proxy factory). Dynamic
//! ports and sparse overrides are registered under its key. Dropping the scope
//! queues the key on every service it touched; the queue is drained right away
//! when the service is idle, otherwise on its next update or release.

use std::sync::{
    Arc, Mutex, PoisonError, RwLock, Weak,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

#[cfg(feature = "description_tracing")]
use tracing::{debug, info};

use crate::description::{
    config::ConfigurationScope,
    core::{
        endpoint::{self, NewEndpoint, create_endpoint},
        graph::{CallerKey, DescriptionGraph, EndpointId, ServiceNode, WsdlHandle},
        update::{self, EndpointUpdate},
    },
    error::DescriptionError,
    facts::{
        ClassFacts, FactsCatalog, SparseComposite,
        precedence::{Attribute, Candidates, resolve, resolve_with, text},
    },
    infrastructure::{
        naming::{QName, java, namespace_from_class, simple_class_name},
        wsdl::{Definition, locator::WsdlLocator},
    },
    validation,
};

static NEXT_CALLER_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of one caller of the description layer.
#[derive(Debug)]
pub struct CallerScope {
    key: CallerKey,
    touched: Mutex<Vec<Weak<ServiceDescriptor>>>,
}

impl CallerScope {
    pub fn new() -> Self {
        Self { key: CallerKey(NEXT_CALLER_KEY.fetch_add(1, Ordering::Relaxed)), touched: Mutex::new(Vec::new()) }
    }

    pub fn key(&self) -> CallerKey {
        self.key
    }

    pub(crate) fn touch(&self, service: &Arc<ServiceDescriptor>) {
        let mut touched = self.touched.lock().unwrap_or_else(PoisonError::into_inner);
        touched.retain(|w| w.strong_count() > 0);
        if !touched.iter().any(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(service))) {
            touched.push(Arc::downgrade(service));
        }
    }
}

impl Default for CallerScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CallerScope {
    fn drop(&mut self) {
        let touched = std::mem::take(&mut *self.touched.lock().unwrap_or_else(PoisonError::into_inner));
        for service in touched.iter().filter_map(Weak::upgrade) {
            service.reclaim_caller(self.key);
        }
    }
}

/// Client-side lookup request.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub service_qname: QName,
    pub wsdl_location: Option<String>,
    /// Composite of the generated service class, if any.
    pub service_class: Option<Arc<ClassFacts>>,
    pub sparse: Option<SparseComposite>,
    /// Composites of the SEIs and exception classes the client may use.
    pub catalog: Arc<FactsCatalog>,
}

impl ServiceRequest {
    pub fn new(service_qname: QName) -> Self {
        Self {
            service_qname,
            wsdl_location: None,
            service_class: None,
            sparse: None,
            catalog: Arc::new(FactsCatalog::new()),
        }
    }

    pub fn with_wsdl_location(self, location: impl Into<String>) -> Self {
        Self { wsdl_location: Some(location.into()), ..self }
    }

    pub fn with_service_class(self, service_class: ClassFacts) -> Self {
        Self { service_class: Some(Arc::new(service_class)), ..self }
    }

    pub fn with_sparse(self, sparse: SparseComposite) -> Self {
        Self { sparse: Some(sparse), ..self }
    }

    pub fn with_catalog(self, catalog: Arc<FactsCatalog>) -> Self {
        Self { catalog, ..self }
    }

    /// Effective WSDL URL part of the registry key.
    pub fn wsdl_url(&self) -> Option<&str> {
        self.wsdl_location.as_deref().filter(|l| !l.is_empty())
    }
}

#[derive(Debug)]
pub struct ServiceDescriptor {
    self_ref: Weak<ServiceDescriptor>,
    qname: QName,
    server_side: bool,
    scope: Arc<ConfigurationScope>,
    graph: RwLock<Arc<DescriptionGraph>>,
    update_lock: Mutex<()>,
    reclaim_queue: Mutex<Vec<CallerKey>>,
    released: AtomicBool,
}

impl ServiceDescriptor {
    fn from_graph(graph: DescriptionGraph) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            qname: graph.service_qname().clone(),
            server_side: graph.is_server_side(),
            scope: graph.scope().clone(),
            graph: RwLock::new(Arc::new(graph)),
            update_lock: Mutex::new(()),
            reclaim_queue: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        })
    }

    /// Builds a client-side description with no endpoints.
    pub fn client(
        scope: &Arc<ConfigurationScope>,
        request: &ServiceRequest,
        caller: Option<&CallerScope>,
    ) -> Result<Arc<Self>, DescriptionError> {
        let graph = build_client_graph(scope, request, caller.map(CallerScope::key))?;
        let service = Self::from_graph(graph);
        if let Some(caller) = caller
            && request.sparse.is_some()
        {
            caller.touch(&service);
        }
        Ok(service)
    }

    /// Builds a server-side description of one implementation class.
    pub fn server(
        catalog: Arc<FactsCatalog>,
        implementation: &str,
        scope: &Arc<ConfigurationScope>,
    ) -> Result<Arc<Self>, DescriptionError> {
        let graph = build_server_graph(catalog, implementation, scope)?;
        Ok(Self::from_graph(graph))
    }

    /// Current published graph.
    pub fn snapshot(&self) -> Arc<DescriptionGraph> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn service_qname(&self) -> &QName {
        &self.qname
    }

    pub fn is_server_side(&self) -> bool {
        self.server_side
    }

    pub fn scope(&self) -> &Arc<ConfigurationScope> {
        &self.scope
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn wsdl_location(&self) -> Option<String> {
        self.snapshot().wsdl_location().map(str::to_string)
    }

    /// WSDL definition, reloaded when the description was built to release it.
    pub fn wsdl_definition(&self) -> Result<Option<Arc<Definition>>, DescriptionError> {
        self.snapshot().wsdl_definition()
    }

    /// Port qnames visible to `caller`.
    pub fn ports(&self, caller: Option<&CallerScope>) -> Result<Vec<QName>, DescriptionError> {
        self.snapshot().ports(caller.map(CallerScope::key))
    }

    pub fn is_port_declared(&self, port: Option<&QName>) -> Result<bool, DescriptionError> {
        self.snapshot().is_port_declared(port)
    }

    /// Caller keys queued for reclamation and not yet drained.
    pub fn pending_reclaims(&self) -> usize {
        self.reclaim_queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn publish(&self, graph: DescriptionGraph) {
        *self.graph.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(graph);
    }

    fn free_client_names(&self, names: Vec<String>) {
        for name in names {
            self.scope.release_client_name(&name);
        }
    }

    /// Releases the queued callers. The update lock must be held.
    fn drain_reclaim_queue(&self) {
        let queued = std::mem::take(&mut *self.reclaim_queue.lock().unwrap_or_else(PoisonError::into_inner));
        if queued.is_empty() || self.is_released() {
            return;
        }
        let mut graph = DescriptionGraph::clone(&self.snapshot());
        let mut names = Vec::new();
        for caller in queued {
            #[cfg(feature = "description_tracing")]
            debug!("[service] reclaiming caller {:?} on {}", caller, self.qname);
            names.extend(graph.release_caller(caller));
        }
        self.publish(graph);
        self.free_client_names(names);
    }

    /// Runs `change` on a private copy of the graph and publishes it on success.
    fn mutate<R>(
        &self,
        change: impl FnOnce(&mut DescriptionGraph) -> Result<R, DescriptionError>,
    ) -> Result<R, DescriptionError> {
        let _guard = self.update_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_released() {
            return Err(DescriptionError::AlreadyReleased(self.qname.to_string()));
        }
        self.drain_reclaim_queue();
        let mut graph = DescriptionGraph::clone(&self.snapshot());
        let result = change(&mut graph)?;
        self.publish(graph);
        Ok(result)
    }

    /// Entry point of the endpoint update state machine.
    pub fn update_endpoint(
        &self,
        update: EndpointUpdate,
        caller: Option<&CallerScope>,
    ) -> Result<EndpointId, DescriptionError> {
        #[cfg(feature = "description_tracing")]
        debug!("[service] {} update {} on port {:?}", self.qname, update.kind, update.port);
        let key = caller.map(CallerScope::key);
        let id = self.mutate(|graph| update::apply(graph, update, key))?;
        if let Some(caller) = caller
            && let Some(service) = self.self_ref.upgrade()
        {
            caller.touch(&service);
        }
        Ok(id)
    }

    fn endpoint_id(graph: &DescriptionGraph, port: &QName, caller: Option<CallerKey>) -> Result<EndpointId, DescriptionError> {
        graph
            .endpoint_for_caller(port, caller)
            .map(|e| e.id())
            .ok_or_else(|| DescriptionError::EndpointNotFound(graph.service_qname().to_string(), port.to_string()))
    }

    pub fn set_endpoint_address(
        &self,
        port: &QName,
        caller: Option<&CallerScope>,
        address: &str,
    ) -> Result<(), DescriptionError> {
        let key = caller.map(CallerScope::key);
        self.mutate(|graph| {
            let id = Self::endpoint_id(graph, port, key)?;
            endpoint::set_endpoint_address(graph, id, address)
        })
    }

    pub fn set_client_binding_id(
        &self,
        port: &QName,
        caller: Option<&CallerScope>,
        binding_id: Option<&str>,
    ) -> Result<(), DescriptionError> {
        let key = caller.map(CallerScope::key);
        self.mutate(|graph| {
            let id = Self::endpoint_id(graph, port, key)?;
            endpoint::set_client_binding_id(graph, id, binding_id)
        })
    }

    pub fn set_property(
        &self,
        port: &QName,
        caller: Option<&CallerScope>,
        key: &str,
        value: &str,
    ) -> Result<(), DescriptionError> {
        let caller_key = caller.map(CallerScope::key);
        self.mutate(|graph| {
            let id = Self::endpoint_id(graph, port, caller_key)?;
            endpoint::set_property(graph, id, key, value);
            Ok(())
        })
    }

    /// Folds `sparse` into the service-level override of `caller`.
    pub fn merge_sparse(&self, caller: &CallerScope, sparse: SparseComposite) -> Result<(), DescriptionError> {
        let key = caller.key();
        self.mutate(|graph| {
            let merged = match graph.service.sparse.get(&key) {
                Some(existing) => {
                    let mut merged = existing.as_ref().clone();
                    merged.merge(sparse);
                    merged
                }
                None => sparse,
            };
            graph.service.sparse.insert(key, Arc::new(merged));
            Ok(())
        })?;
        if let Some(service) = self.self_ref.upgrade() {
            caller.touch(&service);
        }
        Ok(())
    }

    /// Releases the resources held for `caller`, or every endpoint when no
    /// caller is given. Idempotent once everything is released.
    pub fn release_resources(&self, caller: Option<CallerKey>) {
        let _guard = self.update_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match caller {
            Some(caller) => {
                if self.is_released() {
                    return;
                }
                self.reclaim_queue.lock().unwrap_or_else(PoisonError::into_inner).push(caller);
                self.drain_reclaim_queue();
            }
            None => {
                if self.released.swap(true, Ordering::SeqCst) {
                    return;
                }
                self.reclaim_queue.lock().unwrap_or_else(PoisonError::into_inner).clear();
                let mut graph = DescriptionGraph::clone(&self.snapshot());
                let names = graph.release_all();
                self.publish(graph);
                self.free_client_names(names);
                #[cfg(feature = "description_tracing")]
                info!("[service] released {}", self.qname);
            }
        }
    }

    /// Queues `caller` for release and drains the queue if no update is running.
    pub(crate) fn reclaim_caller(&self, caller: CallerKey) {
        self.reclaim_queue.lock().unwrap_or_else(PoisonError::into_inner).push(caller);
        if let Ok(_guard) = self.update_lock.try_lock() {
            self.drain_reclaim_queue();
        }
    }

    /// Clears every memoized attribute of the published graph.
    pub fn reset_caches(&self) -> Result<(), DescriptionError> {
        self.mutate(|graph| {
            graph.reset_caches();
            Ok(())
        })
    }
}

fn load_wsdl(locator: &WsdlLocator<'_>, location: &str, reduce_memory: bool) -> Result<WsdlHandle, DescriptionError> {
    let definition = locator.load(location)?;
    Ok(WsdlHandle::new(Some(location.to_string()), definition, reduce_memory))
}

fn build_client_graph(
    scope: &Arc<ConfigurationScope>,
    request: &ServiceRequest,
    caller: Option<CallerKey>,
) -> Result<DescriptionGraph, DescriptionError> {
    if request.service_qname.local_part.trim().is_empty() {
        return Err(DescriptionError::MissingServiceQName);
    }
    let config = scope.config();
    let locator = WsdlLocator::new(config);
    let composite = request.service_class.clone().unwrap_or_else(|| Arc::new(ClassFacts::new(java::SERVICE)));

    let wsdl = match request.sparse.as_ref().and_then(SparseComposite::wsdl_location) {
        Some(location) => {
            locator
                .resolve(location)
                .map_err(|_| DescriptionError::UnresolvableWsdlLocation(location.to_string()))?;
            #[cfg(feature = "description_tracing")]
            debug!("[service] {} uses overriding WSDL {}", request.service_qname, location);
            load_wsdl(&locator, location, config.reduce_wsdl_memory)?
        }
        None => match &composite.wsdl_definition {
            Some(definition) => WsdlHandle::new(None, definition.clone(), false),
            None => {
                let annotation = text(composite.web_service_client.as_ref().and_then(|c| c.wsdl_location.as_deref()));
                let location = resolve(
                    Attribute::WsdlLocation,
                    Candidates::new()
                        .with_override(request.wsdl_url().map(|l| Some(l.to_string())))
                        .with_annotation(annotation.map(Some)),
                    None,
                )
                .value;
                match location {
                    Some(location) => load_wsdl(&locator, &location, config.reduce_wsdl_memory)?,
                    None => WsdlHandle::Absent,
                }
            }
        },
    };

    if let Some(definition) = wsdl.definition(scope)?
        && definition.service(&request.service_qname).is_none()
    {
        return Err(DescriptionError::ServiceNotInWsdl(request.service_qname.to_string()));
    }

    let mut service = ServiceNode {
        qname: request.service_qname.clone(),
        server_side: false,
        scope: scope.clone(),
        composite,
        catalog: request.catalog.clone(),
        wsdl,
        sparse: Default::default(),
        declared: Vec::new(),
        dynamic: Default::default(),
        shared_dynamic: Default::default(),
    };
    if let (Some(caller), Some(sparse)) = (caller, &request.sparse) {
        service.sparse.insert(caller, Arc::new(sparse.clone()));
    }
    #[cfg(feature = "description_tracing")]
    debug!("[service] built client description {}", request.service_qname);
    Ok(DescriptionGraph::new(service))
}

/// Annotation value of a naming attribute, else its computed default.
fn declared_or(attribute: Attribute, declared: Option<&str>, default: impl FnOnce() -> String) -> String {
    resolve_with(attribute, Candidates::new().with_annotation(text(declared)), default).value
}

/// Target namespace declared by a server implementation, else the package default.
fn implementation_namespace(implementation: &ClassFacts) -> String {
    let declared = match &implementation.web_service_provider {
        Some(provider) => provider.target_namespace.as_deref(),
        None => implementation.web_service.as_ref().and_then(|w| w.target_namespace.as_deref()),
    };
    declared_or(Attribute::TargetNamespace, declared, || namespace_from_class(&implementation.class_name))
}

pub(crate) fn server_service_qname(implementation: &ClassFacts) -> QName {
    let declared = match &implementation.web_service_provider {
        Some(provider) => provider.service_name.as_deref(),
        None => implementation.web_service.as_ref().and_then(|w| w.service_name.as_deref()),
    };
    let local = declared_or(Attribute::ServiceName, declared, || {
        format!("{}Service", simple_class_name(&implementation.class_name))
    });
    QName::new(implementation_namespace(implementation), local)
}

pub(crate) fn server_port_qname(implementation: &ClassFacts) -> QName {
    let simple = simple_class_name(&implementation.class_name);
    let local = match &implementation.web_service_provider {
        Some(provider) => declared_or(Attribute::PortName, provider.port_name.as_deref(), || format!("{}Port", simple)),
        None => {
            let web_service = implementation.web_service.as_ref();
            declared_or(Attribute::PortName, web_service.and_then(|w| w.port_name.as_deref()), || {
                let name =
                    declared_or(Attribute::WebServiceName, web_service.and_then(|w| w.name.as_deref()), || simple.to_string());
                format!("{}Port", name)
            })
        }
    };
    QName::new(implementation_namespace(implementation), local)
}

fn server_wsdl(
    implementation: &ClassFacts,
    sei: Option<&ClassFacts>,
    scope: &ConfigurationScope,
) -> Result<WsdlHandle, DescriptionError> {
    if let Some(definition) = &implementation.wsdl_definition {
        return Ok(WsdlHandle::new(None, definition.clone(), false));
    }
    let declared = match &implementation.web_service_provider {
        Some(provider) => provider.wsdl_location.as_deref(),
        None => implementation.web_service.as_ref().and_then(|w| w.wsdl_location.as_deref()),
    };
    let annotation = text(declared)
        .or_else(|| text(sei.and_then(|s| s.web_service.as_ref()).and_then(|w| w.wsdl_location.as_deref())));
    let location =
        resolve(Attribute::WsdlLocation, Candidates::new().with_annotation(annotation.map(Some)), None).value;
    match location {
        Some(location) => {
            let locator = WsdlLocator::new(scope.config());
            load_wsdl(&locator, &location, scope.config().reduce_wsdl_memory)
        }
        None => Ok(WsdlHandle::Absent),
    }
}

fn build_server_graph(
    catalog: Arc<FactsCatalog>,
    implementation: &str,
    scope: &Arc<ConfigurationScope>,
) -> Result<DescriptionGraph, DescriptionError> {
    let implementation = catalog
        .get(implementation)
        .cloned()
        .ok_or_else(|| DescriptionError::UnknownClass(implementation.to_string()))?;
    validation::validate_implementation(&implementation, &catalog)?;
    let sei = implementation.endpoint_interface().and_then(|name| catalog.get(name).cloned());

    let wsdl = server_wsdl(&implementation, sei.as_deref(), scope)?;
    validation::validate_wsdl_location(&implementation, wsdl.is_present())?;

    let qname = server_service_qname(&implementation);
    let port = server_port_qname(&implementation);
    let mut graph = DescriptionGraph::new(ServiceNode {
        qname,
        server_side: true,
        scope: scope.clone(),
        composite: implementation.clone(),
        catalog,
        wsdl,
        sparse: Default::default(),
        declared: Vec::new(),
        dynamic: Default::default(),
        shared_dynamic: Default::default(),
    });
    let id = create_endpoint(&mut graph, NewEndpoint { port, implementation: Some(implementation), sei, ..Default::default() })?;
    graph.service.declared.push(id);
    #[cfg(feature = "description_tracing")]
    info!("[service] built server description {}", graph.service_qname());
    Ok(graph)
}
