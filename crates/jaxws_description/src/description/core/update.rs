//! Endpoint update state machine.
//!
//! A (port, caller) pair is in one of four states: unknown, declared without
//! an SEI, declared with an SEI, or dynamic. The three update kinds move a pair
//! between these states:
//!
//! | kind              | unknown                   | declared, no SEI | declared, SEI      | dynamic |
//! |-------------------|---------------------------|------------------|--------------------|---------|
//! | `AddPort`         | dynamic (not in WSDL)     | no-op            | no-op              | no-op   |
//! | `GetPort`         | declared with SEI         | attach SEI       | same SEI only      | error   |
//! | `CreateDispatch`  | declared (in WSDL only)   | no-op            | no-op              | no-op   |
//!
//! Updates run on a private copy of the description graph; a failed update
//! leaves the published graph untouched.

use std::{fmt::Display, sync::Arc};

#[cfg(feature = "description_tracing")]
use tracing::debug;

use crate::description::{
    core::{
        endpoint::{NewEndpoint, create_endpoint, refresh_generated_wsdl},
        graph::{CallerKey, DescriptionGraph, EndpointId},
        interface::{build_interface, sei_name, sei_target_namespace, update_with_sei},
    },
    error::DescriptionError,
    facts::{ClassFacts, SparseComposite, precedence::text},
    infrastructure::naming::QName,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    /// Adds a dynamic port for one caller.
    AddPort,
    /// Binds a declared port to an SEI for a proxy.
    GetPort,
    /// Prepares a declared or previously added port for a dispatch client.
    CreateDispatch,
}

impl Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateKind::AddPort => write!(f, "ADD_PORT"),
            UpdateKind::GetPort => write!(f, "GET_PORT"),
            UpdateKind::CreateDispatch => write!(f, "CREATE_DISPATCH"),
        }
    }
}

/// One request to the update state machine.
#[derive(Debug, Clone)]
pub struct EndpointUpdate {
    pub kind: UpdateKind,
    pub port: Option<QName>,
    pub sei: Option<Arc<ClassFacts>>,
    pub composite: Option<SparseComposite>,
    pub binding_id: Option<String>,
    pub address: Option<String>,
}

impl EndpointUpdate {
    fn new(kind: UpdateKind, port: Option<QName>) -> Self {
        Self { kind, port, sei: None, composite: None, binding_id: None, address: None }
    }

    pub fn add_port(port: QName, binding_id: Option<&str>, address: Option<&str>) -> Self {
        Self {
            binding_id: binding_id.map(str::to_string),
            address: address.map(str::to_string),
            ..Self::new(UpdateKind::AddPort, Some(port))
        }
    }

    /// Proxy lookup; without a port the default port of the SEI is selected.
    pub fn get_port(port: Option<QName>, sei: Option<Arc<ClassFacts>>) -> Self {
        Self { sei, ..Self::new(UpdateKind::GetPort, port) }
    }

    pub fn create_dispatch(port: QName) -> Self {
        Self::new(UpdateKind::CreateDispatch, Some(port))
    }

    pub fn with_composite(self, composite: SparseComposite) -> Self {
        Self { composite: Some(composite), ..self }
    }

    pub fn with_sei(self, sei: Arc<ClassFacts>) -> Self {
        Self { sei: Some(sei), ..self }
    }
}

/// Key of a dynamic port shared between callers.
pub(crate) fn dynamic_key(port: &QName, binding_id: Option<&str>, address: Option<&str>) -> String {
    format!("{}:{}:{}", port, binding_id.unwrap_or("NULL"), address.unwrap_or("NULL"))
}

fn find_endpoint(graph: &DescriptionGraph, port: &QName, caller: Option<CallerKey>) -> Option<EndpointId> {
    graph.declared_endpoint_id(port).or_else(|| caller.and_then(|c| graph.dynamic_endpoint_id(c, port)))
}

/// Default port of an SEI: the first WSDL port, in document order, bound to
/// the SEI's port type and carrying a SOAP address; else the port name derived
/// from the SEI.
pub(crate) fn select_default_port(graph: &DescriptionGraph, sei: &ClassFacts) -> Result<QName, DescriptionError> {
    let port_type = QName::new(sei_target_namespace(sei), sei_name(sei));
    let service = graph.service_qname();
    if let Some(definition) = graph.wsdl_definition()?
        && let Some(wsdl_service) = definition.service(service)
        && let Some(port) = wsdl_service.ports.iter().find(|p| {
            p.has_soap_address() && definition.binding_for_port(p).is_some_and(|b| b.port_type == port_type)
        })
    {
        #[cfg(feature = "description_tracing")]
        debug!("[update] selected WSDL port {} for SEI {}", port.name, sei.class_name);
        return Ok(QName::new(service.namespace.as_str(), port.name.as_str()));
    }
    let port_name = text(sei.web_service.as_ref().and_then(|w| w.port_name.as_deref()))
        .unwrap_or_else(|| format!("{}Port", port_type.local_part));
    Ok(QName::new(port_type.namespace, port_name))
}

fn merge_endpoint_sparse(
    graph: &mut DescriptionGraph,
    id: EndpointId,
    caller: Option<CallerKey>,
    sparse: Option<SparseComposite>,
) {
    let (Some(caller), Some(sparse)) = (caller, sparse) else {
        return;
    };
    let node = graph.endpoint_node_mut(id);
    let merged = match node.sparse.get(&caller) {
        Some(existing) => {
            let mut merged = existing.as_ref().clone();
            merged.merge(sparse);
            merged
        }
        None => sparse,
    };
    node.sparse.insert(caller, Arc::new(merged));
}

fn add_dynamic_port(
    graph: &mut DescriptionGraph,
    port: QName,
    caller: CallerKey,
    binding_id: Option<String>,
    address: Option<String>,
) -> Result<EndpointId, DescriptionError> {
    let key = dynamic_key(&port, binding_id.as_deref(), address.as_deref());
    let id = match graph.service.shared_dynamic.get(&key).copied() {
        Some(id) => {
            #[cfg(feature = "description_tracing")]
            debug!("[update] reusing dynamic port {}", key);
            id
        }
        None => {
            let id = create_endpoint(
                graph,
                NewEndpoint { port: port.clone(), dynamic: true, binding_id, address, ..Default::default() },
            )?;
            graph.service.shared_dynamic.insert(key, id);
            id
        }
    };
    graph.service.dynamic.entry(caller).or_default().insert(port, id);
    Ok(id)
}

/// Binds an SEI to a declared endpoint built without one.
fn attach_sei(graph: &mut DescriptionGraph, id: EndpointId, sei: Arc<ClassFacts>) -> Result<(), DescriptionError> {
    graph.endpoint_node_mut(id).sei = Some(sei.clone());
    match graph.endpoint_node(id).interface {
        Some(interface) => update_with_sei(graph, interface, sei)?,
        None => {
            build_interface(graph, id, Some(sei), true)?;
        }
    }
    graph.reset_endpoint_caches(id);
    refresh_generated_wsdl(graph, id)
}

/// Applies one update to `graph`, returning the endpoint it resolved to.
pub(crate) fn apply(
    graph: &mut DescriptionGraph,
    update: EndpointUpdate,
    caller: Option<CallerKey>,
) -> Result<EndpointId, DescriptionError> {
    let EndpointUpdate { kind, port, sei, composite, binding_id, address } = update;
    let service = graph.service_qname().to_string();
    let port = port.filter(|p| !p.is_empty()).or_else(|| graph.preferred_port(caller));
    let endpoint = port.as_ref().and_then(|p| find_endpoint(graph, p, caller));

    match kind {
        UpdateKind::AddPort => {
            let Some(port) = port else {
                return Err(DescriptionError::EmptyPortName(service));
            };
            if composite.is_some() {
                return Err(DescriptionError::CompositeNotAllowed(kind.to_string(), port.to_string()));
            }
            if graph.has_wsdl() && graph.is_port_declared(Some(&port))? {
                return Err(DescriptionError::PortDeclaredInWsdl(port.to_string()));
            }
            if let Some(id) = endpoint {
                return Ok(id);
            }
            let Some(caller) = caller else {
                return Err(DescriptionError::MissingCallerKey(port.to_string()));
            };
            add_dynamic_port(graph, port, caller, binding_id, address)
        }
        UpdateKind::GetPort => {
            let Some(sei) = sei else {
                return Err(DescriptionError::MissingSei(port.map(|p| p.to_string()).unwrap_or_default()));
            };
            let (port, endpoint) = match port {
                Some(port) => (port, endpoint),
                None => match graph.endpoint_id_for_sei(&sei.class_name) {
                    Some(id) => (graph.endpoint_node(id).port_qname.clone(), Some(id)),
                    None => {
                        let port = select_default_port(graph, &sei)?;
                        let endpoint = find_endpoint(graph, &port, caller);
                        (port, endpoint)
                    }
                },
            };
            if endpoint.is_some_and(|id| graph.endpoint_node(id).dynamic) {
                return Err(DescriptionError::DynamicPortWithSei(port.to_string()));
            }
            if !graph.is_port_declared(Some(&port))? {
                return Err(DescriptionError::UndeclaredPort(service, port.to_string()));
            }
            match endpoint {
                None => {
                    let sparse = caller.and(composite).map(Arc::new);
                    let id = create_endpoint(
                        graph,
                        NewEndpoint { port, sei: Some(sei), caller, sparse, binding_id, address, ..Default::default() },
                    )?;
                    graph.service.declared.push(id);
                    Ok(id)
                }
                Some(id) => {
                    match graph.endpoint_node(id).sei.clone() {
                        None => {
                            #[cfg(feature = "description_tracing")]
                            debug!("[update] attaching SEI {} to port {}", sei.class_name, port);
                            attach_sei(graph, id, sei)?;
                        }
                        Some(bound) if bound.class_name != sei.class_name => {
                            return Err(DescriptionError::AmbiguousSei(
                                port.to_string(),
                                bound.class_name.clone(),
                                sei.class_name.clone(),
                            ));
                        }
                        Some(_) => {}
                    }
                    merge_endpoint_sparse(graph, id, caller, composite);
                    Ok(id)
                }
            }
        }
        UpdateKind::CreateDispatch => {
            let Some(port) = port else {
                return Err(DescriptionError::EmptyPortName(service));
            };
            if composite.is_some() {
                return Err(DescriptionError::CompositeNotAllowed(kind.to_string(), port.to_string()));
            }
            if let Some(id) = endpoint {
                return Ok(id);
            }
            if sei.is_some() {
                return Err(DescriptionError::SeiNotAllowed(port.to_string()));
            }
            if !(graph.has_wsdl() && graph.is_port_declared(Some(&port))?) {
                return Err(DescriptionError::UndeclaredPort(service, port.to_string()));
            }
            let id = create_endpoint(graph, NewEndpoint { port, binding_id, address, ..Default::default() })?;
            graph.service.declared.push(id);
            Ok(id)
        }
    }
}
