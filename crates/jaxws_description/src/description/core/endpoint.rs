//! Endpoint descriptors.
//!
//! ## Binding and address
//!
//! The binding type of an endpoint comes from its WSDL binding element when
//! there is one, translated into the annotation-style binding identifier, else
//! from `@BindingType` (or the client binding id supplied with a dynamic port),
//! else SOAP 1.1 over HTTP. The client binding id follows the same chain with
//! the explicit value first. Addresses come from an explicit setting, else the
//! first non-empty SOAP address of the WSDL port.
//!
//! ## Generated contracts
//!
//! An endpoint without a fully specified WSDL can synthesize one from its
//! annotation model when its binding is SOAP 1.1. The document is parsed back
//! through the regular reader so generated and authored contracts look the
//! same to consumers. The contract is rebuilt whenever an update changes the
//! endpoint and is stored on the endpoint node, so reads never regenerate it.

use std::{collections::BTreeMap, sync::Arc};

#[cfg(feature = "description_tracing")]
use tracing::{debug, warn};

use crate::description::{
    core::{
        graph::{CallerKey, DescriptionGraph, EndpointId, EndpointNode, InterfaceId},
        interface::{EndpointInterfaceDescriptor, build_interface},
        operation::OperationDescriptor,
        parameter::ParameterDescriptor,
    },
    error::DescriptionError,
    facts::{
        ClassFacts, HandlerChainFacts, Mode, ParameterStyle, ServiceMode, SparseComposite, Style,
        precedence::{Attribute, Candidates, Memo, Resolved, resolve, resolve_with, text},
    },
    infrastructure::{
        naming::{QName, binding, map_wsdl_binding_to_annotation, namespace_from_class, simple_class_name, wsdl_ns},
        wsdl::{
            Definition,
            generator::{
                GeneratedWsdl, GeneratorFault, GeneratorInput, GeneratorOperation, GeneratorPart, Soap11WsdlGenerator,
                WsdlGenerator,
            },
            model::{Binding, Port, PortType},
            reader::read_definition_from_str,
        },
    },
};

/// A synthesized contract and its parsed model.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedDefinition {
    pub wsdl: GeneratedWsdl,
    pub definition: Arc<Definition>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EndpointCache {
    name: Memo<String>,
    target_namespace: Memo<String>,
    wsdl_binding_type: Memo<Option<String>>,
    wsdl_soap_address: Memo<Option<String>>,
    binding_type: Memo<Resolved<String>>,
    client_binding_id: Memo<Resolved<String>>,
    address: Memo<Resolved<Option<String>>>,
    mtom: Memo<Resolved<bool>>,
}

impl EndpointCache {
    pub(crate) fn reset(&mut self) {
        self.name.reset();
        self.target_namespace.reset();
        self.wsdl_binding_type.reset();
        self.wsdl_soap_address.reset();
        self.binding_type.reset();
        self.client_binding_id.reset();
        self.address.reset();
        self.mtom.reset();
    }
}

/// Facts of an endpoint about to be created.
#[derive(Debug, Clone, Default)]
pub(crate) struct NewEndpoint {
    pub port: QName,
    pub dynamic: bool,
    pub implementation: Option<Arc<ClassFacts>>,
    pub sei: Option<Arc<ClassFacts>>,
    pub caller: Option<CallerKey>,
    pub sparse: Option<Arc<SparseComposite>>,
    pub binding_id: Option<String>,
    pub address: Option<String>,
}

/// Rejects explicit client binding ids outside the known set.
pub(crate) fn validate_client_binding_id(port: &QName, binding_id: Option<&str>) -> Result<(), DescriptionError> {
    match binding_id.filter(|b| !b.is_empty()) {
        Some(id) if !binding::is_valid_client_binding(id) => {
            Err(DescriptionError::InvalidBindingId(port.to_string(), id.to_string()))
        }
        _ => Ok(()),
    }
}

/// Creates an endpoint with its interface and registers its client name.
pub(crate) fn create_endpoint(graph: &mut DescriptionGraph, new: NewEndpoint) -> Result<EndpointId, DescriptionError> {
    validate_client_binding_id(&new.port, new.binding_id.as_deref())?;
    let mut node = EndpointNode::new(new.port.clone(), new.dynamic);
    node.implementation = new.implementation.clone();
    node.sei = new.sei.clone();
    node.client_binding_id = new.binding_id.filter(|b| !b.is_empty());
    node.explicit_address = new.address.filter(|a| !a.is_empty());
    node.properties = node.composite().map(|c| c.properties.clone()).unwrap_or_default();
    if let (Some(caller), Some(sparse)) = (new.caller, new.sparse) {
        node.sparse.insert(caller, sparse);
    }
    let id = graph.push_endpoint(node);

    if !new.dynamic {
        match (&new.sei, &new.implementation) {
            (Some(sei), _) => {
                build_interface(graph, id, Some(sei.clone()), true)?;
            }
            (None, Some(implementation)) if !implementation.is_provider() => {
                build_interface(graph, id, Some(implementation.clone()), false)?;
            }
            _ => {
                build_interface(graph, id, None, false)?;
            }
        }
    }
    refresh_generated_wsdl(graph, id)?;

    let base = if graph.is_server_side() {
        graph.service_qname().local_part.clone()
    } else {
        format!("{}.{}", graph.service_qname().local_part, new.port.local_part)
    };
    let name = graph.scope().register_client_name(&base);
    graph.endpoint_node_mut(id).client_name = Some(name);
    #[cfg(feature = "description_tracing")]
    debug!(
        "[endpoint] created {} port {} for service {}",
        if new.dynamic { "dynamic" } else { "declared" },
        new.port,
        graph.service_qname()
    );
    Ok(id)
}

/// Regenerates the contract stored on an endpoint after its inputs changed.
pub(crate) fn refresh_generated_wsdl(graph: &mut DescriptionGraph, id: EndpointId) -> Result<(), DescriptionError> {
    graph.endpoint_node_mut(id).generated = None;
    let generated = EndpointDescriptor::new(graph, id).generate()?;
    graph.endpoint_node_mut(id).generated = generated;
    Ok(())
}

pub(crate) fn set_endpoint_address(
    graph: &mut DescriptionGraph,
    id: EndpointId,
    address: &str,
) -> Result<(), DescriptionError> {
    if address.is_empty() {
        return Ok(());
    }
    graph.endpoint_node_mut(id).explicit_address = Some(address.to_string());
    graph.reset_endpoint_caches(id);
    refresh_generated_wsdl(graph, id)
}

pub(crate) fn set_client_binding_id(
    graph: &mut DescriptionGraph,
    id: EndpointId,
    binding_id: Option<&str>,
) -> Result<(), DescriptionError> {
    let port = graph.endpoint_node(id).port_qname.clone();
    validate_client_binding_id(&port, binding_id)?;
    graph.endpoint_node_mut(id).client_binding_id = binding_id.filter(|b| !b.is_empty()).map(str::to_string);
    graph.reset_endpoint_caches(id);
    refresh_generated_wsdl(graph, id)
}

pub(crate) fn set_property(graph: &mut DescriptionGraph, id: EndpointId, key: &str, value: &str) {
    graph.endpoint_node_mut(id).properties.insert(key.to_string(), value.to_string());
}

/// XML schema type of a Java type in generated RPC messages.
fn xsd_type(java_type: &str) -> QName {
    let local = match java_type {
        "int" | "java.lang.Integer" => "int",
        "long" | "java.lang.Long" => "long",
        "short" | "java.lang.Short" => "short",
        "byte" | "java.lang.Byte" => "byte",
        "boolean" | "java.lang.Boolean" => "boolean",
        "float" | "java.lang.Float" => "float",
        "double" | "java.lang.Double" => "double",
        "java.lang.String" | "String" => "string",
        _ => "anyType",
    };
    QName::new(wsdl_ns::XSD, local)
}

#[derive(Debug, Clone, Copy)]
pub struct EndpointDescriptor<'g> {
    graph: &'g DescriptionGraph,
    id: EndpointId,
}

impl<'g> EndpointDescriptor<'g> {
    pub(crate) fn new(graph: &'g DescriptionGraph, id: EndpointId) -> Self {
        Self { graph, id }
    }

    fn node(&self) -> &'g EndpointNode {
        self.graph.endpoint_node(self.id)
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }

    pub fn graph(&self) -> &'g DescriptionGraph {
        self.graph
    }

    pub fn service_qname(&self) -> &'g QName {
        self.graph.service_qname()
    }

    pub fn port_qname(&self) -> &'g QName {
        &self.node().port_qname
    }

    pub fn is_dynamic(&self) -> bool {
        self.node().dynamic
    }

    /// Composite carrying the endpoint annotations: the implementation on the
    /// server side, the SEI on the client side.
    pub fn composite(&self) -> Option<&'g Arc<ClassFacts>> {
        self.node().composite()
    }

    pub fn implementation(&self) -> Option<&'g Arc<ClassFacts>> {
        self.node().implementation.as_ref()
    }

    /// Explicit SEI bound to this endpoint.
    pub fn sei(&self) -> Option<&'g Arc<ClassFacts>> {
        self.node().sei.as_ref()
    }

    pub fn sei_class_name(&self) -> Option<&'g str> {
        self.sei().map(|s| s.class_name.as_str())
    }

    pub fn interface_id(&self) -> Option<InterfaceId> {
        self.node().interface
    }

    pub fn interface(&self) -> Option<EndpointInterfaceDescriptor<'g>> {
        self.node().interface.map(|id| EndpointInterfaceDescriptor::new(self.graph, id))
    }

    pub fn require_interface(&self) -> Result<EndpointInterfaceDescriptor<'g>, DescriptionError> {
        self.interface().ok_or_else(|| DescriptionError::NoEndpointInterface(self.port_qname().to_string()))
    }

    /// Dispatchable operations, empty for endpoints without an interface.
    pub fn dispatchable_operations(&self) -> Vec<OperationDescriptor<'g>> {
        self.interface().map(|i| i.dispatchable_operations()).unwrap_or_default()
    }

    /// `@WebService.name`, the simple class name by default and empty for providers.
    pub fn name(&self) -> String {
        self.node()
            .cache
            .name
            .get_or_init(|| match self.composite() {
                Some(c) if c.is_provider() || c.web_service_provider.is_some() => String::new(),
                Some(c) => {
                    let declared = text(c.web_service.as_ref().and_then(|w| w.name.as_deref()));
                    resolve_with(Attribute::WebServiceName, Candidates::new().with_annotation(declared), || {
                        simple_class_name(&c.class_name).to_string()
                    })
                    .value
                }
                None => String::new(),
            })
            .clone()
    }

    pub fn target_namespace(&self) -> String {
        self.node()
            .cache
            .target_namespace
            .get_or_init(|| match self.composite() {
                Some(c) => {
                    let declared = text(c.web_service.as_ref().and_then(|w| w.target_namespace.as_deref()))
                        .or_else(|| text(c.web_service_provider.as_ref().and_then(|p| p.target_namespace.as_deref())));
                    resolve_with(Attribute::TargetNamespace, Candidates::new().with_annotation(declared), || {
                        namespace_from_class(&c.class_name)
                    })
                    .value
                }
                None => self.service_qname().namespace.clone(),
            })
            .clone()
    }

    /// Annotation WSDL location; an implementation deferring to an SEI falls back to the SEI's.
    pub fn wsdl_location(&self) -> Option<String> {
        let annotation = |c: &ClassFacts| {
            text(c.web_service.as_ref().and_then(|w| w.wsdl_location.as_deref()))
                .or_else(|| text(c.web_service_provider.as_ref().and_then(|p| p.wsdl_location.as_deref())))
        };
        let node = self.node();
        let declared =
            node.implementation.as_deref().and_then(annotation).or_else(|| node.sei.as_deref().and_then(annotation));
        resolve(Attribute::WsdlLocation, Candidates::new().with_annotation(declared.map(Some)), None).value
    }

    /// Message granularity of a provider endpoint; `None` for SEI-based endpoints.
    pub fn service_mode(&self) -> Option<ServiceMode> {
        let implementation = self.implementation().filter(|i| i.is_provider())?;
        let declared = implementation.service_mode.as_ref().map(|m| m.mode);
        Some(resolve(Attribute::ServiceMode, Candidates::new().with_annotation(declared), ServiceMode::default()).value)
    }

    pub fn is_provider_based(&self) -> bool {
        self.implementation().is_some_and(|i| i.is_provider())
    }

    pub fn is_endpoint_based(&self) -> bool {
        self.composite().is_some_and(|c| c.web_service.is_some())
    }

    pub(crate) fn with_wsdl_port<R>(&self, f: impl FnOnce(&Definition, &Port) -> R) -> Option<R> {
        let definition = self.graph.wsdl_definition_or_none()?;
        let port = definition.port(self.service_qname(), &self.port_qname().local_part)?;
        Some(f(&definition, port))
    }

    pub(crate) fn with_wsdl_binding<R>(&self, f: impl FnOnce(&Definition, &Binding) -> R) -> Option<R> {
        self.with_wsdl_port(|definition, port| definition.binding_for_port(port).map(|b| f(definition, b))).flatten()
    }

    pub(crate) fn with_wsdl_port_type<R>(&self, f: impl FnOnce(&Definition, &PortType) -> R) -> Option<R> {
        self.with_wsdl_port(|definition, port| definition.port_type_for_port(port).map(|p| f(definition, p)))
            .flatten()
    }

    pub fn wsdl_port(&self) -> Option<Port> {
        self.with_wsdl_port(|_, port| port.clone())
    }

    pub fn wsdl_binding(&self) -> Option<Binding> {
        self.with_wsdl_binding(|_, binding| binding.clone())
    }

    /// Port, binding and port type all present in the WSDL.
    pub fn is_wsdl_fully_specified(&self) -> bool {
        self.with_wsdl_port_type(|_, _| ()).is_some()
    }

    /// Binding id translated from the WSDL binding element.
    pub fn wsdl_binding_type(&self) -> Option<String> {
        self.node()
            .cache
            .wsdl_binding_type
            .get_or_init(|| {
                self.with_wsdl_binding(|_, binding| {
                    binding
                        .binding_element()
                        .and_then(|(namespace, transport)| map_wsdl_binding_to_annotation(namespace, transport))
                })
                .flatten()
            })
            .clone()
    }

    /// First non-empty SOAP 1.1 or SOAP 1.2 address of the WSDL port.
    pub fn wsdl_soap_address(&self) -> Option<String> {
        self.node()
            .cache
            .wsdl_soap_address
            .get_or_init(|| self.with_wsdl_port(|_, port| port.soap_address().map(str::to_string)).flatten())
            .clone()
    }

    pub fn resolved_binding_type(&self) -> Resolved<String> {
        self.node()
            .cache
            .binding_type
            .get_or_init(|| {
                let node = self.node();
                let annotation = node
                    .composite()
                    .and_then(|c| text(c.binding_type.as_ref().and_then(|b| b.value.as_deref())))
                    .or_else(|| node.client_binding_id.clone());
                resolve(
                    Attribute::BindingType,
                    Candidates::new().with_wsdl(self.wsdl_binding_type()).with_annotation(annotation),
                    binding::DEFAULT.to_string(),
                )
            })
            .clone()
    }

    pub fn binding_type(&self) -> String {
        self.resolved_binding_type().value
    }

    pub fn resolved_client_binding_id(&self) -> Resolved<String> {
        self.node()
            .cache
            .client_binding_id
            .get_or_init(|| {
                resolve(
                    Attribute::ClientBindingId,
                    Candidates::new()
                        .with_override(self.node().client_binding_id.clone())
                        .with_wsdl(self.wsdl_binding_type()),
                    binding::DEFAULT.to_string(),
                )
            })
            .clone()
    }

    pub fn client_binding_id(&self) -> String {
        self.resolved_client_binding_id().value
    }

    pub fn resolved_endpoint_address(&self) -> Resolved<Option<String>> {
        self.node()
            .cache
            .address
            .get_or_init(|| {
                resolve(
                    Attribute::EndpointAddress,
                    Candidates::new()
                        .with_override(self.node().explicit_address.clone().map(Some))
                        .with_wsdl(self.wsdl_soap_address().map(Some)),
                    None,
                )
            })
            .clone()
    }

    pub fn endpoint_address(&self) -> Option<String> {
        self.resolved_endpoint_address().value
    }

    /// Overrides of one caller: the endpoint-level composite, else the service-level one.
    pub fn sparse_composite(&self, caller: Option<CallerKey>) -> Option<&'g Arc<SparseComposite>> {
        let caller = caller?;
        self.node().sparse.get(&caller).or_else(|| self.graph.sparse_composite(caller))
    }

    /// MTOM for a caller: the caller's override, else the `@MTOM` feature,
    /// else whether the binding id is an MTOM binding.
    pub fn resolved_mtom(&self, caller: Option<CallerKey>) -> Resolved<bool> {
        let compute = || {
            let override_value = self.sparse_composite(caller).and_then(|s| s.mtom_override());
            let annotation = self.composite().and_then(|c| c.mtom_feature()).map(|(enabled, _)| enabled);
            resolve(
                Attribute::MtomEnabled,
                Candidates::new().with_override(override_value).with_annotation(annotation),
                binding::is_mtom(&self.binding_type()),
            )
        };
        match caller {
            Some(_) => compute(),
            None => self.node().cache.mtom.get_or_init(compute).clone(),
        }
    }

    pub fn is_mtom_enabled(&self, caller: Option<CallerKey>) -> bool {
        self.resolved_mtom(caller).value
    }

    pub fn mtom_threshold(&self) -> u32 {
        self.composite().and_then(|c| c.mtom_feature()).map(|(_, threshold)| threshold).unwrap_or(0)
    }

    pub fn respect_binding(&self) -> bool {
        self.composite().and_then(|c| c.respect_binding_feature()).unwrap_or(false)
    }

    /// `(enabled, required)` of the addressing feature, if declared.
    pub fn addressing(&self) -> Option<(bool, bool)> {
        self.composite().and_then(|c| c.addressing_feature())
    }

    /// Handler chain: the caller's override, then the class, the SEI and the
    /// service class annotations.
    pub fn handler_chain(&self, caller: Option<CallerKey>) -> Option<&'g HandlerChainFacts> {
        let override_value = self.sparse_composite(caller).and_then(|s| s.handler_chain.as_ref());
        let declared = self
            .implementation()
            .and_then(|c| c.handler_chain.as_ref())
            .or_else(|| self.sei().and_then(|c| c.handler_chain.as_ref()));
        resolve_with(
            Attribute::HandlerChain,
            Candidates::new().with_override(override_value.map(Some)).with_annotation(declared.map(Some)),
            || self.graph.handler_chain(None),
        )
        .value
    }

    pub fn preferred_port(&self, caller: Option<CallerKey>) -> Option<QName> {
        self.graph.preferred_port(caller)
    }

    pub fn service_ref_name(&self, caller: Option<CallerKey>) -> Option<&'g str> {
        self.graph.service_ref_name(caller)
    }

    pub fn property(&self, key: &str) -> Option<&'g str> {
        self.node().properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &'g BTreeMap<String, String> {
        &self.node().properties
    }

    /// Service-client name registered for this endpoint in its scope.
    pub fn client_name(&self) -> Option<&'g str> {
        self.node().client_name.as_deref()
    }

    /// Contract synthesized from the annotation model.
    ///
    /// `None` when generation is disabled, when the WSDL fully specifies the
    /// endpoint, when the endpoint has no interface, or when the binding is not
    /// SOAP 1.1.
    pub fn generated_wsdl(&self) -> Option<&'g Arc<GeneratedDefinition>> {
        self.node().generated.as_ref()
    }

    /// Contract published for this endpoint: the service WSDL when it declares
    /// the port, else the generated one.
    pub fn published_definition(&self) -> Result<Option<Arc<Definition>>, DescriptionError> {
        let declared = self
            .graph
            .wsdl_definition()?
            .filter(|d| d.port(self.service_qname(), &self.port_qname().local_part).is_some());
        Ok(declared.or_else(|| self.generated_wsdl().map(|g| g.definition.clone())))
    }

    fn generate(&self) -> Result<Option<Arc<GeneratedDefinition>>, DescriptionError> {
        if !self.graph.scope().config().generate_wsdl || self.is_wsdl_fully_specified() {
            return Ok(None);
        }
        let Some(interface) = self.interface() else {
            return Ok(None);
        };
        let binding_type = self.binding_type();
        if !binding::is_soap11(&binding_type) {
            #[cfg(feature = "description_tracing")]
            warn!("[endpoint] WSDL generation skipped for port {}, binding {} is not SOAP 1.1", self.port_qname(), binding_type);
            return Ok(None);
        }

        let operations = interface.dispatchable_operations().iter().map(generator_operation).collect();
        let input = GeneratorInput {
            service: self.service_qname().clone(),
            port: self.port_qname().local_part.clone(),
            port_type: interface.port_type(),
            style: interface.style().to_string(),
            address: self.endpoint_address(),
            operations,
        };
        let wsdl = Soap11WsdlGenerator.generate(&input)?;
        let definition = read_definition_from_str(&wsdl.document, &wsdl.file_name)
            .map_err(|e| DescriptionError::WsdlGeneration(self.service_qname().to_string(), e.to_string()))?;
        #[cfg(feature = "description_tracing")]
        debug!("[endpoint] generated {} for port {}", wsdl.file_name, self.port_qname());
        Ok(Some(Arc::new(GeneratedDefinition { wsdl, definition: Arc::new(definition) })))
    }
}

fn generator_operation(operation: &OperationDescriptor<'_>) -> GeneratorOperation {
    let name = operation.operation_name();
    let rpc = operation.style() == Style::Rpc;
    let wrapped = !rpc && operation.parameter_style() == ParameterStyle::Wrapped;
    let parameters = operation.parameters();
    let part = |parameter: &ParameterDescriptor<'_>| {
        if rpc {
            GeneratorPart {
                name: parameter.part_name(),
                element: None,
                type_name: Some(xsd_type(parameter.parameter_actual_type())),
            }
        } else {
            GeneratorPart {
                name: parameter.part_name(),
                element: Some(QName::new(parameter.target_namespace(), parameter.name())),
                type_name: None,
            }
        }
    };

    let input_parts = if wrapped {
        vec![GeneratorPart {
            name: "parameters".into(),
            element: Some(QName::new(
                operation.request_wrapper_target_namespace().unwrap_or_default(),
                operation.request_wrapper_local_name().unwrap_or_else(|| name.clone()),
            )),
            type_name: None,
        }]
    } else {
        parameters.iter().filter(|p| p.mode().is_input() && !p.is_header()).map(part).collect()
    };

    let output_parts = (!operation.is_one_way()).then(|| {
        if wrapped {
            return vec![GeneratorPart {
                name: "parameters".into(),
                element: Some(QName::new(
                    operation.response_wrapper_target_namespace().unwrap_or_default(),
                    operation.response_wrapper_local_name().unwrap_or_else(|| format!("{}Response", name)),
                )),
                type_name: None,
            }];
        }
        let mut parts = Vec::new();
        if let Some(result_part) = operation.result_part_name() {
            let result_type = operation.result_actual_type().unwrap_or_default();
            parts.push(if rpc {
                GeneratorPart { name: result_part, element: None, type_name: Some(xsd_type(result_type)) }
            } else {
                GeneratorPart {
                    name: result_part,
                    element: Some(QName::new(
                        operation.result_target_namespace().unwrap_or_default(),
                        operation.result_name().unwrap_or_default(),
                    )),
                    type_name: None,
                }
            });
        }
        parts.extend(parameters.iter().filter(|p| p.mode() != Mode::In && !p.is_header()).map(part));
        parts
    });

    let faults = operation
        .faults()
        .iter()
        .map(|fault| GeneratorFault {
            name: fault.message_name.clone(),
            element: QName::new(fault.target_namespace.clone(), fault.name.clone()),
        })
        .collect();

    GeneratorOperation { name, soap_action: operation.action(), input_parts, output_parts, faults }
}
