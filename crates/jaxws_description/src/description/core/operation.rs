//! Operation descriptors.
//!
//! An operation is built from a Java method, from a WSDL port type operation,
//! or from both when an SEI method is matched to a WSDL operation by name. The
//! generic provider operation stands in for providers without a contract.
//!
//! Every attribute is resolved lazily through the precedence table and
//! memoized on the operation node; an update touching the operation's
//! interface resets the cells.

use std::sync::Arc;

use crate::description::{
    core::{
        endpoint::EndpointDescriptor,
        fault::{AttachmentDescription, AttachmentInfo, FaultDescriptor},
        graph::{DescriptionGraph, OperationId, OperationNode, RoutingKey},
        interface::EndpointInterfaceDescriptor,
        parameter::ParameterDescriptor,
    },
    error::DescriptionError,
    facts::{
        ClassFacts, FactsCatalog, MethodFacts, ParameterStyle, Style, Use,
        precedence::{Attribute, Candidates, FactOrigin, Memo, Resolved, resolve, resolve_with, text},
    },
    infrastructure::{
        naming::{QName, build_action, generic_argument, raw_type_name, simple_class_name},
        wsdl::model::{BindingOperation, WsdlOperation},
    },
};

/// Name of the single operation of a provider endpoint described without WSDL.
pub const GENERIC_PROVIDER_OPERATION: &str = "jaxwsNoWSDLProviderOperation";

#[derive(Debug, Clone, Default)]
pub(crate) struct OperationCache {
    operation_name: Memo<Resolved<String>>,
    soap_action: Memo<Resolved<String>>,
    one_way: Memo<Resolved<bool>>,
    style: Memo<Resolved<Style>>,
    use_: Memo<Resolved<Use>>,
    parameter_style: Memo<Resolved<ParameterStyle>>,
    input_action: Memo<Resolved<String>>,
    output_action: Memo<Resolved<String>>,
    sync_operation: Memo<Option<OperationId>>,
    attachments: Memo<AttachmentInfo>,
}

impl OperationCache {
    fn reset(&mut self) {
        self.operation_name.reset();
        self.soap_action.reset();
        self.one_way.reset();
        self.style.reset();
        self.use_.reset();
        self.parameter_style.reset();
        self.input_action.reset();
        self.output_action.reset();
        self.sync_operation.reset();
        self.attachments.reset();
    }
}

impl OperationNode {
    pub(crate) fn reset_caches(&mut self) {
        self.cache.reset();
        for parameter in &mut self.parameters {
            parameter.cache.reset();
        }
    }
}

/// Operation name a method is published under.
pub(crate) fn method_operation_name(method: &MethodFacts) -> String {
    text(method.web_method.as_ref().and_then(|w| w.operation_name.as_deref())).unwrap_or_else(|| method.name.clone())
}

/// Faults of a method: every declared exception on the client side, only
/// exceptions known to the catalog on the server side.
pub(crate) fn method_faults(
    method: &MethodFacts,
    catalog: &FactsCatalog,
    server_side: bool,
    default_namespace: &str,
) -> Vec<FaultDescriptor> {
    method
        .exceptions
        .iter()
        .filter_map(|exception| {
            let facts = catalog.get(exception);
            if server_side && facts.is_none() {
                return None;
            }
            Some(FaultDescriptor::from_exception(exception, facts.map(|f| f.as_ref()), default_namespace))
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct OperationDescriptor<'g> {
    graph: &'g DescriptionGraph,
    id: OperationId,
}

impl<'g> OperationDescriptor<'g> {
    pub(crate) fn new(graph: &'g DescriptionGraph, id: OperationId) -> Self {
        Self { graph, id }
    }

    fn node(&self) -> &'g OperationNode {
        self.graph.operation_node(self.id)
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn interface(&self) -> EndpointInterfaceDescriptor<'g> {
        EndpointInterfaceDescriptor::new(self.graph, self.node().interface)
    }

    pub fn endpoint(&self) -> EndpointDescriptor<'g> {
        self.interface().endpoint()
    }

    /// Java method facts, absent for operations known only from WSDL.
    pub fn method(&self) -> Option<&'g Arc<MethodFacts>> {
        self.node().method.as_ref()
    }

    pub fn is_generic_provider(&self) -> bool {
        self.node().generic_provider
    }

    pub fn resolved_operation_name(&self) -> Resolved<String> {
        let node = self.node();
        node.cache
            .operation_name
            .get_or_init(|| {
                let annotation = node
                    .method
                    .as_ref()
                    .and_then(|m| text(m.web_method.as_ref().and_then(|w| w.operation_name.as_deref())));
                resolve_with(Attribute::OperationName, Candidates::new().with_annotation(annotation), || {
                    match (&node.method, &node.wsdl_name) {
                        (Some(method), _) => method.name.clone(),
                        (None, Some(wsdl_name)) => wsdl_name.clone(),
                        (None, None) => GENERIC_PROVIDER_OPERATION.to_string(),
                    }
                })
            })
            .clone()
    }

    pub fn operation_name(&self) -> String {
        self.resolved_operation_name().value
    }

    /// Namespace-less qualified name; operation lookup is name-only.
    pub fn name(&self) -> QName {
        QName::local(self.operation_name())
    }

    pub fn java_method_name(&self) -> Option<&'g str> {
        self.method().map(|m| m.name.as_str())
    }

    pub fn java_declaring_class(&self) -> Option<&'g str> {
        self.method().map(|m| m.declaring_class.as_str())
    }

    pub fn java_parameters(&self) -> Vec<&'g str> {
        self.method().map(|m| m.parameter_types()).unwrap_or_default()
    }

    /// Port type operation with this operation's name.
    pub fn wsdl_operation(&self) -> Option<WsdlOperation> {
        let name = self.operation_name();
        self.endpoint().with_wsdl_port_type(|_, port_type| port_type.operation(&name).cloned()).flatten()
    }

    pub fn wsdl_binding_operation(&self) -> Option<BindingOperation> {
        let name = self.operation_name();
        self.endpoint().with_wsdl_binding(|_, binding| binding.operation(&name).cloned()).flatten()
    }

    pub fn resolved_soap_action(&self) -> Resolved<String> {
        let node = self.node();
        node.cache
            .soap_action
            .get_or_init(|| {
                let wsdl = self.wsdl_binding_operation().and_then(|o| text(o.soap_action()));
                let annotation =
                    node.method.as_ref().and_then(|m| text(m.web_method.as_ref().and_then(|w| w.action.as_deref())));
                resolve(
                    Attribute::SoapAction,
                    Candidates::new().with_wsdl(wsdl).with_annotation(annotation),
                    String::new(),
                )
            })
            .clone()
    }

    /// SOAPAction of the operation, `""` when none is declared.
    pub fn action(&self) -> String {
        self.resolved_soap_action().value
    }

    pub fn is_excluded(&self) -> bool {
        let annotation = self.method().and_then(|m| m.web_method.as_ref()).map(|w| w.exclude);
        resolve(Attribute::Exclude, Candidates::new().with_annotation(annotation), false).value
    }

    pub fn resolved_one_way(&self) -> Resolved<bool> {
        let node = self.node();
        node.cache
            .one_way
            .get_or_init(|| {
                let annotation = node.method.as_ref().and_then(|m| m.oneway.then_some(true));
                let wsdl = self.wsdl_operation().map(|o| o.is_one_way());
                resolve(Attribute::OneWay, Candidates::new().with_annotation(annotation).with_wsdl(wsdl), false)
            })
            .clone()
    }

    pub fn is_one_way(&self) -> bool {
        self.resolved_one_way().value
    }

    pub fn resolved_style(&self) -> Resolved<Style> {
        self.node()
            .cache
            .style
            .get_or_init(|| {
                let wsdl = self.wsdl_binding_operation().and_then(|o| o.soap_style().and_then(Style::parse));
                let annotation = self.method().and_then(|m| m.soap_binding.as_ref()).and_then(|b| b.style);
                let resolved = resolve(Attribute::Style, Candidates::new().with_wsdl(wsdl).with_annotation(annotation), Style::default());
                if resolved.origin == FactOrigin::Default { self.interface().resolved_style() } else { resolved }
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
                    .wsdl_binding_operation()
                    .and_then(|o| o.input.as_ref().and_then(|i| i.soap_body_use().and_then(Use::parse)));
                let annotation = self.method().and_then(|m| m.soap_binding.as_ref()).and_then(|b| b.use_);
                let resolved = resolve(Attribute::Use, Candidates::new().with_wsdl(wsdl).with_annotation(annotation), Use::default());
                if resolved.origin == FactOrigin::Default { self.interface().resolved_use() } else { resolved }
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
                let annotation = self.method().and_then(|m| m.soap_binding.as_ref()).and_then(|b| b.parameter_style);
                let resolved = resolve(
                    Attribute::ParameterStyle,
                    Candidates::new().with_annotation(annotation),
                    ParameterStyle::default(),
                );
                if resolved.origin == FactOrigin::Default { self.interface().resolved_parameter_style() } else { resolved }
            })
            .clone()
    }

    pub fn parameter_style(&self) -> ParameterStyle {
        self.resolved_parameter_style().value
    }

    pub fn is_document_literal_bare(&self) -> bool {
        self.style() == Style::Document && self.use_() == Use::Literal && self.parameter_style() == ParameterStyle::Bare
    }

    fn is_wrapped(&self) -> bool {
        self.parameter_style() == ParameterStyle::Wrapped
    }

    fn is_document_wrapped(&self) -> bool {
        self.style() == Style::Document && self.is_wrapped()
    }

    pub fn request_wrapper_local_name(&self) -> Option<String> {
        self.is_wrapped().then(|| {
            let annotation = self.method().and_then(|m| text(m.request_wrapper.as_ref().and_then(|w| w.local_name.as_deref())));
            resolve_with(Attribute::RequestWrapperLocalName, Candidates::new().with_annotation(annotation), || {
                self.operation_name()
            })
            .value
        })
    }

    pub fn request_wrapper_target_namespace(&self) -> Option<String> {
        self.is_wrapped().then(|| {
            let annotation = self
                .method()
                .and_then(|m| text(m.request_wrapper.as_ref().and_then(|w| w.target_namespace.as_deref())));
            resolve_with(Attribute::RequestWrapperNamespace, Candidates::new().with_annotation(annotation), || {
                self.interface().target_namespace()
            })
            .value
        })
    }

    pub fn request_wrapper_class_name(&self) -> Option<String> {
        if !self.is_wrapped() {
            return None;
        }
        self.method().and_then(|m| text(m.request_wrapper.as_ref().and_then(|w| w.class_name.as_deref())))
    }

    pub fn request_wrapper_part_name(&self) -> Option<String> {
        if !self.is_wrapped() {
            return None;
        }
        self.method().and_then(|m| text(m.request_wrapper.as_ref().and_then(|w| w.part_name.as_deref())))
    }

    pub fn response_wrapper_local_name(&self) -> Option<String> {
        self.is_wrapped().then(|| {
            let annotation =
                self.method().and_then(|m| text(m.response_wrapper.as_ref().and_then(|w| w.local_name.as_deref())));
            resolve_with(Attribute::ResponseWrapperLocalName, Candidates::new().with_annotation(annotation), || {
                format!("{}Response", self.operation_name())
            })
            .value
        })
    }

    pub fn response_wrapper_target_namespace(&self) -> Option<String> {
        self.is_wrapped().then(|| {
            let annotation = self
                .method()
                .and_then(|m| text(m.response_wrapper.as_ref().and_then(|w| w.target_namespace.as_deref())));
            resolve_with(Attribute::ResponseWrapperNamespace, Candidates::new().with_annotation(annotation), || {
                self.interface().target_namespace()
            })
            .value
        })
    }

    pub fn response_wrapper_class_name(&self) -> Option<String> {
        if !self.is_wrapped() {
            return None;
        }
        self.method().and_then(|m| text(m.response_wrapper.as_ref().and_then(|w| w.class_name.as_deref())))
    }

    pub fn response_wrapper_part_name(&self) -> Option<String> {
        if !self.is_wrapped() {
            return None;
        }
        self.method().and_then(|m| text(m.response_wrapper.as_ref().and_then(|w| w.part_name.as_deref())))
    }

    /// A result exists for two-way methods with a non-void return type.
    pub fn has_result(&self) -> bool {
        !self.is_one_way() && self.method().is_some_and(|m| m.has_result())
    }

    pub fn result_name(&self) -> Option<String> {
        if !self.has_result() {
            return None;
        }
        let annotation = self.method().and_then(|m| text(m.web_result.as_ref().and_then(|r| r.name.as_deref())));
        Some(
            resolve_with(Attribute::ResultName, Candidates::new().with_annotation(annotation), || {
                if self.style() == Style::Document && self.parameter_style() == ParameterStyle::Bare {
                    format!("{}Response", self.operation_name())
                } else {
                    "return".to_string()
                }
            })
            .value,
        )
    }

    pub fn result_part_name(&self) -> Option<String> {
        let name = self.result_name()?;
        let annotation = self.method().and_then(|m| text(m.web_result.as_ref().and_then(|r| r.part_name.as_deref())));
        Some(resolve(Attribute::ResultPartName, Candidates::new().with_annotation(annotation), name).value)
    }

    pub fn result_target_namespace(&self) -> Option<String> {
        if !self.has_result() {
            return None;
        }
        let annotation =
            self.method().and_then(|m| text(m.web_result.as_ref().and_then(|r| r.target_namespace.as_deref())));
        Some(
            resolve_with(Attribute::ResultTargetNamespace, Candidates::new().with_annotation(annotation), || {
                if self.is_document_wrapped() && !self.is_result_header() {
                    String::new()
                } else {
                    self.interface().target_namespace()
                }
            })
            .value,
        )
    }

    pub fn is_result_header(&self) -> bool {
        let annotation = self.method().and_then(|m| m.web_result.as_ref()).map(|r| r.header).filter(|h| *h);
        resolve(Attribute::ResultHeader, Candidates::new().with_annotation(annotation), false).value
    }

    pub fn result_type(&self) -> Option<&'g str> {
        self.has_result().then(|| self.method().map(|m| m.return_type.as_str())).flatten()
    }

    /// Result type with a polling or callback future unwrapped.
    pub fn result_actual_type(&self) -> Option<&'g str> {
        let result_type = self.result_type()?;
        if self.is_async_client_method() {
            return Some(generic_argument(result_type).unwrap_or(result_type));
        }
        Some(result_type)
    }

    /// `@XmlList` on the return value.
    pub fn is_list_type(&self) -> bool {
        self.method().is_some_and(|m| m.is_list_result)
    }

    fn action_segments(&self) -> (String, String) {
        let interface = self.interface();
        (interface.target_namespace(), interface.port_type().local_part)
    }

    pub fn resolved_input_action(&self) -> Resolved<String> {
        self.node()
            .cache
            .input_action
            .get_or_init(|| {
                let annotation = self.method().and_then(|m| text(m.action.as_ref().and_then(|a| a.input.as_deref())));
                resolve_with(Attribute::InputAction, Candidates::new().with_annotation(annotation), || {
                    let (namespace, port_type) = self.action_segments();
                    let operation = self.operation_name();
                    let input = if self.is_one_way() { operation } else { format!("{}Request", operation) };
                    build_action(&namespace, &[&port_type, &input])
                })
            })
            .clone()
    }

    pub fn input_action(&self) -> String {
        self.resolved_input_action().value
    }

    /// Output action, also computed for one-way operations.
    pub fn resolved_output_action(&self) -> Resolved<String> {
        self.node()
            .cache
            .output_action
            .get_or_init(|| {
                let annotation = self.method().and_then(|m| text(m.action.as_ref().and_then(|a| a.output.as_deref())));
                resolve_with(Attribute::OutputAction, Candidates::new().with_annotation(annotation), || {
                    let (namespace, port_type) = self.action_segments();
                    build_action(&namespace, &[&port_type, &format!("{}Response", self.operation_name())])
                })
            })
            .clone()
    }

    pub fn output_action(&self) -> String {
        self.resolved_output_action().value
    }

    /// Action of the fault mapped from `exception_class`, if the operation declares it.
    pub fn fault_action(&self, exception_class: &str) -> Option<String> {
        let fault = self.resolve_fault_by_exception_name(exception_class)?;
        let annotation = self.method().and_then(|m| m.action.as_ref()).and_then(|a| {
            a.faults
                .iter()
                .find(|f| raw_type_name(&f.class_name) == raw_type_name(&fault.exception_class_name))
                .and_then(|f| text(f.value.as_deref()))
        });
        Some(
            resolve_with(Attribute::FaultAction, Candidates::new().with_annotation(annotation), || {
                let (namespace, port_type) = self.action_segments();
                build_action(&namespace, &[&port_type, &self.operation_name(), "Fault", &fault.name])
            })
            .value,
        )
    }

    pub fn faults(&self) -> &'g [FaultDescriptor] {
        &self.node().faults
    }

    /// Fault by fully qualified or simple exception class name.
    pub fn resolve_fault_by_exception_name(&self, exception_class: &str) -> Option<&'g FaultDescriptor> {
        let faults = self.faults();
        faults.iter().find(|f| f.exception_class_name == exception_class).or_else(|| {
            faults.iter().find(|f| simple_class_name(&f.exception_class_name) == exception_class)
        })
    }

    /// Client-side asynchronous variant, recognized by its return type.
    pub fn is_async_client_method(&self) -> bool {
        self.method().is_some_and(|m| m.is_async())
    }

    /// Synchronous sibling of an asynchronous client operation.
    pub fn sync_operation(&self) -> Option<OperationDescriptor<'g>> {
        if !self.is_async_client_method() {
            return None;
        }
        let id = *self.node().cache.sync_operation.get_or_init(|| {
            let name = self.operation_name();
            let stripped = self.java_method_name().and_then(|m| m.strip_suffix("Async"));
            let siblings: Vec<_> =
                self.interface().operations().into_iter().filter(|o| o.id != self.id && !o.is_async_client_method()).collect();
            siblings
                .iter()
                .find(|o| o.operation_name() == name)
                .or_else(|| siblings.iter().find(|o| stripped.is_some() && o.java_method_name() == stripped))
                .map(|o| o.id)
        });
        id.map(|id| OperationDescriptor::new(self.graph, id))
    }

    /// Attachments bound by the WSDL binding operation; empty unless the WSDL
    /// fully specifies the endpoint.
    pub fn attachments(&self) -> &'g AttachmentInfo {
        self.node().cache.attachments.get_or_init(|| {
            let endpoint = self.endpoint();
            if !endpoint.is_wsdl_fully_specified() {
                return AttachmentInfo::default();
            }
            self.wsdl_binding_operation()
                .map(|o| AttachmentInfo::from_binding_messages(o.input.as_ref(), o.output.as_ref()))
                .unwrap_or_default()
        })
    }

    pub fn attachment(&self, part_name: &str) -> Option<AttachmentDescription> {
        self.attachments().attachment(part_name).cloned()
    }

    pub fn result_attachment(&self) -> Option<AttachmentDescription> {
        self.result_part_name().and_then(|part| self.attachment(&part))
    }

    pub fn has_request_swa_ref_attachments(&self) -> bool {
        self.attachments().has_request_swa_ref_attachments
    }

    pub fn has_response_swa_ref_attachments(&self) -> bool {
        self.attachments().has_response_swa_ref_attachments
    }

    /// Namespace of the input `soap:body`, else the interface target namespace.
    pub fn binding_input_namespace(&self) -> String {
        self.wsdl_binding_operation()
            .and_then(|o| o.input.as_ref().and_then(|i| text(i.soap_body_namespace())))
            .unwrap_or_else(|| self.interface().target_namespace())
    }

    pub fn binding_output_namespace(&self) -> String {
        self.wsdl_binding_operation()
            .and_then(|o| o.output.as_ref().and_then(|i| text(i.soap_body_namespace())))
            .unwrap_or_else(|| self.interface().target_namespace())
    }

    /// Implementation method with this operation's name and parameter types,
    /// searching the implementation's superclasses as well.
    pub fn method_from_service_impl(&self, implementation: &ClassFacts) -> Option<Arc<MethodFacts>> {
        let method = self.method()?;
        let matches = |candidate: &&Arc<MethodFacts>| candidate.same_signature(method);
        if let Some(found) = implementation.methods.iter().find(matches) {
            return Some(found.clone());
        }
        self.graph
            .catalog()
            .superclasses(implementation)
            .iter()
            .find_map(|parent| parent.methods.iter().find(matches).cloned())
    }

    pub fn parameters(&self) -> Vec<ParameterDescriptor<'g>> {
        (0..self.node().parameters.len()).map(|i| ParameterDescriptor::new(self.graph, self.id, i)).collect()
    }

    pub fn parameter(&self, index: usize) -> Option<ParameterDescriptor<'g>> {
        (index < self.node().parameters.len()).then(|| ParameterDescriptor::new(self.graph, self.id, index))
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<ParameterDescriptor<'g>> {
        self.parameters().into_iter().find(|p| p.name() == name)
    }

    /// Body element routing key of a document/literal/bare operation: the first
    /// non-header input parameter, or `None` when there is no such parameter.
    /// Returns `Ok(None)` for every other style.
    pub fn routing_key(&self) -> Result<Option<RoutingKey>, DescriptionError> {
        if !self.is_document_literal_bare() {
            return Ok(None);
        }
        let Some(parameter) = self.parameters().into_iter().find(|p| p.mode().is_input() && !p.is_header()) else {
            return Ok(Some(None));
        };
        let namespace = parameter.target_namespace();
        let name = parameter.name();
        if namespace.is_empty() {
            return Err(DescriptionError::InvalidOperation(
                self.operation_name(),
                format!("body parameter {} has no target namespace", name),
            ));
        }
        if name.is_empty() {
            return Err(DescriptionError::InvalidOperation(
                self.operation_name(),
                "body parameter has no element name".to_string(),
            ));
        }
        Ok(Some(Some(QName::new(namespace, name))))
    }
}
