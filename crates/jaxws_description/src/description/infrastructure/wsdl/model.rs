//! In-memory WSDL 1.1 model.
//!
//! Only the parts of a WSDL document the description layer queries are kept:
//! messages, port types, bindings with their extensibility elements, and services
//! with their ports. Collections preserve document order, so iteration over ports
//! and operations is deterministic.

use crate::description::infrastructure::naming::{QName, wsdl_ns};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definition {
    pub document_base_uri: Option<String>,
    pub name: Option<String>,
    pub target_namespace: String,
    pub messages: Vec<Message>,
    pub port_types: Vec<PortType>,
    pub bindings: Vec<Binding>,
    pub services: Vec<WsdlService>,
}

impl Definition {
    pub fn service(&self, name: &QName) -> Option<&WsdlService> {
        self.services.iter().find(|s| &s.name == name)
    }

    pub fn binding(&self, name: &QName) -> Option<&Binding> {
        self.bindings.iter().find(|b| &b.name == name)
    }

    pub fn port_type(&self, name: &QName) -> Option<&PortType> {
        self.port_types.iter().find(|p| &p.name == name)
    }

    pub fn message(&self, name: &QName) -> Option<&Message> {
        self.messages.iter().find(|m| &m.name == name)
    }

    /// Port of a service, looked up by local name since WSDL ports carry no namespace.
    pub fn port(&self, service: &QName, port: &str) -> Option<&Port> {
        self.service(service).and_then(|s| s.port(port))
    }

    /// Binding referenced by a port, if defined in this document.
    pub fn binding_for_port(&self, port: &Port) -> Option<&Binding> {
        self.binding(&port.binding)
    }

    /// Port type behind a port's binding, if defined in this document.
    pub fn port_type_for_port(&self, port: &Port) -> Option<&PortType> {
        self.binding_for_port(port).and_then(|b| self.port_type(&b.port_type))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub name: QName,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Part {
    pub name: String,
    pub element: Option<QName>,
    pub type_name: Option<QName>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortType {
    pub name: QName,
    pub operations: Vec<WsdlOperation>,
}

impl PortType {
    pub fn operation(&self, name: &str) -> Option<&WsdlOperation> {
        self.operations.iter().find(|o| o.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WsdlOperation {
    pub name: String,
    pub input: Option<OperationMessage>,
    pub output: Option<OperationMessage>,
    pub faults: Vec<OperationMessage>,
}

impl WsdlOperation {
    /// An operation with an input and no output.
    pub fn is_one_way(&self) -> bool {
        self.input.is_some() && self.output.is_none()
    }
}

/// Input, output or fault reference of a port type operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationMessage {
    pub name: Option<String>,
    pub message: QName,
    /// WS-Addressing `Action` attribute, when present.
    pub action: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding {
    pub name: QName,
    pub port_type: QName,
    pub extensibility: Vec<ExtensibilityElement>,
    pub operations: Vec<BindingOperation>,
}

impl Binding {
    pub fn operation(&self, name: &str) -> Option<&BindingOperation> {
        self.operations.iter().find(|o| o.name == name)
    }

    /// Namespace of the first binding-vocabulary element and the declared transport.
    pub fn binding_element(&self) -> Option<(&'static str, Option<&str>)> {
        self.extensibility.iter().find_map(|e| match e {
            ExtensibilityElement::SoapBinding { version, transport, .. } => {
                Some((version.namespace(), transport.as_deref()))
            }
            ExtensibilityElement::HttpBinding { .. } => Some((wsdl_ns::HTTP, None)),
            _ => None,
        })
    }

    /// The `style` attribute of the SOAP binding element.
    pub fn soap_style(&self) -> Option<&str> {
        self.extensibility.iter().find_map(|e| match e {
            ExtensibilityElement::SoapBinding { style, .. } => style.as_deref(),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingOperation {
    pub name: String,
    pub extensibility: Vec<ExtensibilityElement>,
    pub input: Option<BindingMessage>,
    pub output: Option<BindingMessage>,
    pub faults: Vec<BindingMessage>,
}

impl BindingOperation {
    pub fn soap_action(&self) -> Option<&str> {
        self.extensibility.iter().find_map(|e| match e {
            ExtensibilityElement::SoapOperation { soap_action, .. } => soap_action.as_deref(),
            _ => None,
        })
    }

    pub fn soap_style(&self) -> Option<&str> {
        self.extensibility.iter().find_map(|e| match e {
            ExtensibilityElement::SoapOperation { style, .. } => style.as_deref(),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingMessage {
    pub name: Option<String>,
    pub extensibility: Vec<ExtensibilityElement>,
}

impl BindingMessage {
    /// The `soap:body` element of this message, looking inside MIME parts as well.
    pub fn soap_body(&self) -> Option<&ExtensibilityElement> {
        self.extensibility.iter().find_map(|e| match e {
            body @ ExtensibilityElement::SoapBody { .. } => Some(body),
            ExtensibilityElement::MimeMultipartRelated(parts) => parts
                .iter()
                .flat_map(|p| p.extensibility.iter())
                .find(|e| matches!(e, ExtensibilityElement::SoapBody { .. })),
            _ => None,
        })
    }

    pub fn soap_body_namespace(&self) -> Option<&str> {
        match self.soap_body() {
            Some(ExtensibilityElement::SoapBody { namespace, .. }) => namespace.as_deref(),
            _ => None,
        }
    }

    pub fn soap_body_use(&self) -> Option<&str> {
        match self.soap_body() {
            Some(ExtensibilityElement::SoapBody { use_, .. }) => use_.as_deref(),
            _ => None,
        }
    }

    pub fn mime_parts(&self) -> impl Iterator<Item = &MimePart> {
        self.extensibility
            .iter()
            .filter_map(|e| match e {
                ExtensibilityElement::MimeMultipartRelated(parts) => Some(parts.iter()),
                _ => None,
            })
            .flatten()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WsdlService {
    pub name: QName,
    pub ports: Vec<Port>,
}

impl WsdlService {
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Port {
    pub name: String,
    pub binding: QName,
    pub extensibility: Vec<ExtensibilityElement>,
}

impl Port {
    /// First non-empty SOAP 1.1 or SOAP 1.2 address location.
    pub fn soap_address(&self) -> Option<&str> {
        self.extensibility.iter().find_map(|e| match e {
            ExtensibilityElement::SoapAddress { location, .. } if !location.is_empty() => {
                Some(location.as_str())
            }
            _ => None,
        })
    }

    pub fn has_soap_address(&self) -> bool {
        self.extensibility.iter().any(|e| matches!(e, ExtensibilityElement::SoapAddress { .. }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl SoapVersion {
    pub fn namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => wsdl_ns::SOAP11,
            SoapVersion::Soap12 => wsdl_ns::SOAP12,
        }
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            wsdl_ns::SOAP11 => Some(SoapVersion::Soap11),
            wsdl_ns::SOAP12 => Some(SoapVersion::Soap12),
            _ => None,
        }
    }
}

/// Binding-vocabulary elements attached to WSDL components.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensibilityElement {
    SoapBinding { version: SoapVersion, transport: Option<String>, style: Option<String> },
    HttpBinding { verb: Option<String> },
    SoapAddress { version: SoapVersion, location: String },
    HttpAddress { location: String },
    SoapOperation { version: SoapVersion, soap_action: Option<String>, style: Option<String> },
    SoapBody { version: SoapVersion, use_: Option<String>, namespace: Option<String>, parts: Vec<String> },
    SoapHeader { version: SoapVersion, message: QName, part: String },
    MimeMultipartRelated(Vec<MimePart>),
    MimeContent { part: Option<String>, content_type: Option<String> },
    /// Any element this model does not interpret.
    Unknown(QName),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MimePart {
    pub extensibility: Vec<ExtensibilityElement>,
}
