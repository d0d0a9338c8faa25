//! WSDL generation for endpoints described without a contract.
//!
//! The generator only covers SOAP 1.1 bindings. It emits messages, a port type,
//! a SOAP binding and a service; schema types are not emitted, message parts
//! refer to element or type names only. The generated document is serialized
//! with `xmltree` and re-parsed by the regular reader, so generated and authored
//! contracts reach the description model through the same code.

use xmltree::{Element, Namespace, XMLNode};

use crate::description::{
    error::DescriptionError,
    infrastructure::naming::{QName, wsdl_ns},
};

/// Address written when the endpoint address is not known yet.
pub const PLACEHOLDER_ADDRESS: &str = "REPLACE_WITH_ACTUAL_URL";

const SOAP_HTTP_TRANSPORT: &str = "http://schemas.xmlsoap.org/soap/http";

/// Message part of a generated operation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorPart {
    pub name: String,
    pub element: Option<QName>,
    pub type_name: Option<QName>,
}

/// Operation of a generated port type.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOperation {
    pub name: String,
    pub soap_action: String,
    pub input_parts: Vec<GeneratorPart>,
    /// `None` for one-way operations.
    pub output_parts: Option<Vec<GeneratorPart>>,
    pub faults: Vec<GeneratorFault>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorFault {
    pub name: String,
    pub element: QName,
}

/// Annotation-derived model handed to a generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorInput {
    pub service: QName,
    pub port: String,
    pub port_type: QName,
    /// `document` or `rpc`.
    pub style: String,
    pub address: Option<String>,
    pub operations: Vec<GeneratorOperation>,
}

/// Generated document and the file name it would be published under.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedWsdl {
    pub file_name: String,
    pub document: String,
}

pub trait WsdlGenerator: Send + Sync {
    fn generate(&self, input: &GeneratorInput) -> Result<GeneratedWsdl, DescriptionError>;
}

/// SOAP 1.1 over HTTP document generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Soap11WsdlGenerator;

impl WsdlGenerator for Soap11WsdlGenerator {
    fn generate(&self, input: &GeneratorInput) -> Result<GeneratedWsdl, DescriptionError> {
        let tns = input.service.namespace.as_str();
        let mut namespaces = Namespace::empty();
        namespaces.put("wsdl", wsdl_ns::WSDL);
        namespaces.put("soap", wsdl_ns::SOAP11);
        namespaces.put("xsd", wsdl_ns::XSD);
        namespaces.put("tns", tns);

        let mut prefixes = PrefixTable::new(tns);
        let mut definitions = wsdl_element("definitions");
        definitions.attributes.insert("name".into(), input.service.local_part.clone());
        definitions.attributes.insert("targetNamespace".into(), tns.to_string());

        for operation in &input.operations {
            let request = message_element(&format!("{}Request", operation.name), &operation.input_parts, &mut prefixes);
            push(&mut definitions, request);
            if let Some(output_parts) = &operation.output_parts {
                let response = message_element(&format!("{}Response", operation.name), output_parts, &mut prefixes);
                push(&mut definitions, response);
            }
            for fault in &operation.faults {
                let part = GeneratorPart { name: "fault".into(), element: Some(fault.element.clone()), type_name: None };
                push(&mut definitions, message_element(&fault.name, &[part], &mut prefixes));
            }
        }

        let mut port_type = wsdl_element("portType");
        port_type.attributes.insert("name".into(), input.port_type.local_part.clone());
        for operation in &input.operations {
            let mut element = wsdl_element("operation");
            element.attributes.insert("name".into(), operation.name.clone());
            push(&mut element, message_ref("input", &format!("tns:{}Request", operation.name)));
            if operation.output_parts.is_some() {
                push(&mut element, message_ref("output", &format!("tns:{}Response", operation.name)));
            }
            for fault in &operation.faults {
                let mut fault_ref = message_ref("fault", &format!("tns:{}", fault.name));
                fault_ref.attributes.insert("name".into(), fault.name.clone());
                push(&mut element, fault_ref);
            }
            push(&mut port_type, element);
        }
        push(&mut definitions, port_type);

        let binding_name = format!("{}Binding", input.port);
        let mut binding = wsdl_element("binding");
        binding.attributes.insert("name".into(), binding_name.clone());
        binding.attributes.insert("type".into(), format!("tns:{}", input.port_type.local_part));
        let mut soap_binding = soap_element("binding");
        soap_binding.attributes.insert("style".into(), input.style.clone());
        soap_binding.attributes.insert("transport".into(), SOAP_HTTP_TRANSPORT.into());
        push(&mut binding, soap_binding);
        for operation in &input.operations {
            let mut element = wsdl_element("operation");
            element.attributes.insert("name".into(), operation.name.clone());
            let mut soap_operation = soap_element("operation");
            soap_operation.attributes.insert("soapAction".into(), operation.soap_action.clone());
            push(&mut element, soap_operation);
            push(&mut element, body_message("input", input.style == "rpc", tns));
            if operation.output_parts.is_some() {
                push(&mut element, body_message("output", input.style == "rpc", tns));
            }
            for fault in &operation.faults {
                let mut fault_element = wsdl_element("fault");
                fault_element.attributes.insert("name".into(), fault.name.clone());
                let mut soap_fault = soap_element("fault");
                soap_fault.attributes.insert("name".into(), fault.name.clone());
                soap_fault.attributes.insert("use".into(), "literal".into());
                push(&mut fault_element, soap_fault);
                push(&mut element, fault_element);
            }
            push(&mut binding, element);
        }
        push(&mut definitions, binding);

        let mut service = wsdl_element("service");
        service.attributes.insert("name".into(), input.service.local_part.clone());
        let mut port = wsdl_element("port");
        port.attributes.insert("name".into(), input.port.clone());
        port.attributes.insert("binding".into(), format!("tns:{}", binding_name));
        let mut address = soap_element("address");
        let location = input.address.clone().filter(|a| !a.is_empty()).unwrap_or_else(|| PLACEHOLDER_ADDRESS.into());
        address.attributes.insert("location".into(), location);
        push(&mut port, address);
        push(&mut service, port);
        push(&mut definitions, service);

        prefixes.declare(&mut namespaces);
        definitions.namespaces = Some(namespaces);

        let mut buffer = Vec::new();
        definitions
            .write(&mut buffer)
            .map_err(|e| DescriptionError::WsdlGeneration(input.service.to_string(), e.to_string()))?;
        let document = String::from_utf8(buffer)
            .map_err(|e| DescriptionError::WsdlGeneration(input.service.to_string(), e.to_string()))?;
        Ok(GeneratedWsdl { file_name: format!("{}.wsdl", input.service.local_part.to_lowercase()), document })
    }
}

/// Prefixes for namespaces referenced by message parts.
struct PrefixTable {
    tns: String,
    extra: Vec<String>,
}

impl PrefixTable {
    fn new(tns: &str) -> Self {
        Self { tns: tns.to_string(), extra: Vec::new() }
    }

    fn prefixed(&mut self, name: &QName) -> String {
        let prefix = if name.namespace == self.tns {
            "tns".to_string()
        } else if name.namespace == wsdl_ns::XSD {
            "xsd".to_string()
        } else if name.namespace.is_empty() {
            return name.local_part.clone();
        } else {
            let index = match self.extra.iter().position(|ns| ns == &name.namespace) {
                Some(index) => index,
                None => {
                    self.extra.push(name.namespace.clone());
                    self.extra.len() - 1
                }
            };
            format!("ns{}", index + 1)
        };
        format!("{}:{}", prefix, name.local_part)
    }

    fn declare(&self, namespaces: &mut Namespace) {
        for (index, namespace) in self.extra.iter().enumerate() {
            namespaces.put(format!("ns{}", index + 1), namespace.as_str());
        }
    }
}

fn wsdl_element(name: &str) -> Element {
    let mut element = Element::new(name);
    element.prefix = Some("wsdl".into());
    element.namespace = Some(wsdl_ns::WSDL.into());
    element
}

fn soap_element(name: &str) -> Element {
    let mut element = Element::new(name);
    element.prefix = Some("soap".into());
    element.namespace = Some(wsdl_ns::SOAP11.into());
    element
}

fn push(parent: &mut Element, child: Element) {
    parent.children.push(XMLNode::Element(child));
}

fn message_element(name: &str, parts: &[GeneratorPart], prefixes: &mut PrefixTable) -> Element {
    let mut message = wsdl_element("message");
    message.attributes.insert("name".into(), name.to_string());
    for part in parts {
        let mut element = wsdl_element("part");
        element.attributes.insert("name".into(), part.name.clone());
        if let Some(qname) = &part.element {
            element.attributes.insert("element".into(), prefixes.prefixed(qname));
        } else if let Some(qname) = &part.type_name {
            element.attributes.insert("type".into(), prefixes.prefixed(qname));
        }
        push(&mut message, element);
    }
    message
}

fn message_ref(kind: &str, message: &str) -> Element {
    let mut element = wsdl_element(kind);
    element.attributes.insert("message".into(), message.to_string());
    element
}

fn body_message(kind: &str, rpc: bool, tns: &str) -> Element {
    let mut element = wsdl_element(kind);
    let mut body = soap_element("body");
    body.attributes.insert("use".into(), "literal".into());
    if rpc {
        body.attributes.insert("namespace".into(), tns.to_string());
    }
    push(&mut element, body);
    element
}
