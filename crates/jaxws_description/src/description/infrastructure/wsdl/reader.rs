//! WSDL 1.1 document reader built on `xmltree`.
//!
//! The reader walks the element tree once and fills the [`Definition`] model.
//! Qualified-name attribute values (`binding="tns:CalcBinding"`) are resolved
//! against the namespace declarations in scope on the element carrying them.

use std::io::Read;

use xmltree::{Element, XMLNode};

use crate::description::{
    error::DescriptionError,
    infrastructure::{
        naming::{QName, wsdl_ns},
        wsdl::model::{
            Binding, BindingMessage, BindingOperation, Definition, ExtensibilityElement, Message,
            MimePart, OperationMessage, Part, Port, PortType, SoapVersion, WsdlOperation,
            WsdlService,
        },
    },
};

/// Parses a WSDL document. `location` is only used for error reporting and as
/// the document base URI.
pub fn read_definition<R: Read>(source: R, location: &str) -> Result<Definition, DescriptionError> {
    let root = Element::parse(source)
        .map_err(|e| DescriptionError::WsdlParse(location.to_string(), e.to_string()))?;
    if root.name != "definitions" || root.namespace.as_deref() != Some(wsdl_ns::WSDL) {
        return Err(DescriptionError::WsdlParse(
            location.to_string(),
            format!("unexpected root element {}", root.name),
        ));
    }
    let target_namespace = root.attributes.get("targetNamespace").cloned().unwrap_or_default();
    let reader = DocumentReader { location, target_namespace: &target_namespace };

    let mut definition = Definition {
        document_base_uri: Some(location.to_string()),
        name: root.attributes.get("name").cloned(),
        target_namespace: target_namespace.clone(),
        ..Default::default()
    };
    for message in wsdl_children(&root, "message") {
        definition.messages.push(reader.message(message)?);
    }
    for port_type in wsdl_children(&root, "portType") {
        definition.port_types.push(reader.port_type(port_type)?);
    }
    for binding in wsdl_children(&root, "binding") {
        definition.bindings.push(reader.binding(binding)?);
    }
    for service in wsdl_children(&root, "service") {
        definition.services.push(reader.service(service)?);
    }
    Ok(definition)
}

/// Parses a WSDL document held in memory.
pub fn read_definition_from_str(xml: &str, location: &str) -> Result<Definition, DescriptionError> {
    read_definition(xml.as_bytes(), location)
}

struct DocumentReader<'a> {
    location: &'a str,
    target_namespace: &'a str,
}

impl DocumentReader<'_> {
    fn malformed(&self, cause: impl Into<String>) -> DescriptionError {
        DescriptionError::WsdlParse(self.location.to_string(), cause.into())
    }

    fn required<'e>(&self, element: &'e Element, attribute: &str) -> Result<&'e str, DescriptionError> {
        element
            .attributes
            .get(attribute)
            .map(String::as_str)
            .ok_or_else(|| self.malformed(format!("{} is missing attribute {}", element.name, attribute)))
    }

    fn local_name(&self, element: &Element) -> Result<QName, DescriptionError> {
        let name = self.required(element, "name")?;
        Ok(QName::new(self.target_namespace, name))
    }

    /// Resolves a `prefix:local` attribute value against the element's namespaces.
    fn qname_value(&self, element: &Element, value: &str) -> QName {
        let namespaces = element.namespaces.as_ref();
        match value.split_once(':') {
            Some((prefix, local)) => {
                let namespace = namespaces.and_then(|ns| ns.get(prefix)).unwrap_or(self.target_namespace);
                QName::new(namespace, local)
            }
            None => {
                let namespace = namespaces
                    .and_then(|ns| ns.get(""))
                    .filter(|ns| !ns.is_empty())
                    .unwrap_or(self.target_namespace);
                QName::new(namespace, value)
            }
        }
    }

    fn qname_attribute(&self, element: &Element, attribute: &str) -> Result<QName, DescriptionError> {
        let value = self.required(element, attribute)?;
        Ok(self.qname_value(element, value))
    }

    fn message(&self, element: &Element) -> Result<Message, DescriptionError> {
        let mut message = Message { name: self.local_name(element)?, parts: Vec::new() };
        for part in wsdl_children(element, "part") {
            message.parts.push(Part {
                name: self.required(part, "name")?.to_string(),
                element: part.attributes.get("element").map(|v| self.qname_value(part, v)),
                type_name: part.attributes.get("type").map(|v| self.qname_value(part, v)),
            });
        }
        Ok(message)
    }

    fn port_type(&self, element: &Element) -> Result<PortType, DescriptionError> {
        let mut port_type = PortType { name: self.local_name(element)?, operations: Vec::new() };
        for operation in wsdl_children(element, "operation") {
            port_type.operations.push(WsdlOperation {
                name: self.required(operation, "name")?.to_string(),
                input: wsdl_children(operation, "input")
                    .next()
                    .map(|m| self.operation_message(m))
                    .transpose()?,
                output: wsdl_children(operation, "output")
                    .next()
                    .map(|m| self.operation_message(m))
                    .transpose()?,
                faults: wsdl_children(operation, "fault")
                    .map(|m| self.operation_message(m))
                    .collect::<Result<_, _>>()?,
            });
        }
        Ok(port_type)
    }

    fn operation_message(&self, element: &Element) -> Result<OperationMessage, DescriptionError> {
        Ok(OperationMessage {
            name: element.attributes.get("name").cloned(),
            message: self.qname_attribute(element, "message")?,
            action: element.attributes.get("Action").cloned(),
        })
    }

    fn binding(&self, element: &Element) -> Result<Binding, DescriptionError> {
        let mut binding = Binding {
            name: self.local_name(element)?,
            port_type: self.qname_attribute(element, "type")?,
            extensibility: self.extensibility(element)?,
            operations: Vec::new(),
        };
        for operation in wsdl_children(element, "operation") {
            binding.operations.push(BindingOperation {
                name: self.required(operation, "name")?.to_string(),
                extensibility: self.extensibility(operation)?,
                input: wsdl_children(operation, "input")
                    .next()
                    .map(|m| self.binding_message(m))
                    .transpose()?,
                output: wsdl_children(operation, "output")
                    .next()
                    .map(|m| self.binding_message(m))
                    .transpose()?,
                faults: wsdl_children(operation, "fault")
                    .map(|m| self.binding_message(m))
                    .collect::<Result<_, _>>()?,
            });
        }
        Ok(binding)
    }

    fn binding_message(&self, element: &Element) -> Result<BindingMessage, DescriptionError> {
        Ok(BindingMessage {
            name: element.attributes.get("name").cloned(),
            extensibility: self.extensibility(element)?,
        })
    }

    fn service(&self, element: &Element) -> Result<WsdlService, DescriptionError> {
        let mut service = WsdlService { name: self.local_name(element)?, ports: Vec::new() };
        for port in wsdl_children(element, "port") {
            service.ports.push(Port {
                name: self.required(port, "name")?.to_string(),
                binding: self.qname_attribute(port, "binding")?,
                extensibility: self.extensibility(port)?,
            });
        }
        Ok(service)
    }

    /// Non-WSDL children of a WSDL component.
    fn extensibility(&self, element: &Element) -> Result<Vec<ExtensibilityElement>, DescriptionError> {
        child_elements(element)
            .filter(|child| child.namespace.as_deref() != Some(wsdl_ns::WSDL))
            .map(|child| self.extensibility_element(child))
            .collect()
    }

    fn extensibility_element(&self, element: &Element) -> Result<ExtensibilityElement, DescriptionError> {
        let namespace = element.namespace.as_deref().unwrap_or_default();
        let attribute = |name: &str| element.attributes.get(name).cloned();

        if let Some(version) = SoapVersion::from_namespace(namespace) {
            let parsed = match element.name.as_str() {
                "binding" => ExtensibilityElement::SoapBinding {
                    version,
                    transport: attribute("transport"),
                    style: attribute("style"),
                },
                "address" => ExtensibilityElement::SoapAddress {
                    version,
                    location: attribute("location").unwrap_or_default(),
                },
                "operation" => ExtensibilityElement::SoapOperation {
                    version,
                    soap_action: attribute("soapAction"),
                    style: attribute("style"),
                },
                "body" => ExtensibilityElement::SoapBody {
                    version,
                    use_: attribute("use"),
                    namespace: attribute("namespace"),
                    parts: attribute("parts")
                        .map(|p| p.split_whitespace().map(str::to_string).collect())
                        .unwrap_or_default(),
                },
                "header" => ExtensibilityElement::SoapHeader {
                    version,
                    message: self.qname_attribute(element, "message")?,
                    part: self.required(element, "part")?.to_string(),
                },
                _ => ExtensibilityElement::Unknown(QName::new(namespace, element.name.as_str())),
            };
            return Ok(parsed);
        }

        let parsed = match (namespace, element.name.as_str()) {
            (wsdl_ns::HTTP, "binding") => ExtensibilityElement::HttpBinding { verb: attribute("verb") },
            (wsdl_ns::HTTP, "address") => {
                ExtensibilityElement::HttpAddress { location: attribute("location").unwrap_or_default() }
            }
            (wsdl_ns::MIME, "multipartRelated") => {
                let mut parts = Vec::new();
                for part in child_elements(element).filter(|c| c.name == "part") {
                    parts.push(MimePart { extensibility: self.extensibility(part)? });
                }
                ExtensibilityElement::MimeMultipartRelated(parts)
            }
            (wsdl_ns::MIME, "content") => ExtensibilityElement::MimeContent {
                part: attribute("part"),
                content_type: attribute("type"),
            },
            _ => ExtensibilityElement::Unknown(QName::new(namespace, element.name.as_str())),
        };
        Ok(parsed)
    }
}

fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(XMLNode::as_element)
}

fn wsdl_children<'a>(element: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    child_elements(element)
        .filter(move |c| c.name == name && c.namespace.as_deref() == Some(wsdl_ns::WSDL))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALC_WSDL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"
    xmlns:soap12="http://schemas.xmlsoap.org/wsdl/soap12/"
    xmlns:mime="http://schemas.xmlsoap.org/wsdl/mime/"
    xmlns:tns="http://example.com" xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    name="Calc" targetNamespace="http://example.com">
  <wsdl:message name="add"><wsdl:part name="parameters" element="tns:add"/></wsdl:message>
  <wsdl:message name="addResponse"><wsdl:part name="parameters" element="tns:addResponse"/></wsdl:message>
  <wsdl:portType name="Calc">
    <wsdl:operation name="add">
      <wsdl:input message="tns:add"/>
      <wsdl:output message="tns:addResponse"/>
    </wsdl:operation>
    <wsdl:operation name="reset">
      <wsdl:input message="tns:add"/>
    </wsdl:operation>
  </wsdl:portType>
  <wsdl:binding name="CalcBinding" type="tns:Calc">
    <soap12:binding style="document" transport="http://schemas.xmlsoap.org/soap/http"/>
    <wsdl:operation name="add">
      <soap12:operation soapAction="urn:add"/>
      <wsdl:input>
        <mime:multipartRelated>
          <mime:part><soap12:body use="literal"/></mime:part>
          <mime:part><mime:content part="image" type="image/png"/></mime:part>
        </mime:multipartRelated>
      </wsdl:input>
      <wsdl:output><soap12:body use="literal"/></wsdl:output>
    </wsdl:operation>
  </wsdl:binding>
  <wsdl:service name="CalcService">
    <wsdl:port name="P1" binding="tns:CalcBinding">
      <soap12:address location="http://localhost:8080/calc"/>
    </wsdl:port>
  </wsdl:service>
</wsdl:definitions>"#;

    #[test]
    fn unit_reader_parses_services_and_bindings() {
        let definition = read_definition_from_str(CALC_WSDL, "calc.wsdl").unwrap();
        assert_eq!(definition.target_namespace, "http://example.com");
        let service = QName::new("http://example.com", "CalcService");
        let port = definition.port(&service, "P1").unwrap();
        assert_eq!(port.binding, QName::new("http://example.com", "CalcBinding"));
        assert_eq!(port.soap_address(), Some("http://localhost:8080/calc"));

        let binding = definition.binding_for_port(port).unwrap();
        assert_eq!(binding.binding_element(), Some((wsdl_ns::SOAP12, Some("http://schemas.xmlsoap.org/soap/http"))));
        assert_eq!(binding.operation("add").unwrap().soap_action(), Some("urn:add"));

        let port_type = definition.port_type_for_port(port).unwrap();
        assert_eq!(port_type.operations.len(), 2);
        assert!(!port_type.operation("add").unwrap().is_one_way());
        assert!(port_type.operation("reset").unwrap().is_one_way());
    }

    #[test]
    fn unit_reader_parses_mime_parts() {
        let definition = read_definition_from_str(CALC_WSDL, "calc.wsdl").unwrap();
        let binding = &definition.bindings[0];
        let input = binding.operation("add").unwrap().input.as_ref().unwrap();
        let parts: Vec<_> = input.mime_parts().collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(input.soap_body_use(), Some("literal"));
        assert_eq!(
            parts[1].extensibility[0],
            ExtensibilityElement::MimeContent {
                part: Some("image".to_string()),
                content_type: Some("image/png".to_string())
            }
        );
    }

    #[test]
    fn unit_reader_rejects_malformed_documents() {
        assert!(matches!(
            read_definition_from_str("<definitions", "broken.wsdl"),
            Err(DescriptionError::WsdlParse(location, _)) if location == "broken.wsdl"
        ));
        assert!(matches!(
            read_definition_from_str("<root/>", "other.xml"),
            Err(DescriptionError::WsdlParse(_, _))
        ));
    }
}
