//! Fault and attachment descriptions of an operation.
//!
//! Both are plain data: faults are derived once from the declared exceptions of
//! the Java method when the operation is built, attachments are derived from
//! the MIME bindings of a fully specified WSDL binding operation.

use std::collections::BTreeMap;

use crate::description::{
    facts::ClassFacts,
    infrastructure::{
        naming::{package_name, simple_class_name},
        wsdl::model::{BindingMessage, ExtensibilityElement},
    },
};

/// Mapping of one declared exception to a WSDL fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultDescriptor {
    pub exception_class_name: String,
    /// `@WebFault.name`, else the simple exception class name.
    pub name: String,
    pub target_namespace: String,
    pub fault_bean: String,
    pub message_name: String,
}

impl FaultDescriptor {
    /// Builds the fault of `exception_class`, taking `@WebFault` members from its
    /// composite when the class is known.
    pub fn from_exception(exception_class: &str, facts: Option<&ClassFacts>, default_namespace: &str) -> Self {
        let web_fault = facts.and_then(|f| f.web_fault.as_ref());
        let member = |value: Option<&Option<String>>| {
            value.and_then(|v| v.as_deref()).filter(|v| !v.is_empty()).map(str::to_string)
        };
        let simple = simple_class_name(exception_class);
        let name = member(web_fault.map(|w| &w.name)).unwrap_or_else(|| simple.to_string());
        let target_namespace =
            member(web_fault.map(|w| &w.target_namespace)).unwrap_or_else(|| default_namespace.to_string());
        let fault_bean = member(web_fault.map(|w| &w.fault_bean)).unwrap_or_else(|| match package_name(exception_class) {
            Some(package) => format!("{}.jaxws.{}Bean", package, simple),
            None => format!("jaxws.{}Bean", simple),
        });
        let message_name = member(web_fault.map(|w| &w.message_name)).unwrap_or_else(|| simple.to_string());
        Self { exception_class_name: exception_class.to_string(), name, target_namespace, fault_bean, message_name }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentType {
    /// SOAP with attachments, bound through `mime:content`.
    Swa,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDescription {
    pub attachment_type: AttachmentType,
    pub mime_types: Vec<String>,
}

/// Attachments of one operation, keyed by WSDL part name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub parts: BTreeMap<String, AttachmentDescription>,
    pub has_request_swa_ref_attachments: bool,
    pub has_response_swa_ref_attachments: bool,
}

impl AttachmentInfo {
    /// Scans the MIME parts of the input and output binding messages.
    pub fn from_binding_messages(input: Option<&BindingMessage>, output: Option<&BindingMessage>) -> Self {
        let mut info = Self::default();
        if let Some(input) = input {
            info.has_request_swa_ref_attachments = info.scan(input);
        }
        if let Some(output) = output {
            info.has_response_swa_ref_attachments = info.scan(output);
        }
        info
    }

    /// Records the `mime:content` parts of a message. Returns whether a MIME
    /// part carries the SOAP body.
    fn scan(&mut self, message: &BindingMessage) -> bool {
        let mut body_in_mime = false;
        for mime_part in message.mime_parts() {
            let mut part_name: Option<&str> = None;
            let mut mime_types = Vec::new();
            for element in &mime_part.extensibility {
                match element {
                    ExtensibilityElement::MimeContent { part, content_type } => {
                        if part_name.is_none() {
                            part_name = part.as_deref();
                        }
                        if part.as_deref() == part_name
                            && let Some(content_type) = content_type
                        {
                            mime_types.push(content_type.clone());
                        }
                    }
                    ExtensibilityElement::SoapBody { .. } => body_in_mime = true,
                    _ => {}
                }
            }
            if let Some(name) = part_name {
                self.parts
                    .entry(name.to_string())
                    .or_insert(AttachmentDescription { attachment_type: AttachmentType::Swa, mime_types });
            }
        }
        body_in_mime
    }

    pub fn attachment(&self, part_name: &str) -> Option<&AttachmentDescription> {
        self.parts.get(part_name)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() && !self.has_request_swa_ref_attachments && !self.has_response_swa_ref_attachments
    }
}
