//! Qualified names, binding identifiers and Java naming defaults.
//!
//! Everything in the description model is keyed by XML qualified names, and most
//! naming defaults are derived from Java class and package names. This module
//! collects those conventions in one place.
//!
//! ## Binding identifiers
//!
//! Bindings are identified by URI strings. A WSDL binding is described by the
//! namespace of its `soap:binding`, `soap12:binding` or `http:binding` element plus
//! a transport URI; [`map_wsdl_binding_to_annotation`] converts that pair into the
//! identifier an annotation would carry, so both sources can be compared.
//!
//! ## Naming defaults
//!
//! When annotations leave a name unspecified, the defaults are derived from the
//! class: the simple class name, the class name suffixed with `Service` or `Port`,
//! and a target namespace built by reversing the package segments.

use std::fmt::{Display, Formatter};

use crate::description::error::DescriptionError;

/// XML qualified name: a namespace URI plus a local part.
///
/// An empty namespace is a legal value. Operation names deliberately use it so
/// that operation lookups are by local name only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: String,
    pub local_part: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local_part: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), local_part: local_part.into() }
    }

    /// Creates a name without namespace.
    pub fn local(local_part: impl Into<String>) -> Self {
        Self { namespace: String::new(), local_part: local_part.into() }
    }

    /// Parses the `{namespace}local` notation. A value without braces has no namespace.
    pub fn parse(value: &str) -> Result<Self, DescriptionError> {
        let value = value.trim();
        if let Some(rest) = value.strip_prefix('{') {
            let (namespace, local) = rest
                .split_once('}')
                .ok_or_else(|| DescriptionError::InvalidQName(value.to_string()))?;
            if local.is_empty() {
                return Err(DescriptionError::InvalidQName(value.to_string()));
            }
            Ok(Self::new(namespace, local))
        } else if value.is_empty() || value.contains('}') {
            Err(DescriptionError::InvalidQName(value.to_string()))
        } else {
            Ok(Self::local(value))
        }
    }

    /// A name is empty when its local part is empty.
    pub fn is_empty(&self) -> bool {
        self.local_part.is_empty()
    }
}

impl Display for QName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local_part)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local_part)
        }
    }
}

/// Returns `true` for absent or empty string values.
pub fn is_empty(value: Option<&str>) -> bool {
    value.is_none_or(str::is_empty)
}

/// Returns the value if it is present and not empty.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Binding identifiers accepted by the description layer.
pub mod binding {
    pub const SOAP11_HTTP: &str = "http://schemas.xmlsoap.org/wsdl/soap/http";
    pub const SOAP11_HTTP_MTOM: &str = "http://schemas.xmlsoap.org/wsdl/soap/http?mtom=true";
    pub const SOAP12_HTTP: &str = "http://www.w3.org/2003/05/soap/bindings/HTTP/";
    pub const SOAP12_HTTP_MTOM: &str = "http://www.w3.org/2003/05/soap/bindings/HTTP/?mtom=true";
    pub const HTTP: &str = "http://www.w3.org/2004/08/wsdl/http";
    pub const SOAP11_JMS: &str = "http://www.w3.org/2010/soapjms/";
    pub const SOAP11_JMS_MTOM: &str = "http://www.w3.org/2010/soapjms/?mtom=true";
    pub const SOAP12_JMS: &str = "http://www.w3.org/2003/05/soap/bindings/JMS/";
    pub const SOAP12_JMS_MTOM: &str = "http://www.w3.org/2003/05/soap/bindings/JMS/?mtom=true";
    /// Token some deployment descriptors use for SOAP 1.1 over HTTP.
    pub const SOAP_HTTP_TOKEN: &str = "SOAP_HTTP_BINDING";

    /// Binding id used when neither WSDL nor annotations name one.
    pub const DEFAULT: &str = SOAP11_HTTP;

    /// Identifiers a client may set explicitly.
    pub const CLIENT_WHITELIST: [&str; 9] = [
        SOAP11_HTTP,
        SOAP11_HTTP_MTOM,
        SOAP12_HTTP,
        SOAP12_HTTP_MTOM,
        HTTP,
        SOAP11_JMS,
        SOAP11_JMS_MTOM,
        SOAP12_JMS,
        SOAP12_JMS_MTOM,
    ];

    pub fn is_valid_client_binding(id: &str) -> bool {
        CLIENT_WHITELIST.contains(&id)
    }

    pub fn is_mtom(id: &str) -> bool {
        matches!(id, SOAP11_HTTP_MTOM | SOAP12_HTTP_MTOM | SOAP11_JMS_MTOM | SOAP12_JMS_MTOM)
    }

    pub fn is_soap11(id: &str) -> bool {
        matches!(id, SOAP11_HTTP | SOAP11_HTTP_MTOM | SOAP11_JMS | SOAP11_JMS_MTOM | SOAP_HTTP_TOKEN)
    }

    pub fn is_soap12(id: &str) -> bool {
        matches!(id, SOAP12_HTTP | SOAP12_HTTP_MTOM | SOAP12_JMS | SOAP12_JMS_MTOM)
    }

    pub fn is_http(id: &str) -> bool {
        id == HTTP
    }

    pub fn is_soap(id: &str) -> bool {
        is_soap11(id) || is_soap12(id)
    }
}

/// Namespaces of the WSDL 1.1 vocabulary and its binding extensions.
pub mod wsdl_ns {
    pub const WSDL: &str = "http://schemas.xmlsoap.org/wsdl/";
    pub const SOAP11: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
    pub const SOAP12: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
    pub const HTTP: &str = "http://schemas.xmlsoap.org/wsdl/http/";
    pub const MIME: &str = "http://schemas.xmlsoap.org/wsdl/mime/";
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema";
    pub const ADDRESSING_WSDL: &str = "http://www.w3.org/2006/05/addressing/wsdl";
}

/// Converts a WSDL binding element namespace and transport into a binding id.
///
/// Returns `None` when the namespace is not a known binding vocabulary.
pub fn map_wsdl_binding_to_annotation(namespace: &str, transport: Option<&str>) -> Option<String> {
    let transport = transport.unwrap_or_default();
    match namespace {
        wsdl_ns::SOAP11 if transport == binding::SOAP11_JMS => Some(binding::SOAP11_JMS.into()),
        wsdl_ns::SOAP11 => Some(binding::SOAP11_HTTP.into()),
        wsdl_ns::SOAP12 if transport == binding::SOAP12_JMS => Some(binding::SOAP12_JMS.into()),
        wsdl_ns::SOAP12 => Some(binding::SOAP12_HTTP.into()),
        wsdl_ns::HTTP => Some(binding::HTTP.into()),
        _ => None,
    }
}

/// Well-known Java type names the description layer reasons about.
pub mod java {
    pub const OBJECT: &str = "java.lang.Object";
    pub const HOLDER: &str = "javax.xml.ws.Holder";
    pub const PROVIDER: &str = "javax.xml.ws.Provider";
    pub const SERVICE: &str = "javax.xml.ws.Service";
    pub const RESPONSE: &str = "javax.xml.ws.Response";
    pub const FUTURE: &str = "java.util.concurrent.Future";
    pub const SOURCE: &str = "javax.xml.transform.Source";
    pub const SOAP_MESSAGE: &str = "javax.xml.soap.SOAPMessage";
    pub const DATA_SOURCE: &str = "javax.activation.DataSource";
    pub const VOID: &str = "void";
    pub const CONSTRUCTOR: &str = "<init>";
}

/// Text after the last `.` of a class name.
pub fn simple_class_name(class_name: &str) -> &str {
    let base = class_name.split('<').next().unwrap_or(class_name);
    base.rsplit_once('.').map_or(base, |(_, simple)| simple)
}

/// Package of a class name, `None` for the default package.
pub fn package_name(class_name: &str) -> Option<&str> {
    let base = class_name.split('<').next().unwrap_or(class_name);
    base.rsplit_once('.').map(|(package, _)| package)
}

/// Default target namespace: `a.b.c` becomes `http://c.b.a/`.
pub fn namespace_from_package(package: Option<&str>) -> String {
    match package.filter(|p| !p.is_empty()) {
        Some(package) => {
            let reversed: Vec<&str> = package.split('.').rev().collect();
            format!("http://{}/", reversed.join("."))
        }
        None => "http://DefaultNamespace".to_string(),
    }
}

/// Default target namespace derived from the package of a class.
pub fn namespace_from_class(class_name: &str) -> String {
    namespace_from_package(package_name(class_name))
}

/// Erases the generic arguments of a type name.
pub fn raw_type_name(type_name: &str) -> &str {
    type_name.split('<').next().unwrap_or(type_name).trim()
}

/// First generic argument of a type name, e.g. `T` in `Holder<T>`.
pub fn generic_argument(type_name: &str) -> Option<&str> {
    let start = type_name.find('<')?;
    let end = type_name.rfind('>')?;
    let inner = type_name.get(start + 1..end)?.trim();
    // A nested generic keeps its own brackets.
    let mut depth = 0usize;
    for (index, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some(inner[..index].trim()),
            _ => {}
        }
    }
    (!inner.is_empty()).then_some(inner)
}

/// WS-Addressing default action delimiter for a namespace.
pub fn action_delimiter(namespace: &str) -> &'static str {
    if namespace.starts_with("urn:") { ":" } else { "/" }
}

/// Builds `[namespace][d][segments...]`, joining with the namespace delimiter
/// and never doubling a trailing delimiter on the namespace.
pub fn build_action(namespace: &str, segments: &[&str]) -> String {
    let delimiter = action_delimiter(namespace);
    let mut action = namespace.to_string();
    for segment in segments {
        if !action.is_empty() && !action.ends_with(delimiter) {
            action.push_str(delimiter);
        }
        action.push_str(segment);
    }
    action
}
