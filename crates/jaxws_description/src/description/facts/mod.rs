//! Raw facts feeding the description model.
//!
//! Facts are plain records describing what a source says about a service,
//! without applying any default. Annotation facts are grouped into the record
//! types below (one per annotation); composite facts for classes, methods and
//! parameters live in [`composite`]; the per-attribute precedence rules that turn
//! candidate facts into effective values live in [`precedence`].
//!
//! ## Empty values
//!
//! Annotation members are `Option<String>`. An empty string is treated exactly
//! like an absent member, matching how annotation defaults are declared.

pub mod composite;
pub mod precedence;

use std::fmt::{Display, Formatter};

pub use composite::{ClassFacts, FactsCatalog, MethodFacts, ParameterFacts, SparseComposite};
pub use precedence::{Attribute, FactOrigin, Memo, Precedence, Resolved};

/// SOAP binding style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Style {
    #[default]
    Document,
    Rpc,
}

impl Style {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "document" => Some(Style::Document),
            "rpc" => Some(Style::Rpc),
            _ => None,
        }
    }
}

impl Display for Style {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Style::Document => write!(f, "document"),
            Style::Rpc => write!(f, "rpc"),
        }
    }
}

/// SOAP body encoding use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Use {
    #[default]
    Literal,
    Encoded,
}

impl Use {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "literal" => Some(Use::Literal),
            "encoded" => Some(Use::Encoded),
            _ => None,
        }
    }
}

impl Display for Use {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Use::Literal => write!(f, "literal"),
            Use::Encoded => write!(f, "encoded"),
        }
    }
}

/// Whether document-style parameters are nested in a wrapper element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterStyle {
    #[default]
    Wrapped,
    Bare,
}

impl Display for ParameterStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterStyle::Wrapped => write!(f, "wrapped"),
            ParameterStyle::Bare => write!(f, "bare"),
        }
    }
}

/// Direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    In,
    Out,
    InOut,
}

impl Mode {
    /// Parameters carried in the request message.
    pub fn is_input(&self) -> bool {
        matches!(self, Mode::In | Mode::InOut)
    }

    /// Parameters carried in the response message.
    pub fn is_output(&self) -> bool {
        matches!(self, Mode::Out | Mode::InOut)
    }
}

/// Message granularity of a provider endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceMode {
    Message,
    #[default]
    Payload,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebServiceFacts {
    pub name: Option<String>,
    pub target_namespace: Option<String>,
    pub service_name: Option<String>,
    pub port_name: Option<String>,
    pub wsdl_location: Option<String>,
    pub endpoint_interface: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebServiceProviderFacts {
    pub target_namespace: Option<String>,
    pub service_name: Option<String>,
    pub port_name: Option<String>,
    pub wsdl_location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebServiceClientFacts {
    pub name: Option<String>,
    pub target_namespace: Option<String>,
    pub wsdl_location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceModeFacts {
    pub mode: ServiceMode,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoapBindingFacts {
    pub style: Option<Style>,
    pub use_: Option<Use>,
    pub parameter_style: Option<ParameterStyle>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingTypeFacts {
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebMethodFacts {
    pub operation_name: Option<String>,
    pub action: Option<String>,
    pub exclude: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebParamFacts {
    pub name: Option<String>,
    pub part_name: Option<String>,
    pub target_namespace: Option<String>,
    pub mode: Option<Mode>,
    pub header: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebResultFacts {
    pub name: Option<String>,
    pub part_name: Option<String>,
    pub target_namespace: Option<String>,
    pub header: bool,
}

/// `@RequestWrapper` and `@ResponseWrapper` members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WrapperFacts {
    pub local_name: Option<String>,
    pub target_namespace: Option<String>,
    pub class_name: Option<String>,
    pub part_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultActionFacts {
    pub class_name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionFacts {
    pub input: Option<String>,
    pub output: Option<String>,
    pub faults: Vec<FaultActionFacts>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebFaultFacts {
    pub name: Option<String>,
    pub target_namespace: Option<String>,
    pub fault_bean: Option<String>,
    pub message_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerChainFacts {
    pub file: String,
    pub name: Option<String>,
}

/// Web-service features declared on a class or supplied by an override.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Mtom { enabled: bool, threshold: u32 },
    RespectBinding { enabled: bool },
    Addressing { enabled: bool, required: bool },
}

/// Attribute families, used to name where an attribute's facts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationFact {
    Service,
    Binding,
    Method,
    Action,
    Wrapper,
    Parameter,
    Result,
}
