//! Table-driven precedence resolution.
//!
//! Every resolvable attribute names one [`Precedence`] rule in a constant table
//! ([`Attribute::precedence`]). Resolution takes the candidate values an attribute
//! has in each source and returns the first present one in the rule's order, or
//! the attribute default. Resolution never fails.
//!
//! Resolved values are memoized per attribute in [`Memo`] cells on the
//! descriptor owning the attribute. Invalidation replaces the raw facts and
//! resets the cells; cells are never patched field by field.

use once_cell::sync::OnceCell;
#[cfg(feature = "description_tracing")]
use tracing::trace;

use crate::description::facts::AnnotationFact;

/// Source an effective value was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactOrigin {
    /// Caller-scoped override or explicit programmatic setting.
    Override,
    Wsdl,
    Annotation,
    Default,
}

/// An effective value together with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub origin: FactOrigin,
}

impl<T> Resolved<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved { value: f(self.value), origin: self.origin }
    }
}

/// Canonical precedence patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    OverrideAnnotationDefault,
    /// Attributes describing the wire shape.
    WsdlAnnotationDefault,
    OverrideWsdlAnnotationDefault,
    /// Boolean flags signalled by the presence of an annotation.
    AnnotationPresence,
}

impl Precedence {
    pub const fn order(self) -> &'static [FactOrigin] {
        match self {
            Precedence::OverrideAnnotationDefault => &[FactOrigin::Override, FactOrigin::Annotation],
            Precedence::WsdlAnnotationDefault => &[FactOrigin::Wsdl, FactOrigin::Annotation],
            Precedence::OverrideWsdlAnnotationDefault => {
                &[FactOrigin::Override, FactOrigin::Wsdl, FactOrigin::Annotation]
            }
            Precedence::AnnotationPresence => &[FactOrigin::Annotation, FactOrigin::Wsdl],
        }
    }
}

/// Every attribute resolved through the precedence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    ServiceName,
    TargetNamespace,
    WebServiceName,
    PortName,
    WsdlLocation,
    ServiceMode,
    HandlerChain,
    PreferredPort,
    EndpointAddress,
    BindingType,
    ClientBindingId,
    MtomEnabled,
    Style,
    Use,
    ParameterStyle,
    OperationName,
    SoapAction,
    Exclude,
    OneWay,
    InputAction,
    OutputAction,
    FaultAction,
    RequestWrapperLocalName,
    RequestWrapperNamespace,
    ResponseWrapperLocalName,
    ResponseWrapperNamespace,
    ParameterName,
    ParameterPartName,
    ParameterTargetNamespace,
    ParameterMode,
    ParameterHeader,
    ResultName,
    ResultPartName,
    ResultTargetNamespace,
    ResultHeader,
}

impl Attribute {
    pub const fn precedence(self) -> Precedence {
        use Attribute::*;
        match self {
            BindingType | Style | Use | SoapAction => Precedence::WsdlAnnotationDefault,
            ClientBindingId | EndpointAddress => Precedence::OverrideWsdlAnnotationDefault,
            Exclude | OneWay | ParameterHeader | ResultHeader => Precedence::AnnotationPresence,
            ServiceName | TargetNamespace | WebServiceName | PortName | WsdlLocation | ServiceMode
            | HandlerChain | PreferredPort | MtomEnabled | ParameterStyle | OperationName
            | InputAction | OutputAction | FaultAction | RequestWrapperLocalName
            | RequestWrapperNamespace | ResponseWrapperLocalName | ResponseWrapperNamespace
            | ParameterName | ParameterPartName | ParameterTargetNamespace | ParameterMode
            | ResultName | ResultPartName | ResultTargetNamespace => {
                Precedence::OverrideAnnotationDefault
            }
        }
    }

    pub const fn family(self) -> AnnotationFact {
        use Attribute::*;
        match self {
            ServiceName | TargetNamespace | WebServiceName | PortName | WsdlLocation | ServiceMode
            | HandlerChain | PreferredPort | EndpointAddress => AnnotationFact::Service,
            BindingType | ClientBindingId | MtomEnabled | Style | Use | ParameterStyle => {
                AnnotationFact::Binding
            }
            OperationName | SoapAction | Exclude | OneWay => AnnotationFact::Method,
            InputAction | OutputAction | FaultAction => AnnotationFact::Action,
            RequestWrapperLocalName | RequestWrapperNamespace | ResponseWrapperLocalName
            | ResponseWrapperNamespace => AnnotationFact::Wrapper,
            ParameterName | ParameterPartName | ParameterTargetNamespace | ParameterMode
            | ParameterHeader => AnnotationFact::Parameter,
            ResultName | ResultPartName | ResultTargetNamespace | ResultHeader => AnnotationFact::Result,
        }
    }
}

/// Candidate values of one attribute, one per source.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidates<T> {
    override_value: Option<T>,
    wsdl: Option<T>,
    annotation: Option<T>,
}

impl<T> Default for Candidates<T> {
    fn default() -> Self {
        Self { override_value: None, wsdl: None, annotation: None }
    }
}

impl<T> Candidates<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(self, value: Option<T>) -> Self {
        Self { override_value: value, ..self }
    }

    pub fn with_wsdl(self, value: Option<T>) -> Self {
        Self { wsdl: value, ..self }
    }

    pub fn with_annotation(self, value: Option<T>) -> Self {
        Self { annotation: value, ..self }
    }

    fn take(&mut self, origin: FactOrigin) -> Option<T> {
        match origin {
            FactOrigin::Override => self.override_value.take(),
            FactOrigin::Wsdl => self.wsdl.take(),
            FactOrigin::Annotation => self.annotation.take(),
            FactOrigin::Default => None,
        }
    }
}

/// Applies the attribute's precedence rule.
pub fn resolve<T>(attribute: Attribute, candidates: Candidates<T>, default: T) -> Resolved<T> {
    resolve_with(attribute, candidates, || default)
}

/// Like [`resolve`], computing the default only when no candidate applies.
pub fn resolve_with<T>(
    attribute: Attribute,
    mut candidates: Candidates<T>,
    default: impl FnOnce() -> T,
) -> Resolved<T> {
    for origin in attribute.precedence().order() {
        if let Some(value) = candidates.take(*origin) {
            #[cfg(feature = "description_tracing")]
            trace!("[precedence] {:?} ({:?} facts) from {:?}", attribute, attribute.family(), origin);
            return Resolved { value, origin: *origin };
        }
    }
    #[cfg(feature = "description_tracing")]
    trace!("[precedence] {:?} ({:?} facts) defaulted", attribute, attribute.family());
    Resolved { value: default(), origin: FactOrigin::Default }
}

/// Treats empty strings as absent candidates.
pub fn text(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Single-assignment cache cell with explicit reset.
#[derive(Debug)]
pub struct Memo<T>(OnceCell<T>);

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self(OnceCell::new())
    }
}

impl<T: Clone> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Memo<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&T> {
        self.0.get()
    }

    pub fn get_or_init(&self, f: impl FnOnce() -> T) -> &T {
        self.0.get_or_init(f)
    }

    pub fn get_or_try_init<E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        self.0.get_or_try_init(f)
    }

    pub fn is_initialized(&self) -> bool {
        self.0.get().is_some()
    }

    /// Clears the cell so the next access recomputes it.
    pub fn reset(&mut self) {
        self.0.take();
    }
}
