use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DescriptionError {
    #[error("Description error, service qualified name is missing")]
    MissingServiceQName,

    #[error("Description error, invalid qualified name (value: {0})")]
    InvalidQName(String),

    #[error("Description error, port name is missing (service: {0})")]
    EmptyPortName(String),

    #[error("Description error, port is not declared (service: {0}, port: {1})")]
    UndeclaredPort(String, String),

    #[error("Description error, port is already declared in WSDL (port: {0})")]
    PortDeclaredInWsdl(String),

    #[error("Description error, dynamic port cannot be bound to an SEI (port: {0})")]
    DynamicPortWithSei(String),

    #[error("Description error, port already bound to another SEI (port: {0}, bound: {1}, requested: {2})")]
    AmbiguousSei(String, String, String),

    #[error("Description error, an SEI is required to get a port (port: {0})")]
    MissingSei(String),

    #[error("Description error, a caller scope is required to add a port (port: {0})")]
    MissingCallerKey(String),

    #[error("Description error, override composite not allowed (update: {0}, port: {1})")]
    CompositeNotAllowed(String, String),

    #[error("Description error, an SEI cannot be used to create a dispatch (port: {0})")]
    SeiNotAllowed(String),

    #[error("Description error, invalid client binding id (port: {0}, binding: {1})")]
    InvalidBindingId(String, String),

    #[error("Description error, WSDL location cannot be resolved (location: {0})")]
    UnresolvableWsdlLocation(String),

    #[error("Description error, failed to read WSDL (location: {0}, cause: {1})")]
    WsdlRead(String, String),

    #[error("Description error, malformed WSDL (location: {0}, cause: {1})")]
    WsdlParse(String, String),

    #[error("Description error, service not found in WSDL (service: {0})")]
    ServiceNotInWsdl(String),

    #[error("Description error, endpoint not found (service: {0}, port: {1})")]
    EndpointNotFound(String, String),

    #[error("Description error, endpoint has no interface description (port: {0})")]
    NoEndpointInterface(String),

    #[error("Description error, class not found in catalog (class: {0})")]
    UnknownClass(String),

    #[error("Description error, invalid implementation class (class: {0}, reason: {1})")]
    InvalidImplementation(String, String),

    #[error("Description error, invalid provider class (class: {0}, reason: {1})")]
    InvalidProvider(String, String),

    #[error("Description error, invalid service endpoint interface (class: {0}, reason: {1})")]
    InvalidSei(String, String),

    #[error("Description error, implementation does not conform to its SEI (class: {0}, method: {1}, reason: {2})")]
    SeiMismatch(String, String, String),

    #[error("Description error, unsupported annotation usage (class: {0}, reason: {1})")]
    UnsupportedAnnotation(String, String),

    #[error("Description error, invalid operation (operation: {0}, reason: {1})")]
    InvalidOperation(String, String),

    #[error("Description error, WSDL generation failed (service: {0}, cause: {1})")]
    WsdlGeneration(String, String),

    #[error("Description error, service description already released (service: {0})")]
    AlreadyReleased(String),
}
