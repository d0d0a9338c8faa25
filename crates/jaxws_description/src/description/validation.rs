//! Server-side validation of implementation classes.
//!
//! Runs before a server description is built so that a misconfigured class is
//! rejected at construction time rather than on its first invocation.
//!
//! ## Rules
//!
//! **Annotation kind**: a class carries exactly one of `@WebService` and
//! `@WebServiceProvider`, and providers implement `javax.xml.ws.Provider`.
//!
//! **Class shape**: implementation classes are public, concrete, non-final
//! classes with a default constructor.
//!
//! **Providers**: the provider type is `Source`, `SOAPMessage` or `DataSource`,
//! and the service mode and binding agree with it.
//!
//! **Explicit SEI**: the `endpointInterface` names a catalogued `@WebService`
//! interface, the implementation leaves the per-operation annotations to it and
//! conforms to it method by method.
//!
//! **Binding**: encoded use and method-level RPC style are unsupported.
//!
//! **Exposed methods**: no asynchronous return types on the server, and no
//! static or final `@WebMethod` on an implicit SEI.

use std::sync::Arc;

#[cfg(feature = "description_tracing")]
use tracing::debug;

use crate::description::{
    core::interface::{implicit_candidates, sei_methods},
    error::DescriptionError,
    facts::{ClassFacts, FactsCatalog, MethodFacts, ServiceMode, SoapBindingFacts, Style, Use},
    infrastructure::naming::{binding, java, raw_type_name},
};

/// Validator for the composites of one catalog.
#[derive(Debug, Clone, Copy)]
pub struct ImplementationValidator<'a> {
    catalog: &'a FactsCatalog,
}

impl<'a> ImplementationValidator<'a> {
    pub fn new(catalog: &'a FactsCatalog) -> Self {
        Self { catalog }
    }

    /// Applies every rule to `class`, stopping at the first violation.
    pub fn validate(&self, class: &ClassFacts) -> Result<(), DescriptionError> {
        let result = self.validate_annotation_kind(class).and_then(|_| {
            if class.web_service_provider.is_some() {
                self.validate_provider(class)
            } else {
                self.validate_endpoint(class)
            }
        });
        if let Err(_e) = &result {
            #[cfg(feature = "description_tracing")]
            debug!("[validation] {} rejected: {}", class.class_name, _e);
        }
        result
    }

    fn validate_annotation_kind(&self, class: &ClassFacts) -> Result<(), DescriptionError> {
        let invalid = |reason: &str| Err(DescriptionError::InvalidImplementation(class.class_name.clone(), reason.into()));
        match (class.web_service.is_some(), class.web_service_provider.is_some()) {
            (true, true) => invalid("both @WebService and @WebServiceProvider are present"),
            (false, false) => invalid("neither @WebService nor @WebServiceProvider is present"),
            (true, false) if class.is_provider() => Err(DescriptionError::InvalidProvider(
                class.class_name.clone(),
                "a Provider implementation must carry @WebServiceProvider".into(),
            )),
            (false, true) if !class.is_provider() => Err(DescriptionError::InvalidProvider(
                class.class_name.clone(),
                "a @WebServiceProvider class must implement javax.xml.ws.Provider".into(),
            )),
            _ => Ok(()),
        }
    }

    fn class_shape_violation(class: &ClassFacts) -> Option<&'static str> {
        if class.is_interface {
            Some("an interface cannot be an implementation class")
        } else if !class.is_public {
            Some("class is not public")
        } else if class.is_final {
            Some("class is final")
        } else if class.is_abstract {
            Some("class is abstract")
        } else if !class.has_default_constructor {
            Some("class has no default constructor")
        } else {
            None
        }
    }

    /// Binding id declared by `@BindingType`, else SOAP 1.1 over HTTP.
    fn annotated_binding(class: &ClassFacts) -> &str {
        class
            .binding_type
            .as_ref()
            .and_then(|b| b.value.as_deref())
            .filter(|b| !b.is_empty())
            .unwrap_or(binding::DEFAULT)
    }

    fn validate_provider(&self, class: &ClassFacts) -> Result<(), DescriptionError> {
        let invalid = |reason: String| Err(DescriptionError::InvalidProvider(class.class_name.clone(), reason));
        if let Some(reason) = Self::class_shape_violation(class) {
            return invalid(reason.to_string());
        }
        let has_invoke = class
            .methods
            .iter()
            .chain(self.catalog.superclasses(class).iter().flat_map(|p| p.methods.iter()))
            .any(|m| m.name == "invoke" && m.parameters.len() == 1);
        if !has_invoke {
            return invalid("no invoke method".into());
        }
        let provider_type = class.provider_type().map(raw_type_name).unwrap_or_default();
        if ![java::SOURCE, java::SOAP_MESSAGE, java::DATA_SOURCE].contains(&provider_type) {
            return invalid(format!("unsupported provider type {}", provider_type));
        }
        let mode = class.service_mode.as_ref().map(|m| m.mode).unwrap_or_default();
        let binding_id = Self::annotated_binding(class);
        match (mode, provider_type) {
            (ServiceMode::Payload, java::SOAP_MESSAGE | java::DATA_SOURCE) => {
                invalid(format!("{} providers require MESSAGE service mode", provider_type))
            }
            (ServiceMode::Message, java::SOAP_MESSAGE) if !binding::is_soap(binding_id) => {
                invalid(format!("SOAPMessage providers require a SOAP binding, found {}", binding_id))
            }
            (ServiceMode::Message, java::DATA_SOURCE) if !binding::is_http(binding_id) => {
                invalid(format!("DataSource providers require the HTTP binding, found {}", binding_id))
            }
            _ => Ok(()),
        }
    }

    fn validate_endpoint(&self, class: &ClassFacts) -> Result<(), DescriptionError> {
        let invalid = |reason: String| Err(DescriptionError::InvalidImplementation(class.class_name.clone(), reason));
        if class.service_mode.is_some() {
            return invalid("@ServiceMode is only allowed on providers".into());
        }
        if let Some(reason) = Self::class_shape_violation(class) {
            return invalid(reason.to_string());
        }
        match class.endpoint_interface() {
            Some(sei_name) => {
                let sei = self.validate_sei(class, sei_name)?;
                Self::validate_soap_binding(&sei.class_name, sei.soap_binding.as_ref())?;
                let methods = sei_methods(&sei, self.catalog)?;
                for method in &methods {
                    Self::validate_method(class, method)?;
                    self.validate_conformance(class, method)?;
                }
            }
            None => {
                Self::validate_soap_binding(&class.class_name, class.soap_binding.as_ref())?;
                for method in implicit_candidates(class, self.catalog) {
                    let exposed_annotation = method.web_method.as_ref().is_some_and(|w| !w.exclude);
                    if (method.is_static || method.is_final) && exposed_annotation {
                        return invalid(format!("@WebMethod {} is static or final", method.name));
                    }
                    let excluded = method.web_method.as_ref().is_some_and(|w| w.exclude);
                    if !excluded && !method.is_static && !method.is_final {
                        Self::validate_method(class, &method)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks the SEI named by `endpointInterface` and the annotations the
    /// implementation must leave to it.
    fn validate_sei(&self, class: &ClassFacts, sei_name: &str) -> Result<Arc<ClassFacts>, DescriptionError> {
        let invalid_sei = |reason: &str| Err(DescriptionError::InvalidSei(sei_name.to_string(), reason.into()));
        let Some(sei) = self.catalog.get(sei_name) else {
            return invalid_sei("class not found in catalog");
        };
        if !sei.is_interface {
            return invalid_sei("not an interface");
        }
        let Some(web_service) = &sei.web_service else {
            return invalid_sei("missing @WebService");
        };
        if web_service.endpoint_interface.as_deref().is_some_and(|e| !e.is_empty()) {
            return invalid_sei("an SEI cannot declare endpointInterface");
        }

        let unsupported =
            |reason: &str| Err(DescriptionError::UnsupportedAnnotation(class.class_name.clone(), reason.into()));
        if class.soap_binding.is_some() {
            return unsupported("@SOAPBinding belongs on the endpoint interface");
        }
        if class.web_fault.is_some() {
            return unsupported("@WebFault is not allowed on an implementation class");
        }
        if class.web_service_client.is_some() {
            return unsupported("@WebServiceClient is not allowed on an implementation class");
        }
        if class.web_service.as_ref().and_then(|w| w.name.as_deref()).is_some_and(|n| !n.is_empty()) {
            return unsupported("@WebService.name belongs on the endpoint interface");
        }
        if let Some(method) = class.methods.iter().find(|m| m.web_method.is_some()) {
            return unsupported(&format!("@WebMethod on {} belongs on the endpoint interface", method.name));
        }
        Ok(sei.clone())
    }

    fn validate_soap_binding(class_name: &str, soap_binding: Option<&SoapBindingFacts>) -> Result<(), DescriptionError> {
        if soap_binding.is_some_and(|b| b.use_ == Some(Use::Encoded)) {
            return Err(DescriptionError::UnsupportedAnnotation(
                class_name.to_string(),
                "@SOAPBinding use ENCODED is not supported".into(),
            ));
        }
        Ok(())
    }

    /// Per-method binding and return-type rules for an exposed method.
    fn validate_method(class: &ClassFacts, method: &MethodFacts) -> Result<(), DescriptionError> {
        if let Some(soap_binding) = &method.soap_binding {
            Self::validate_soap_binding(&class.class_name, Some(soap_binding))?;
            if soap_binding.style == Some(Style::Rpc) {
                return Err(DescriptionError::UnsupportedAnnotation(
                    class.class_name.clone(),
                    format!("method-level @SOAPBinding style RPC on {}", method.name),
                ));
            }
        }
        if method.is_async() {
            return Err(DescriptionError::InvalidImplementation(
                class.class_name.clone(),
                format!("method {} returns an asynchronous type", method.name),
            ));
        }
        Ok(())
    }

    /// The implementation (or one of its superclasses) must declare `sei_method`
    /// with the same return type and no additional exceptions.
    fn validate_conformance(&self, class: &ClassFacts, sei_method: &MethodFacts) -> Result<(), DescriptionError> {
        let mismatch = |reason: String| {
            Err(DescriptionError::SeiMismatch(class.class_name.clone(), sei_method.name.clone(), reason))
        };
        let parents = self.catalog.superclasses(class);
        let implementation = class
            .methods
            .iter()
            .chain(parents.iter().flat_map(|p| p.methods.iter()))
            .find(|m| m.same_signature(sei_method));
        let Some(implementation) = implementation else {
            return mismatch(format!("no method with parameters ({})", sei_method.parameter_types().join(", ")));
        };
        if implementation.return_type != sei_method.return_type {
            return mismatch(format!(
                "return type {} differs from {}",
                implementation.return_type, sei_method.return_type
            ));
        }
        if let Some(extra) = implementation.exceptions.iter().find(|e| !sei_method.exceptions.contains(*e)) {
            return mismatch(format!("exception {} is not declared by the endpoint interface", extra));
        }
        Ok(())
    }
}

/// Validates the implementation class of a server description.
pub fn validate_implementation(class: &ClassFacts, catalog: &FactsCatalog) -> Result<(), DescriptionError> {
    ImplementationValidator::new(catalog).validate(class)
}

/// A class-level `wsdlLocation` must have produced a WSDL definition.
pub fn validate_wsdl_location(class: &ClassFacts, wsdl_loaded: bool) -> Result<(), DescriptionError> {
    let declared = match &class.web_service_provider {
        Some(provider) => provider.wsdl_location.as_deref(),
        None => class.web_service.as_ref().and_then(|w| w.wsdl_location.as_deref()),
    };
    match declared.filter(|l| !l.is_empty()) {
        Some(location) if !wsdl_loaded => Err(DescriptionError::UnresolvableWsdlLocation(location.to_string())),
        _ => Ok(()),
    }
}
