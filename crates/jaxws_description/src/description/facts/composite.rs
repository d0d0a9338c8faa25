//! Composite facts for classes, methods and parameters.
//!
//! A [`ClassFacts`] is the description-builder composite of one class or
//! interface: its shape (modifiers, hierarchy, methods) and every class-level
//! annotation record. A [`FactsCatalog`] indexes composites by class name so that
//! SEIs, superclasses and exception classes can be looked up while building a
//! description. A [`SparseComposite`] carries the caller-scoped overrides.

use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    sync::Arc,
};

use crate::description::{
    facts::{
        ActionFacts, BindingTypeFacts, Feature, HandlerChainFacts, Mode, ServiceMode,
        ServiceModeFacts, SoapBindingFacts, WebFaultFacts, WebMethodFacts, WebParamFacts,
        WebResultFacts, WebServiceClientFacts, WebServiceFacts, WebServiceProviderFacts,
        WrapperFacts,
    },
    infrastructure::{
        naming::{QName, generic_argument, java, raw_type_name},
        wsdl::Definition,
    },
};

/// Property key of the service reference name in override properties.
pub const SERVICE_REF_NAME: &str = "SERVICE_REF_NAME";

/// Facts about one method parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterFacts {
    pub type_name: String,
    /// Type wrapped by a holder, when the parameter is a holder.
    pub holder_actual_type: Option<String>,
    pub is_list: bool,
    pub web_param: Option<WebParamFacts>,
}

impl ParameterFacts {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), ..Default::default() }
    }

    /// Holder parameter wrapping `actual_type`.
    pub fn holder(actual_type: impl Into<String>) -> Self {
        let actual_type = actual_type.into();
        Self {
            type_name: format!("{}<{}>", java::HOLDER, actual_type),
            holder_actual_type: Some(actual_type),
            ..Default::default()
        }
    }

    pub fn with_web_param(self, web_param: WebParamFacts) -> Self {
        Self { web_param: Some(web_param), ..self }
    }

    pub fn named(self, name: &str) -> Self {
        let mut web_param = self.web_param.clone().unwrap_or_default();
        web_param.name = Some(name.to_string());
        self.with_web_param(web_param)
    }

    pub fn with_mode(self, mode: Mode) -> Self {
        let mut web_param = self.web_param.clone().unwrap_or_default();
        web_param.mode = Some(mode);
        self.with_web_param(web_param)
    }

    pub fn header(self) -> Self {
        let mut web_param = self.web_param.clone().unwrap_or_default();
        web_param.header = true;
        self.with_web_param(web_param)
    }

    pub fn list(self) -> Self {
        Self { is_list: true, ..self }
    }

    pub fn is_holder(&self) -> bool {
        self.holder_actual_type.is_some() || raw_type_name(&self.type_name) == java::HOLDER
    }

    /// The holder's wrapped type, or the declared type.
    pub fn actual_type(&self) -> &str {
        if let Some(actual) = &self.holder_actual_type {
            return actual;
        }
        if self.is_holder() {
            return generic_argument(&self.type_name).unwrap_or(java::OBJECT);
        }
        &self.type_name
    }
}

/// Facts about one method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodFacts {
    pub name: String,
    pub declaring_class: String,
    pub return_type: String,
    pub parameters: Vec<ParameterFacts>,
    pub exceptions: Vec<String>,
    pub is_public: bool,
    pub is_static: bool,
    pub is_final: bool,
    pub web_method: Option<WebMethodFacts>,
    pub web_result: Option<WebResultFacts>,
    /// `@XmlList` on the return value.
    pub is_list_result: bool,
    pub oneway: bool,
    pub request_wrapper: Option<WrapperFacts>,
    pub response_wrapper: Option<WrapperFacts>,
    pub action: Option<ActionFacts>,
    pub soap_binding: Option<SoapBindingFacts>,
}

impl MethodFacts {
    pub fn new(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_class: String::new(),
            return_type: return_type.into(),
            parameters: Vec::new(),
            exceptions: Vec::new(),
            is_public: true,
            is_static: false,
            is_final: false,
            web_method: None,
            web_result: None,
            is_list_result: false,
            oneway: false,
            request_wrapper: None,
            response_wrapper: None,
            action: None,
            soap_binding: None,
        }
    }

    pub fn param(mut self, type_name: impl Into<String>) -> Self {
        self.parameters.push(ParameterFacts::new(type_name));
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterFacts) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn throws(mut self, exception: impl Into<String>) -> Self {
        self.exceptions.push(exception.into());
        self
    }

    pub fn with_web_method(self, web_method: WebMethodFacts) -> Self {
        Self { web_method: Some(web_method), ..self }
    }

    pub fn with_operation_name(self, operation_name: &str) -> Self {
        let mut web_method = self.web_method.clone().unwrap_or_default();
        web_method.operation_name = Some(operation_name.to_string());
        self.with_web_method(web_method)
    }

    pub fn excluded(self) -> Self {
        let mut web_method = self.web_method.clone().unwrap_or_default();
        web_method.exclude = true;
        self.with_web_method(web_method)
    }

    pub fn with_web_result(self, web_result: WebResultFacts) -> Self {
        Self { web_result: Some(web_result), ..self }
    }

    pub fn list_result(self) -> Self {
        Self { is_list_result: true, ..self }
    }

    pub fn one_way(self) -> Self {
        Self { oneway: true, ..self }
    }

    pub fn with_request_wrapper(self, wrapper: WrapperFacts) -> Self {
        Self { request_wrapper: Some(wrapper), ..self }
    }

    pub fn with_response_wrapper(self, wrapper: WrapperFacts) -> Self {
        Self { response_wrapper: Some(wrapper), ..self }
    }

    pub fn with_action(self, action: ActionFacts) -> Self {
        Self { action: Some(action), ..self }
    }

    pub fn with_soap_binding(self, soap_binding: SoapBindingFacts) -> Self {
        Self { soap_binding: Some(soap_binding), ..self }
    }

    pub fn non_public(self) -> Self {
        Self { is_public: false, ..self }
    }

    pub fn static_method(self) -> Self {
        Self { is_static: true, ..self }
    }

    pub fn final_method(self) -> Self {
        Self { is_final: true, ..self }
    }

    /// `false` for `void` (or unspecified) return types.
    pub fn has_result(&self) -> bool {
        !self.return_type.is_empty() && self.return_type != java::VOID
    }

    pub fn parameter_types(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.type_name.as_str()).collect()
    }

    /// Client-side asynchronous variant: returns a polling or callback future.
    pub fn is_async(&self) -> bool {
        self.return_type.contains(java::RESPONSE) || self.return_type.contains(java::FUTURE)
    }

    /// Same name and same ordered parameter types.
    pub fn same_signature(&self, other: &MethodFacts) -> bool {
        self.name == other.name && self.parameter_types() == other.parameter_types()
    }

    pub fn is_constructor(&self) -> bool {
        self.name == java::CONSTRUCTOR
    }

    /// Methods every class inherits from `java.lang.Object`.
    pub fn is_object_method(&self) -> bool {
        self.declaring_class == java::OBJECT
    }
}

/// The description-builder composite of one class or interface.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFacts {
    pub class_name: String,
    pub is_interface: bool,
    pub is_public: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub has_default_constructor: bool,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub web_service: Option<WebServiceFacts>,
    pub web_service_provider: Option<WebServiceProviderFacts>,
    pub web_service_client: Option<WebServiceClientFacts>,
    pub service_mode: Option<ServiceModeFacts>,
    pub soap_binding: Option<SoapBindingFacts>,
    pub binding_type: Option<BindingTypeFacts>,
    pub web_fault: Option<WebFaultFacts>,
    pub handler_chain: Option<HandlerChainFacts>,
    pub features: Vec<Feature>,
    pub methods: Vec<Arc<MethodFacts>>,
    /// Definition attached to the composite instead of a location.
    pub wsdl_definition: Option<Arc<Definition>>,
    pub preferred_port: Option<QName>,
    pub properties: BTreeMap<String, String>,
    /// Built for the server (provider) side.
    pub is_service_provider: bool,
}

impl ClassFacts {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            is_interface: false,
            is_public: true,
            is_abstract: false,
            is_final: false,
            has_default_constructor: true,
            super_class: None,
            interfaces: Vec::new(),
            web_service: None,
            web_service_provider: None,
            web_service_client: None,
            service_mode: None,
            soap_binding: None,
            binding_type: None,
            web_fault: None,
            handler_chain: None,
            features: Vec::new(),
            methods: Vec::new(),
            wsdl_definition: None,
            preferred_port: None,
            properties: BTreeMap::new(),
            is_service_provider: false,
        }
    }

    /// Composite of an interface, usually an SEI.
    pub fn interface(class_name: impl Into<String>) -> Self {
        Self { is_interface: true, is_abstract: true, has_default_constructor: false, ..Self::new(class_name) }
    }

    pub fn with_web_service(self, web_service: WebServiceFacts) -> Self {
        Self { web_service: Some(web_service), ..self }
    }

    pub fn with_web_service_provider(self, provider: WebServiceProviderFacts) -> Self {
        Self { web_service_provider: Some(provider), ..self }
    }

    pub fn with_web_service_client(self, client: WebServiceClientFacts) -> Self {
        Self { web_service_client: Some(client), ..self }
    }

    pub fn with_service_mode(self, mode: ServiceMode) -> Self {
        Self { service_mode: Some(ServiceModeFacts { mode }), ..self }
    }

    pub fn with_soap_binding(self, soap_binding: SoapBindingFacts) -> Self {
        Self { soap_binding: Some(soap_binding), ..self }
    }

    pub fn with_binding_type(self, value: impl Into<String>) -> Self {
        Self { binding_type: Some(BindingTypeFacts { value: Some(value.into()) }), ..self }
    }

    pub fn with_web_fault(self, web_fault: WebFaultFacts) -> Self {
        Self { web_fault: Some(web_fault), ..self }
    }

    pub fn with_handler_chain(self, handler_chain: HandlerChainFacts) -> Self {
        Self { handler_chain: Some(handler_chain), ..self }
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    /// Adds a method declared by this class.
    pub fn with_method(mut self, method: MethodFacts) -> Self {
        let method = if method.declaring_class.is_empty() {
            MethodFacts { declaring_class: self.class_name.clone(), ..method }
        } else {
            method
        };
        self.methods.push(Arc::new(method));
        self
    }

    pub fn extends(self, super_class: impl Into<String>) -> Self {
        Self { super_class: Some(super_class.into()), ..self }
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn abstract_class(self) -> Self {
        Self { is_abstract: true, ..self }
    }

    pub fn final_class(self) -> Self {
        Self { is_final: true, ..self }
    }

    pub fn non_public(self) -> Self {
        Self { is_public: false, ..self }
    }

    pub fn without_default_constructor(self) -> Self {
        Self { has_default_constructor: false, ..self }
    }

    pub fn with_wsdl_definition(self, definition: Arc<Definition>) -> Self {
        Self { wsdl_definition: Some(definition), ..self }
    }

    pub fn with_preferred_port(self, port: QName) -> Self {
        Self { preferred_port: Some(port), ..self }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn service_provider(self) -> Self {
        Self { is_service_provider: true, ..self }
    }

    /// The `endpointInterface` member of `@WebService`, if set.
    pub fn endpoint_interface(&self) -> Option<&str> {
        self.web_service.as_ref()?.endpoint_interface.as_deref().filter(|v| !v.is_empty())
    }

    /// Implements `javax.xml.ws.Provider`.
    pub fn is_provider(&self) -> bool {
        self.interfaces.iter().any(|i| raw_type_name(i) == java::PROVIDER)
    }

    /// Type argument of the implemented `Provider<T>`.
    pub fn provider_type(&self) -> Option<&str> {
        self.interfaces
            .iter()
            .find(|i| raw_type_name(i) == java::PROVIDER)
            .and_then(|i| generic_argument(i))
    }

    /// MTOM feature, if declared.
    pub fn mtom_feature(&self) -> Option<(bool, u32)> {
        self.features.iter().find_map(|f| match f {
            Feature::Mtom { enabled, threshold } => Some((*enabled, *threshold)),
            _ => None,
        })
    }

    pub fn respect_binding_feature(&self) -> Option<bool> {
        self.features.iter().find_map(|f| match f {
            Feature::RespectBinding { enabled } => Some(*enabled),
            _ => None,
        })
    }

    pub fn addressing_feature(&self) -> Option<(bool, bool)> {
        self.features.iter().find_map(|f| match f {
            Feature::Addressing { enabled, required } => Some((*enabled, *required)),
            _ => None,
        })
    }

    pub fn method(&self, name: &str) -> Option<&Arc<MethodFacts>> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Any method carrying `@WebMethod`.
    pub fn has_web_method_annotations(&self) -> bool {
        self.methods.iter().any(|m| m.web_method.is_some())
    }
}

/// Composites indexed by class name.
#[derive(Debug, Clone, Default)]
pub struct FactsCatalog {
    classes: BTreeMap<String, Arc<ClassFacts>>,
}

impl FactsCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, class: ClassFacts) -> Self {
        self.insert(class);
        self
    }

    pub fn insert(&mut self, class: ClassFacts) -> Arc<ClassFacts> {
        let class = Arc::new(class);
        self.classes.insert(class.class_name.clone(), class.clone());
        class
    }

    pub fn get(&self, class_name: &str) -> Option<&Arc<ClassFacts>> {
        self.classes.get(raw_type_name(class_name))
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.get(class_name).is_some()
    }

    pub fn classes(&self) -> impl Iterator<Item = &Arc<ClassFacts>> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Superclasses found in the catalog, nearest first.
    pub fn superclasses(&self, class: &ClassFacts) -> Vec<Arc<ClassFacts>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([class.class_name.clone()]);
        let mut next = class.super_class.clone();
        while let Some(name) = next {
            let Some(parent) = self.get(&name) else { break };
            if !seen.insert(parent.class_name.clone()) {
                break;
            }
            next = parent.super_class.clone();
            chain.push(parent.clone());
        }
        chain
    }

    /// Every super-interface reachable from a class or interface, breadth first.
    pub fn super_interfaces(&self, class: &ClassFacts) -> Vec<Arc<ClassFacts>> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([class.class_name.clone()]);
        let mut queue: VecDeque<String> = class.interfaces.iter().cloned().collect();
        while let Some(name) = queue.pop_front() {
            let Some(interface) = self.get(&name) else { continue };
            if !seen.insert(interface.class_name.clone()) {
                continue;
            }
            queue.extend(interface.interfaces.iter().cloned());
            found.push(interface.clone());
        }
        found
    }
}

/// Caller-scoped overrides, for example from a client deployment descriptor.
///
/// Any value set here wins over the corresponding annotation for the caller
/// that supplied it. Unset values fall back to the annotations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseComposite {
    pub preferred_port: Option<QName>,
    pub web_service_client: Option<WebServiceClientFacts>,
    pub mtom_enabled: Option<bool>,
    pub handler_chain: Option<HandlerChainFacts>,
    pub features: Vec<Feature>,
    pub properties: BTreeMap<String, String>,
}

impl SparseComposite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preferred_port(self, port: QName) -> Self {
        Self { preferred_port: Some(port), ..self }
    }

    pub fn with_wsdl_location(self, location: impl Into<String>) -> Self {
        let mut client = self.web_service_client.clone().unwrap_or_default();
        client.wsdl_location = Some(location.into());
        Self { web_service_client: Some(client), ..self }
    }

    pub fn with_mtom_enabled(self, enabled: bool) -> Self {
        Self { mtom_enabled: Some(enabled), ..self }
    }

    pub fn with_handler_chain(self, handler_chain: HandlerChainFacts) -> Self {
        Self { handler_chain: Some(handler_chain), ..self }
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    pub fn with_service_ref_name(self, name: impl Into<String>) -> Self {
        self.with_property(SERVICE_REF_NAME, name)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn service_ref_name(&self) -> Option<&str> {
        self.properties.get(SERVICE_REF_NAME).map(String::as_str)
    }

    /// Overriding WSDL location, when present and not empty.
    pub fn wsdl_location(&self) -> Option<&str> {
        self.web_service_client.as_ref()?.wsdl_location.as_deref().filter(|l| !l.is_empty())
    }

    /// MTOM override: the explicit flag, else an MTOM feature.
    pub fn mtom_override(&self) -> Option<bool> {
        self.mtom_enabled.or_else(|| {
            self.features.iter().find_map(|f| match f {
                Feature::Mtom { enabled, .. } => Some(*enabled),
                _ => None,
            })
        })
    }

    /// Folds `other` into `self`; values set in `other` win.
    pub fn merge(&mut self, other: SparseComposite) {
        if other.preferred_port.is_some() {
            self.preferred_port = other.preferred_port;
        }
        if other.web_service_client.is_some() {
            self.web_service_client = other.web_service_client;
        }
        if other.mtom_enabled.is_some() {
            self.mtom_enabled = other.mtom_enabled;
        }
        if other.handler_chain.is_some() {
            self.handler_chain = other.handler_chain;
        }
        if !other.features.is_empty() {
            self.features = other.features;
        }
        self.properties.extend(other.properties);
    }
}
