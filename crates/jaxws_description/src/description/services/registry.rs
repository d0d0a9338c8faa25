//! Description registry.
//!
//! Client descriptions are shared between callers asking for the same
//! (service qname, WSDL URL, service class, configuration scope, service
//! reference name). Lookups and evictions of one configuration scope run under
//! that scope's registry lock, so a description is never evicted while another
//! caller is being handed the same instance. Distinct scopes do not contend.
//!
//! Every successful lookup increments the entry's use count and returns a
//! [`ServiceHandle`]. Releasing the handle (explicitly or on drop) decrements
//! the count; the last release evicts the entry and releases every endpoint.
//!
//! Server descriptions are built on demand by [`create_server_description`] and
//! [`create_server_descriptions`]; they are neither cached nor ref-counted.

use std::{ops::Deref, sync::Arc};

use dashmap::DashMap;
#[cfg(feature = "description_tracing")]
use tracing::{debug, info, warn};

use crate::description::{
    config::{ConfigurationScope, ScopeId},
    core::{
        graph::CallerKey,
        service::{CallerScope, ServiceDescriptor, ServiceRequest},
    },
    error::DescriptionError,
    facts::FactsCatalog,
    infrastructure::naming::QName,
};

/// Identity of a cached client description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub service_qname: QName,
    pub wsdl_url: Option<String>,
    pub service_class: Option<String>,
    pub scope: ScopeId,
    pub service_ref_name: Option<String>,
}

impl ServiceKey {
    pub fn new(scope: ScopeId, request: &ServiceRequest) -> Self {
        Self {
            service_qname: request.service_qname.clone(),
            wsdl_url: request.wsdl_url().map(str::to_string),
            service_class: request.service_class.as_ref().map(|c| c.class_name.clone()),
            scope,
            service_ref_name: request.sparse.as_ref().and_then(|s| s.service_ref_name()).map(str::to_string),
        }
    }
}

#[derive(Debug)]
struct RegistryEntry {
    service: Arc<ServiceDescriptor>,
    use_count: usize,
}

/// Shared cache of client descriptions.
#[derive(Debug, Clone, Default)]
pub struct DescriptionRegistry {
    entries: Arc<DashMap<ServiceKey, RegistryEntry>>,
}

impl DescriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached description for `request`, building it on a miss.
    ///
    /// On a hit the request's sparse composite is merged for `caller`.
    pub fn get_or_create(
        &self,
        scope: &Arc<ConfigurationScope>,
        request: ServiceRequest,
        caller: Option<&CallerScope>,
    ) -> Result<ServiceHandle, DescriptionError> {
        let key = ServiceKey::new(scope.id(), &request);
        let _guard = scope.lock_registry();

        let cached = self.entries.get(&key).map(|entry| entry.service.clone());
        let service = match cached {
            Some(service) => {
                #[cfg(feature = "description_tracing")]
                debug!("[registry] hit {}", key.service_qname);
                if let (Some(caller), Some(sparse)) = (caller, request.sparse) {
                    service.merge_sparse(caller, sparse)?;
                }
                service
            }
            None => {
                #[cfg(feature = "description_tracing")]
                debug!("[registry] miss {}, building description", key.service_qname);
                let service = ServiceDescriptor::client(scope, &request, caller)?;
                self.entries.insert(key.clone(), RegistryEntry { service: service.clone(), use_count: 0 });
                service
            }
        };

        if let Some(mut entry) = self.entries.get_mut(&key) {
            entry.use_count += 1;
            #[cfg(feature = "description_tracing")]
            debug!("[registry] {} use count {}", key.service_qname, entry.use_count);
        }
        Ok(ServiceHandle { registry: self.clone(), key, service, caller: caller.map(CallerScope::key), released: false })
    }

    /// Decrement-and-maybe-evict for one handle. Returns `true` when the entry
    /// was evicted.
    fn release(
        &self,
        key: &ServiceKey,
        service: &Arc<ServiceDescriptor>,
        caller: Option<CallerKey>,
    ) -> Result<bool, DescriptionError> {
        let scope = service.scope().clone();
        let _guard = scope.lock_registry();

        let remaining = match self.entries.get_mut(key) {
            Some(mut entry) if Arc::ptr_eq(&entry.service, service) => {
                entry.use_count = entry.use_count.saturating_sub(1);
                entry.use_count
            }
            _ => return Err(DescriptionError::AlreadyReleased(service.service_qname().to_string())),
        };

        if remaining > 0 {
            if let Some(caller) = caller {
                service.release_resources(Some(caller));
            }
            #[cfg(feature = "description_tracing")]
            debug!("[registry] {} still in use ({})", key.service_qname, remaining);
            return Ok(false);
        }

        self.entries.remove(key);
        service.release_resources(None);
        #[cfg(feature = "description_tracing")]
        info!("[registry] evicted {}", key.service_qname);
        Ok(true)
    }

    pub fn use_count(&self, key: &ServiceKey) -> usize {
        self.entries.get(key).map(|e| e.use_count).unwrap_or_default()
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Cached description, without acquiring it.
    pub fn get(&self, key: &ServiceKey) -> Option<Arc<ServiceDescriptor>> {
        self.entries.get(key).map(|e| e.service.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts every entry and releases its endpoints.
    ///
    /// Not safe while requests using the evicted descriptions are in flight.
    pub fn clear_cache(&self) {
        let cached: Vec<(ServiceKey, Arc<ServiceDescriptor>)> =
            self.entries.iter().map(|e| (e.key().clone(), e.service.clone())).collect();
        for (key, service) in cached {
            let _guard = service.scope().lock_registry();
            if self.entries.remove(&key).is_some() {
                service.release_resources(None);
            }
        }
        #[cfg(feature = "description_tracing")]
        info!("[registry] cache cleared");
    }

    /// Evicts every entry of one configuration scope.
    ///
    /// Not safe while requests using the evicted descriptions are in flight.
    pub fn clear_cache_for_scope(&self, scope: &ConfigurationScope) {
        let _guard = scope.lock_registry();
        let keys: Vec<ServiceKey> =
            self.entries.iter().filter(|e| e.key().scope == scope.id()).map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(&key) {
                entry.service.release_resources(None);
            }
        }
        #[cfg(feature = "description_tracing")]
        info!("[registry] cache cleared for scope {:?}", scope.id());
    }
}

/// Counted reference to a cached description.
#[derive(Debug)]
pub struct ServiceHandle {
    registry: DescriptionRegistry,
    key: ServiceKey,
    service: Arc<ServiceDescriptor>,
    caller: Option<CallerKey>,
    released: bool,
}

impl ServiceHandle {
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub fn service(&self) -> &Arc<ServiceDescriptor> {
        &self.service
    }

    /// Releases this reference. Returns `true` when it was the last one and the
    /// description was evicted.
    pub fn release(mut self) -> Result<bool, DescriptionError> {
        self.released = true;
        self.registry.release(&self.key, &self.service, self.caller)
    }
}

impl Deref for ServiceHandle {
    type Target = Arc<ServiceDescriptor>;

    fn deref(&self) -> &Self::Target {
        &self.service
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(_e) = self.registry.release(&self.key, &self.service, self.caller) {
                #[cfg(feature = "description_tracing")]
                warn!("[registry] dropped handle of {} not released: {}", self.key.service_qname, _e);
            }
        }
    }
}

/// Builds the server description of one implementation class.
pub fn create_server_description(
    catalog: Arc<FactsCatalog>,
    implementation: &str,
    scope: &Arc<ConfigurationScope>,
) -> Result<Arc<ServiceDescriptor>, DescriptionError> {
    ServiceDescriptor::server(catalog, implementation, scope)
}

/// Builds one server description per implementation class in `catalog`.
pub fn create_server_descriptions(
    catalog: Arc<FactsCatalog>,
    scope: &Arc<ConfigurationScope>,
) -> Result<Vec<Arc<ServiceDescriptor>>, DescriptionError> {
    let implementations: Vec<String> = catalog
        .classes()
        .filter(|c| !c.is_interface && (c.web_service.is_some() || c.web_service_provider.is_some()))
        .map(|c| c.class_name.clone())
        .collect();
    implementations
        .iter()
        .map(|implementation| ServiceDescriptor::server(catalog.clone(), implementation, scope))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{config::DescriptionConfig, facts::SparseComposite};

    fn request() -> ServiceRequest {
        ServiceRequest::new(QName::new("http://example.com", "Calc"))
    }

    #[test]
    fn unit_registry_key_includes_ref_name() {
        let scope = ConfigurationScope::new(DescriptionConfig::default());
        let plain = ServiceKey::new(scope.id(), &request());
        let named = ServiceKey::new(
            scope.id(),
            &request().with_sparse(SparseComposite::new().with_service_ref_name("service/calc")),
        );
        assert_ne!(plain, named);
        assert_eq!(named.service_ref_name.as_deref(), Some("service/calc"));
        assert_eq!(plain.wsdl_url, None);
    }

    #[test]
    fn unit_registry_hit_returns_same_instance() {
        let registry = DescriptionRegistry::new();
        let scope = ConfigurationScope::new(DescriptionConfig::default());
        let first = registry.get_or_create(&scope, request(), None).unwrap();
        let second = registry.get_or_create(&scope, request(), None).unwrap();
        assert!(Arc::ptr_eq(first.service(), second.service()));
        assert_eq!(registry.use_count(first.key()), 2);
    }

    #[test]
    fn unit_registry_last_release_evicts() {
        let registry = DescriptionRegistry::new();
        let scope = ConfigurationScope::new(DescriptionConfig::default());
        let first = registry.get_or_create(&scope, request(), None).unwrap();
        let second = registry.get_or_create(&scope, request(), None).unwrap();
        let key = first.key().clone();
        let service = first.service().clone();
        assert_eq!(first.release(), Ok(false));
        assert!(!service.is_released());
        assert_eq!(second.release(), Ok(true));
        assert!(service.is_released());
        assert!(!registry.contains(&key));
    }

    #[test]
    fn unit_registry_drop_releases() {
        let registry = DescriptionRegistry::new();
        let scope = ConfigurationScope::new(DescriptionConfig::default());
        let key = {
            let handle = registry.get_or_create(&scope, request(), None).unwrap();
            handle.key().clone()
        };
        assert!(!registry.contains(&key));
        assert!(registry.is_empty());
    }

    #[test]
    fn unit_registry_scopes_are_partitioned() {
        let registry = DescriptionRegistry::new();
        let first_scope = ConfigurationScope::new(DescriptionConfig::default());
        let second_scope = ConfigurationScope::new(DescriptionConfig::default());
        let first = registry.get_or_create(&first_scope, request(), None).unwrap();
        let second = registry.get_or_create(&second_scope, request(), None).unwrap();
        assert!(!Arc::ptr_eq(first.service(), second.service()));
        registry.clear_cache_for_scope(&first_scope);
        assert!(!registry.contains(first.key()));
        assert!(registry.contains(second.key()));
        assert!(first.service().is_released());
        assert_eq!(
            first.release(),
            Err(DescriptionError::AlreadyReleased("{http://example.com}Calc".into()))
        );
        registry.clear_cache();
        assert!(registry.is_empty());
        assert!(second.service().is_released());
    }

    #[test]
    fn unit_registry_drop_after_eviction_leaves_new_entry() {
        let registry = DescriptionRegistry::new();
        let scope = ConfigurationScope::new(DescriptionConfig::default());
        let stale = registry.get_or_create(&scope, request(), None).unwrap();
        registry.clear_cache_for_scope(&scope);
        let fresh = registry.get_or_create(&scope, request(), None).unwrap();
        assert!(!Arc::ptr_eq(stale.service(), fresh.service()));
        drop(stale);
        assert_eq!(registry.use_count(fresh.key()), 1);
        assert!(!fresh.service().is_released());
    }
}
