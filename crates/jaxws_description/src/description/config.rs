//! Runtime configuration and configuration scopes.
//!
//! A [`DescriptionConfig`] carries the switches that change how descriptions are
//! built. A [`ConfigurationScope`] wraps one configuration with an identity: it is
//! the configuration/session key that partitions the description registry, owns
//! the lock serializing lookup-or-create and eviction within the scope, and the
//! table of service-client names registered by endpoints built under it.

use std::{
    collections::{BTreeMap, HashSet},
    env,
    path::PathBuf,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

#[cfg(feature = "description_tracing")]
use tracing::debug;

use crate::description::infrastructure::wsdl::locator::UriResolver;

pub const ENV_LEGACY_WEB_METHOD_RULES: &str = "JAXWS_USE_LEGACY_WEB_METHOD_RULES";
pub const ENV_REDUCE_WSDL_MEMORY: &str = "JAXWS_REDUCE_WSDL_MEMORY_CACHE";
pub const ENV_GENERATE_WSDL: &str = "JAXWS_GENERATE_WSDL";

/// Switches applied while building descriptions.
#[derive(Debug, Clone)]
pub struct DescriptionConfig {
    /// Expose methods of implicit SEIs under the legacy `@WebMethod` rules.
    pub legacy_web_method_rules: bool,
    /// Do not pin WSDL definitions in memory; reload them on demand.
    pub reduce_wsdl_memory: bool,
    /// Synthesize a WSDL document for SOAP 1.1 endpoints built without one.
    pub generate_wsdl: bool,
    /// Catalog consulted first when resolving WSDL locations.
    pub catalog: Option<Arc<dyn UriResolver>>,
    /// Directories searched for relative WSDL locations.
    pub resource_roots: Vec<PathBuf>,
    /// In-memory documents addressable by name, searched before the resource roots.
    pub resources: BTreeMap<String, Arc<str>>,
}

impl Default for DescriptionConfig {
    fn default() -> Self {
        Self {
            legacy_web_method_rules: false,
            reduce_wsdl_memory: false,
            generate_wsdl: true,
            catalog: None,
            resource_roots: Vec::new(),
            resources: BTreeMap::new(),
        }
    }
}

impl DescriptionConfig {
    /// Reads the `JAXWS_*` environment switches on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = env_flag(ENV_LEGACY_WEB_METHOD_RULES) {
            config.legacy_web_method_rules = value;
        }
        if let Some(value) = env_flag(ENV_REDUCE_WSDL_MEMORY) {
            config.reduce_wsdl_memory = value;
        }
        if let Some(value) = env_flag(ENV_GENERATE_WSDL) {
            config.generate_wsdl = value;
        }
        config
    }

    pub fn with_legacy_web_method_rules(self, legacy_web_method_rules: bool) -> Self {
        Self { legacy_web_method_rules, ..self }
    }

    pub fn with_reduce_wsdl_memory(self, reduce_wsdl_memory: bool) -> Self {
        Self { reduce_wsdl_memory, ..self }
    }

    pub fn with_generate_wsdl(self, generate_wsdl: bool) -> Self {
        Self { generate_wsdl, ..self }
    }

    pub fn with_catalog(self, catalog: Arc<dyn UriResolver>) -> Self {
        Self { catalog: Some(catalog), ..self }
    }

    pub fn with_resource_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.resource_roots.push(root.into());
        self
    }

    /// Registers an in-memory document under a resource name.
    pub fn with_resource(mut self, name: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        self.resources.insert(name.into(), content.into());
        self
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    parse_flag(&value)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Process-unique identity of a configuration scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct ClientNameTable {
    names: HashSet<String>,
    counter: u64,
}

/// Configuration/session key partitioning the description registry.
#[derive(Debug)]
pub struct ConfigurationScope {
    id: ScopeId,
    config: DescriptionConfig,
    registry_lock: Mutex<()>,
    client_names: Mutex<ClientNameTable>,
}

impl ConfigurationScope {
    pub fn new(config: DescriptionConfig) -> Arc<Self> {
        Arc::new(Self {
            id: ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed)),
            config,
            registry_lock: Mutex::new(()),
            client_names: Mutex::new(ClientNameTable::default()),
        })
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn config(&self) -> &DescriptionConfig {
        &self.config
    }

    /// Lock held across registry lookup-or-create and eviction for this scope.
    pub(crate) fn lock_registry(&self) -> MutexGuard<'_, ()> {
        self.registry_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a service-client name, appending `_<n>` when it is already taken.
    pub(crate) fn register_client_name(&self, base: &str) -> String {
        let mut table = self.client_names.lock().unwrap_or_else(PoisonError::into_inner);
        let mut name = base.to_string();
        while table.names.contains(&name) {
            table.counter += 1;
            name = format!("{}_{}", base, table.counter);
        }
        table.names.insert(name.clone());
        #[cfg(feature = "description_tracing")]
        debug!("[scope-{:?}] registered client name {}", self.id, name);
        name
    }

    pub(crate) fn release_client_name(&self, name: &str) {
        let mut table = self.client_names.lock().unwrap_or_else(PoisonError::into_inner);
        table.names.remove(name);
    }

    pub fn is_client_name_registered(&self, name: &str) -> bool {
        let table = self.client_names.lock().unwrap_or_else(PoisonError::into_inner);
        table.names.contains(name)
    }
}
