//! WSDL location resolution.
//!
//! A WSDL location is resolved through a fixed chain:
//!
//! 1. the configured catalog ([`UriResolver`]), which may rewrite the location;
//! 2. in-memory resources registered on the configuration, then the resource
//!    roots (the classpath analogue) for relative locations;
//! 3. absolute `file:` URLs, and `http:`/`https:` URLs fetched over the network;
//! 4. a plain filesystem path.
//!
//! Any other scheme fails with a read error, and so does a remote fetch that
//! cannot connect or answers with a non-success status.

use std::{
    collections::HashMap,
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

#[cfg(feature = "description_tracing")]
use tracing::debug;

use crate::description::{
    config::DescriptionConfig,
    error::DescriptionError,
    infrastructure::wsdl::{model::Definition, reader::read_definition_from_str},
};

const REMOTE_CONNECT_TIMEOUT_SECS: u64 = 10;
const REMOTE_TIMEOUT_SECS: u64 = 30;

/// Pluggable catalog consulted before any other resolution step.
pub trait UriResolver: Debug + Send + Sync {
    /// Maps a system identifier to another location.
    fn resolve_system(&self, system_id: &str) -> Option<String>;

    /// Maps a URI to another location.
    fn resolve_uri(&self, _uri: &str) -> Option<String> {
        None
    }
}

/// Catalog backed by a fixed table of system identifier rewrites.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    system: HashMap<String, String>,
    uri: HashMap<String, String>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(mut self, system_id: impl Into<String>, location: impl Into<String>) -> Self {
        self.system.insert(system_id.into(), location.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>, location: impl Into<String>) -> Self {
        self.uri.insert(uri.into(), location.into());
        self
    }
}

impl UriResolver for StaticCatalog {
    fn resolve_system(&self, system_id: &str) -> Option<String> {
        self.system.get(system_id).cloned()
    }

    fn resolve_uri(&self, uri: &str) -> Option<String> {
        self.uri.get(uri).cloned()
    }
}

/// Where a resolved WSDL document lives.
#[derive(Debug, Clone, PartialEq)]
pub enum WsdlSource {
    /// In-memory document registered on the configuration.
    Resource { name: String, content: Arc<str> },
    /// Document on the filesystem.
    File(PathBuf),
    /// Document served at an `http:` or `https:` URL.
    Remote(String),
}

/// Outcome of the resolution chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWsdl {
    /// Location after catalog rewriting.
    pub location: String,
    pub source: WsdlSource,
}

/// Resolves and loads WSDL documents for one configuration.
#[derive(Debug, Clone, Copy)]
pub struct WsdlLocator<'a> {
    config: &'a DescriptionConfig,
}

impl<'a> WsdlLocator<'a> {
    pub fn new(config: &'a DescriptionConfig) -> Self {
        Self { config }
    }

    /// Runs the resolution chain without reading the document.
    pub fn resolve(&self, location: &str) -> Result<ResolvedWsdl, DescriptionError> {
        if location.trim().is_empty() {
            return Err(DescriptionError::UnresolvableWsdlLocation(location.to_string()));
        }
        let location = self.catalog_lookup(location);

        if let Some(content) = self.config.resources.get(&location) {
            #[cfg(feature = "description_tracing")]
            debug!("[wsdl-locator] {} resolved as in-memory resource", location);
            return Ok(ResolvedWsdl {
                source: WsdlSource::Resource { name: location.clone(), content: content.clone() },
                location,
            });
        }

        if let Some((scheme, rest)) = split_scheme(&location) {
            if scheme.eq_ignore_ascii_case("file") {
                let path = PathBuf::from(rest.strip_prefix("//").unwrap_or(rest));
                if path.is_file() {
                    #[cfg(feature = "description_tracing")]
                    debug!("[wsdl-locator] {} resolved as file URL", location);
                    return Ok(ResolvedWsdl { location, source: WsdlSource::File(path) });
                }
                return Err(DescriptionError::UnresolvableWsdlLocation(location));
            }
            if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") {
                #[cfg(feature = "description_tracing")]
                debug!("[wsdl-locator] {} resolved as remote URL", location);
                let url = location.clone();
                return Ok(ResolvedWsdl { location, source: WsdlSource::Remote(url) });
            }
            let reason = format!("unsupported URL scheme {}", scheme);
            return Err(DescriptionError::WsdlRead(location, reason));
        }

        let relative = Path::new(&location);
        if relative.is_relative() {
            for root in &self.config.resource_roots {
                let candidate = root.join(relative);
                if candidate.is_file() {
                    #[cfg(feature = "description_tracing")]
                    debug!("[wsdl-locator] {} resolved under resource root {:?}", location, root);
                    return Ok(ResolvedWsdl { location, source: WsdlSource::File(candidate) });
                }
            }
        }

        if relative.is_file() {
            #[cfg(feature = "description_tracing")]
            debug!("[wsdl-locator] {} resolved as filesystem path", location);
            let path = relative.to_path_buf();
            return Ok(ResolvedWsdl { location, source: WsdlSource::File(path) });
        }

        Err(DescriptionError::UnresolvableWsdlLocation(location))
    }

    /// Resolves and parses a WSDL document.
    pub fn load(&self, location: &str) -> Result<Arc<Definition>, DescriptionError> {
        let resolved = self.resolve(location)?;
        let definition = match &resolved.source {
            WsdlSource::Resource { content, .. } => read_definition_from_str(content, &resolved.location)?,
            WsdlSource::File(path) => {
                let content = fs::read_to_string(path)
                    .map_err(|e| DescriptionError::WsdlRead(resolved.location.clone(), e.to_string()))?;
                read_definition_from_str(&content, &resolved.location)?
            }
            WsdlSource::Remote(url) => {
                let content = fetch(url).map_err(|e| DescriptionError::WsdlRead(resolved.location.clone(), e))?;
                read_definition_from_str(&content, &resolved.location)?
            }
        };
        Ok(Arc::new(definition))
    }

    fn catalog_lookup(&self, location: &str) -> String {
        let Some(catalog) = &self.config.catalog else {
            return location.to_string();
        };
        match catalog.resolve_system(location).or_else(|| catalog.resolve_uri(location)) {
            Some(mapped) => {
                #[cfg(feature = "description_tracing")]
                debug!("[wsdl-locator] catalog mapped {} to {}", location, mapped);
                mapped
            }
            None => location.to_string(),
        }
    }
}

/// Fetches a remote document, failing on connection errors and non-success statuses.
fn fetch(url: &str) -> Result<String, String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| e.to_string())?;
    let mut builder = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(REMOTE_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REMOTE_TIMEOUT_SECS));
    // Loopback hosts are never reached through a proxy.
    if matches!(parsed.host_str(), Some("localhost" | "127.0.0.1" | "[::1]")) {
        builder = builder.no_proxy();
    }
    let client = builder.build().map_err(|e| e.to_string())?;
    let response = client.get(parsed).send().map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP status {}", status.as_u16()));
    }
    #[cfg(feature = "description_tracing")]
    debug!("[wsdl-locator] fetched {} ({})", url, status);
    response.text().map_err(|e| e.to_string())
}

/// Splits `scheme:rest`, ignoring single-letter schemes (Windows drive letters).
fn split_scheme(location: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = location.split_once(':')?;
    let valid = scheme.len() > 1
        && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}
