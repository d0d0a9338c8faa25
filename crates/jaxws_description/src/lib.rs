//! Web-service metadata description layer.
//!
//! This crate builds a unified, queryable in-memory model of a web service from
//! three fact sources: a WSDL contract, annotation facts collected from a service
//! endpoint interface (SEI) or an implementation class, and caller-scoped
//! "sparse" overrides such as deployment-descriptor settings. The model describes
//! the service, its ports (endpoints), the operations each endpoint exposes and the
//! parameters, faults and attachments of every operation.
//!
//! Consumers (message dispatchers, marshalling layers, client proxy factories)
//! query the model both at setup time and on every invocation, so descriptions are
//! cached in a [`DescriptionRegistry`] and shared between callers through
//! reference-counted handles.
//!
//! ## Layout
//!
//! - [`description::facts`]: raw facts and the per-attribute precedence resolver
//! - [`description::core`]: the description graph and its descriptor views
//! - [`description::infrastructure`]: qualified names, binding identifiers and WSDL access
//! - [`description::validation`]: implementation/SEI cross-validation
//! - [`description::services`]: the description registry
//!
//! [`DescriptionRegistry`]: description::services::registry::DescriptionRegistry

#[cfg(test)]
pub mod tests;

pub mod description;

#[cfg(feature = "description_tracing")]
pub mod description_tracing {
    use std::sync::Once;
    use tracing_subscriber::{EnvFilter, fmt};

    static INIT: Once = Once::new();

    /// Initialize tracing for tests
    /// This sets up a tracing subscriber that will display logs during test execution.
    /// Call this at the beginning of tests that need to see tracing output.
    pub fn init() {
        INIT.call_once(|| {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));

            fmt()
                .with_target(false)
                .with_test_writer()
                .with_env_filter(filter)
                .init();
        });
    }
}
