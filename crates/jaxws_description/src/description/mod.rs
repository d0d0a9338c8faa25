//! Description module.
//!
//! ## Fact sources
//!
//! Every attribute of the model is resolved from up to three sources: the WSDL
//! contract, the annotation facts of the SEI or implementation class, and the
//! sparse overrides supplied by one caller. The winner differs per attribute:
//! wire-shape attributes (binding, style, SOAP action) prefer the WSDL, naming
//! attributes prefer the annotations and caller-scoped attributes (MTOM,
//! handler chain, preferred port) prefer the override. Defaults follow JSR-181.
//!
//! ## Components
//!
//! - **facts**: annotation records, class composites and the precedence resolver
//! - **core**: the description graph, its descriptor views and the update state machine
//! - **infrastructure**: qualified names, binding identifiers and WSDL access
//! - **validation**: implementation/SEI cross-validation
//! - **services**: the registry sharing descriptions between callers
//! - **config** and **error**: runtime configuration and the error type

pub mod config;
pub mod core;
pub mod error;
pub mod facts;
pub mod infrastructure;
pub mod services;
pub mod validation;
