//! WSDL access: the in-memory model, the XML reader, the location resolution
//! chain and the SOAP 1.1 generator used when no contract is available.

pub mod generator;
pub mod locator;
pub mod model;
pub mod reader;

pub use model::Definition;
