//! Infrastructure shared by the description model: qualified names and binding
//! identifiers, and access to WSDL documents.

pub mod naming;
pub mod wsdl;
