//! Services built on top of the description model.
//!
//! - **Registry**: shares client descriptions between callers through
//!   reference-counted handles and builds server descriptions on demand

pub mod registry;

pub use registry::{
    DescriptionRegistry, ServiceHandle, ServiceKey, create_server_description, create_server_descriptions,
};
