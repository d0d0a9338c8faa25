//! The description model.
//!
//! - **graph**: the arena of service, endpoint, interface and operation nodes
//! - **service**: published descriptions, caller scopes and construction
//! - **update**: the endpoint update state machine
//! - **endpoint**, **interface**, **operation**, **parameter**: borrowing views
//!   resolving attributes against the graph
//! - **fault**: fault and attachment descriptions

pub mod endpoint;
pub mod fault;
pub mod graph;
pub mod interface;
pub mod operation;
pub mod parameter;
pub mod service;
pub mod update;

pub use endpoint::{EndpointDescriptor, GeneratedDefinition};
pub use fault::{AttachmentDescription, AttachmentInfo, AttachmentType, FaultDescriptor};
pub use graph::{CallerKey, DescriptionGraph, EndpointId, InterfaceId, OperationId, RoutingKey};
pub use interface::EndpointInterfaceDescriptor;
pub use operation::OperationDescriptor;
pub use parameter::ParameterDescriptor;
pub use service::{CallerScope, ServiceDescriptor, ServiceRequest};
pub use update::{EndpointUpdate, UpdateKind};
