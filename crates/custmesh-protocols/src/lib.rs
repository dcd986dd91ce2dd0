//! # Custmesh Protocols
//!
//! Data model and trait definitions for the custmesh orchestration core.
//! Contains the shared vocabulary of the system - no engine or agent
//! implementations live here.
//!
//! ## Contents
//!
//! - [`AgentMessage`] / [`MessageResponse`] - the inter-agent envelope
//! - [`WorkflowState`] / [`Task`] - workflow and task data model
//! - [`Customer`] - the customer-record entity agents operate on
//! - [`CustomerStore`] - the persistence collaborator trait

pub mod customer;
pub mod error;
pub mod message;
pub mod store;
pub mod types;
pub mod workflow;

pub use customer::{Customer, CustomerFieldKind, CustomerStatus, SubscriptionPlan};
pub use error::{AgentError, StoreError};
pub use message::{AgentMessage, ContextSnapshot, MessagePriority, MessageResponse, MessageType};
pub use store::{apply_update, CustomerStore, MemoryCustomerStore};
pub use types::{Id, Metadata};
pub use workflow::{
    AgentKind, Operation, OperationContext, Task, TaskStatus, ValidationReport, WorkflowRequest,
    WorkflowResponse, WorkflowState, WorkflowStatus, WorkflowSummary,
};
