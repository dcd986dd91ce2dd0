//! # Custmesh Engine
//!
//! The orchestration core: workflow lifecycle management, task
//! sequencing, inter-agent payload composition, and the shared context
//! store agents consult for workflow history.
//!
//! ## Components
//!
//! - [`ContextStore`] - lock-protected per-workflow action log + metadata
//! - [`agent`] - the planner/executor/validator agents and their shared
//!   [`agent::AgentCore`]
//! - [`OrchestrationEngine`] - owns the workflow table and drives each
//!   workflow's task sequence in a background loop

pub mod agent;
pub mod context;
pub mod engine;
pub mod payload;

pub use agent::{Agent, AgentCore, AgentStatus, AgentStatusReport, TaskPayload};
pub use agent::{ExecutorAgent, PlannerAgent, ValidatorAgent};
pub use context::{ContextEntry, ContextStore};
pub use engine::OrchestrationEngine;
