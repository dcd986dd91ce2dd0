//! Workflow and task data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Id, Metadata};

/// Workflow execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Created, not yet executing.
    Pending,
    /// Execution loop is driving tasks.
    Running,
    /// All tasks completed.
    Completed,
    /// Aborted by a task failure or planning error.
    Failed,
    /// Reserved status value; no transition currently produces it.
    Cancelled,
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        WorkflowStatus::Pending
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Individual task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

/// The closed set of agent types a task can target.
///
/// Dispatch on this enum is an exhaustive match in the engine; adding a
/// new agent type is a compile-time-checked extension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Planner,
    Executor,
    Validator,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentKind::Planner => "planner",
            AgentKind::Executor => "executor",
            AgentKind::Validator => "validator",
        };
        f.write_str(s)
    }
}

/// Customer-record operation a workflow carries out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Query,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Query => "query",
        };
        f.write_str(s)
    }
}

impl Operation {
    /// Operations that mutate an existing record and therefore need a target.
    pub fn requires_target(&self) -> bool {
        matches!(self, Operation::Update | Operation::Delete)
    }
}

/// One unit of work within a workflow, assigned to exactly one agent type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Id,
    pub description: String,
    #[serde(rename = "agent_type")]
    pub agent_kind: AgentKind,
    #[serde(default)]
    pub status: TaskStatus,
    /// Bounded 1..=10. Informational only - never consulted for ordering.
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub parameters: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_priority() -> u8 {
    1
}

impl Task {
    /// Create a new pending task with a generated ID.
    pub fn new(description: impl Into<String>, agent_kind: AgentKind) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            description: description.into(),
            agent_kind,
            status: TaskStatus::Pending,
            priority: default_priority(),
            parameters: Metadata::new(),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Set priority (clamped to 1..=10).
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 10);
        self
    }

    /// Set the parameter map.
    pub fn with_parameters(mut self, parameters: Metadata) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Workflow-level operation context propagated into every task payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_customer_id: Option<String>,
    #[serde(default)]
    pub parameters: Metadata,
}

/// Complete mutable state of one workflow run.
///
/// Owned exclusively by the orchestration engine; callers only ever see
/// read-only snapshots derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Always a valid index into `tasks`, or `tasks.len()` post-completion.
    #[serde(default)]
    pub current_task_index: usize,
    pub context: OperationContext,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowState {
    /// Create a new pending workflow with a generated ID.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        context: OperationContext,
    ) -> Self {
        Self {
            workflow_id: Uuid::new_v4().to_string(),
            name: name.into(),
            description,
            status: WorkflowStatus::Pending,
            tasks: Vec::new(),
            current_task_index: 0,
            context,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Whether the workflow counts against the concurrency ceiling.
    pub fn is_active(&self) -> bool {
        matches!(self.status, WorkflowStatus::Pending | WorkflowStatus::Running)
    }

    /// Number of completed tasks.
    pub fn tasks_completed(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count()
    }

    /// Completion percentage, 0 when no tasks exist yet.
    pub fn progress(&self) -> f32 {
        if self.tasks.is_empty() {
            0.0
        } else {
            (self.tasks_completed() as f32 / self.tasks.len() as f32) * 100.0
        }
    }

    /// The task at the cursor, absent once the cursor passed the last task.
    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.get(self.current_task_index)
    }
}

/// Request to create a new workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_customer_id: Option<String>,
    #[serde(default)]
    pub parameters: Metadata,
}

/// Response after workflow creation or a status check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResponse {
    /// Absent when creation was rejected before a workflow existed.
    pub workflow_id: Option<Id>,
    pub status: WorkflowStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<Task>,
    /// Completion percentage 0..=100.
    pub progress: f32,
}

/// Read-only projection of a workflow for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_id: Id,
    pub name: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub tasks_total: usize,
    pub tasks_completed: usize,
}

/// Structured outcome of a validation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// A report that starts out valid.
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record an error, marking the report invalid.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    /// Record a non-fatal warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
