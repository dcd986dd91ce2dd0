//! Planner agent.
//!
//! Turns a workflow request into an ordered task list: pre-execution
//! validation, the operation itself, post-execution validation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use custmesh_protocols::error::AgentError;
use custmesh_protocols::message::{AgentMessage, MessageResponse};
use custmesh_protocols::types::Metadata;
use custmesh_protocols::workflow::{AgentKind, Operation, Task, ValidationReport};

use crate::context::ContextStore;
use crate::payload::{nested_parameters, operation_from, target_from, to_metadata};

use super::{Agent, AgentCore, TaskPayload};

/// Planner agent - analyzes requests and generates executable task lists.
pub struct PlannerAgent {
    core: AgentCore,
}

impl PlannerAgent {
    pub fn new(context: Arc<ContextStore>) -> Self {
        let core = AgentCore::new(AgentKind::Planner, context);
        info!(agent_id = core.agent_id(), "planner agent initialized");
        Self { core }
    }

    /// Generate the complete task plan for a workflow.
    ///
    /// Always exactly three tasks, in execution order. Records a
    /// `task_count` metadata update into the context store.
    pub fn plan_workflow(
        &self,
        payload: &Metadata,
        workflow_id: &str,
    ) -> Result<Metadata, AgentError> {
        let operation = operation_from(payload)
            .ok_or_else(|| AgentError::InvalidPayload("operation is required".to_string()))?;
        let parameters = nested_parameters(payload);
        let target = target_from(payload);

        info!(workflow_id, %operation, "planning workflow");

        let pre_validation = Task::new(
            format!("Validate {operation} request"),
            AgentKind::Validator,
        )
        .with_priority(1)
        .with_parameters(Metadata::from([
            ("operation".to_string(), json!(operation)),
            ("validation_type".to_string(), json!("pre_execution")),
        ]));

        let mut execution_params = Metadata::from([("operation".to_string(), json!(operation))]);
        if let Some(target) = &target {
            execution_params.insert("target_customer_id".to_string(), json!(target));
        }
        execution_params.extend(parameters);
        let execution = Task::new(
            format!("Execute {operation} operation"),
            AgentKind::Executor,
        )
        .with_priority(2)
        .with_parameters(execution_params);

        let post_validation = Task::new(
            format!("Validate {operation} result"),
            AgentKind::Validator,
        )
        .with_priority(3)
        .with_parameters(Metadata::from([
            ("operation".to_string(), json!(operation)),
            ("validation_type".to_string(), json!("post_execution")),
        ]));

        let tasks = vec![pre_validation, execution, post_validation];
        self.core.context().update_context(
            workflow_id,
            Some("plan_workflow"),
            Some(Metadata::from([(
                "task_count".to_string(),
                json!(tasks.len()),
            )])),
        );

        Ok(Metadata::from([
            ("tasks".to_string(), json!(tasks)),
            ("estimated_duration".to_string(), json!(tasks.len() * 5)),
            ("complexity".to_string(), json!("medium")),
        ]))
    }

    /// Structural feasibility check on an incoming request.
    pub fn validate_request(&self, payload: &Metadata, workflow_id: &str) -> Metadata {
        let operation = operation_from(payload);
        let parameters = nested_parameters(payload);

        let mut report = ValidationReport::ok();
        if operation == Some(Operation::Update) && parameters.is_empty() {
            report.fail("Update operation requires parameters");
        }
        if operation.is_some_and(|op| op.requires_target()) && target_from(payload).is_none() {
            report.fail("Customer ID required for this operation");
        }

        info!(
            workflow_id,
            valid = report.valid,
            errors = report.errors.len(),
            "request validation complete"
        );
        to_metadata(json!(report))
    }

    /// Per-operation step outline for a planning task.
    fn step_outline(operation: Operation) -> Vec<serde_json::Value> {
        let steps: &[(&str, &str)] = match operation {
            Operation::Create => &[
                ("validate_customer_data", "Validate customer information"),
                ("check_duplicate", "Check for duplicate customer"),
                ("insert_customer", "Insert new customer record"),
            ],
            Operation::Update => &[
                ("fetch_current_data", "Retrieve current customer data"),
                ("validate_updates", "Validate update parameters"),
                ("apply_updates", "Apply updates to customer record"),
            ],
            Operation::Delete => &[
                ("verify_customer_exists", "Verify customer exists"),
                ("check_dependencies", "Check for dependent records"),
                ("delete_customer", "Delete customer record"),
            ],
            Operation::Query => &[
                ("build_query", "Build database query"),
                ("execute_query", "Execute query and retrieve data"),
                ("format_results", "Format and return results"),
            ],
        };
        steps
            .iter()
            .enumerate()
            .map(|(i, (action, description))| {
                json!({"step": i + 1, "action": action, "description": description})
            })
            .collect()
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn process_message(&self, message: AgentMessage) -> MessageResponse {
        debug!(agent_id = self.core.agent_id(), action = %message.action, "processing message");
        self.core.record(message.clone());

        let result = match message.action.as_str() {
            "plan_workflow" => self.plan_workflow(&message.payload, &message.workflow_id),
            "validate_request" => Ok(self.validate_request(&message.payload, &message.workflow_id)),
            other => Err(AgentError::UnknownAction(other.to_string())),
        };

        match result {
            Ok(result) => MessageResponse::ok(message.message_id, result),
            Err(e) => MessageResponse::fail(message.message_id, e.to_string()),
        }
    }

    async fn execute_task(&self, payload: &TaskPayload) -> Result<Metadata, AgentError> {
        let _busy = self.core.busy();
        debug!(agent_id = self.core.agent_id(), description = %payload.description, "executing planning task");

        let operation = operation_from(&payload.parameters)
            .ok_or_else(|| AgentError::InvalidPayload("operation is required".to_string()))?;
        let plan = Self::step_outline(operation);

        Ok(Metadata::from([
            ("status".to_string(), json!("success")),
            ("plan".to_string(), json!(plan)),
            (
                "message".to_string(),
                json!(format!("Generated plan for {operation} operation")),
            ),
        ]))
    }
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod tests;
