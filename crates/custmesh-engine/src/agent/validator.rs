//! Validator agent.
//!
//! Pure functions over payload and result maps - no attached resources,
//! no database access. Runs before the executor (request checks) and
//! after it (result checks).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use custmesh_protocols::error::AgentError;
use custmesh_protocols::message::{AgentMessage, MessageResponse};
use custmesh_protocols::types::Metadata;
use custmesh_protocols::workflow::{AgentKind, Operation, ValidationReport};

use crate::context::ContextStore;
use crate::payload::{nested_parameters, operation_from, target_from, to_metadata};

use super::{Agent, AgentCore, TaskPayload};

/// Validator agent - validates requests and results.
pub struct ValidatorAgent {
    core: AgentCore,
}

impl ValidatorAgent {
    pub fn new(context: Arc<ContextStore>) -> Self {
        let core = AgentCore::new(AgentKind::Validator, context);
        info!(agent_id = core.agent_id(), "validator agent initialized");
        Self { core }
    }

    /// Pre-execution validation of the incoming request payload.
    pub fn validate_request(&self, payload: &Metadata) -> ValidationReport {
        let operation = operation_from(payload);
        let parameters = nested_parameters(payload);
        let target = target_from(payload);

        let mut report = ValidationReport::ok();

        if operation.is_some_and(|op| op.requires_target()) && target.is_none() {
            report.fail("Missing target_customer_id for update/delete operation");
        }
        if operation == Some(Operation::Update) && parameters.is_empty() {
            report.fail("Update operation requires parameters");
        }

        // Basic sanity checks on well-known fields.
        if let Some(value) = parameters.get("credit_limit") {
            match parse_number(value) {
                None => report.fail("credit_limit must be a number"),
                Some(limit) if limit < 0.0 => report.fail("credit_limit cannot be negative"),
                Some(_) => {}
            }
        }

        report
    }

    /// Post-execution validation of a prior step's result.
    ///
    /// An explicit `success: false` marker is invalid and surfaces the
    /// embedded error; anything else is accepted.
    pub fn validate_result(&self, payload: &Metadata) -> ValidationReport {
        let result = payload.get("result").and_then(|v| v.as_object());

        let mut report = ValidationReport::ok();
        if let Some(result) = result {
            if result.get("success") == Some(&json!(false)) {
                let error = result
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Execution reported failure");
                report.fail(error);
            }
        }
        report
    }
}

fn parse_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl Agent for ValidatorAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn process_message(&self, message: AgentMessage) -> MessageResponse {
        debug!(agent_id = self.core.agent_id(), action = %message.action, "processing message");
        self.core.record(message.clone());

        let result = match message.action.as_str() {
            "validate_request" => Ok(self.validate_request(&message.payload)),
            "validate_result" => Ok(self.validate_result(&message.payload)),
            other => Err(AgentError::UnknownAction(other.to_string())),
        };

        match result {
            Ok(report) => MessageResponse::ok(message.message_id, to_metadata(json!(report))),
            Err(e) => MessageResponse::fail(message.message_id, e.to_string()),
        }
    }

    async fn execute_task(&self, payload: &TaskPayload) -> Result<Metadata, AgentError> {
        let _busy = self.core.busy();
        debug!(agent_id = self.core.agent_id(), description = %payload.description, "executing validation task");

        let validation_type = payload
            .parameters
            .get("validation_type")
            .or_else(|| payload.parameters.get("type"))
            .and_then(|v| v.as_str());

        let report = match validation_type {
            Some("pre_execution") => self.validate_request(&payload.parameters),
            Some("post_execution") => self.validate_result(&payload.parameters),
            // Unknown phases get a light-weight pass.
            _ => ValidationReport::ok(),
        };

        Ok(Metadata::from([
            ("status".to_string(), json!("success")),
            ("result".to_string(), json!(report)),
        ]))
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
