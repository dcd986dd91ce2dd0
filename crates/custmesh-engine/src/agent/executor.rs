//! Executor agent.
//!
//! Performs the actual customer-record mutation through an attached
//! store session. Implements the generic field-coercion contract: any
//! payload key naming a mutable customer column is coerced to that
//! column's kind and applied in one atomic update.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use custmesh_protocols::customer::{Customer, CustomerFieldKind};
use custmesh_protocols::error::AgentError;
use custmesh_protocols::message::{AgentMessage, MessageResponse, MessageType};
use custmesh_protocols::store::CustomerStore;
use custmesh_protocols::types::Metadata;
use custmesh_protocols::workflow::{AgentKind, Operation};

use crate::context::ContextStore;
use crate::payload::{operation_from, target_from};

use super::{Agent, AgentCore, TaskPayload};

/// Executor agent - drives customer store operations.
pub struct ExecutorAgent {
    core: AgentCore,
    /// Set by the engine before each workflow's execution loop begins.
    session: RwLock<Option<Arc<dyn CustomerStore>>>,
}

impl ExecutorAgent {
    pub fn new(context: Arc<ContextStore>) -> Self {
        let core = AgentCore::new(AgentKind::Executor, context);
        info!(agent_id = core.agent_id(), "executor agent initialized");
        Self {
            core,
            session: RwLock::new(None),
        }
    }

    /// Attach the store session used for subsequent tasks.
    pub fn attach_session(&self, store: Arc<dyn CustomerStore>) {
        *self.session.write() = Some(store);
    }

    fn session(&self) -> Result<Arc<dyn CustomerStore>, AgentError> {
        self.session.read().clone().ok_or(AgentError::NoSession)
    }

    /// Single-entity update with typed field coercion.
    async fn update_customer(
        &self,
        store: &Arc<dyn CustomerStore>,
        parameters: &Metadata,
    ) -> Result<Metadata, AgentError> {
        let customer_id =
            target_from(parameters).ok_or(AgentError::MissingTarget(Operation::Update))?;

        let customer = store
            .fetch(&customer_id)
            .await?
            .ok_or_else(|| AgentError::CustomerNotFound(customer_id.clone()))?;

        // Coerce every payload field that names a mutable column;
        // everything else in the payload is routing data, not an update.
        let mut fields = Metadata::new();
        for (name, value) in parameters {
            let Some(kind) = Customer::field_kind(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            fields.insert(name.clone(), coerce_field(name, kind, value)?);
        }
        if fields.is_empty() {
            return Err(AgentError::EmptyUpdate);
        }

        let mut updated_fields: Vec<String> = fields.keys().cloned().collect();
        updated_fields.sort();

        store.update_fields(&customer_id, fields).await?;
        info!(customer_id = %customer.mcp_id, fields = ?updated_fields, "updated customer");

        Ok(Metadata::from([
            ("operation".to_string(), json!("update")),
            ("customer_id".to_string(), json!(customer_id)),
            ("updated_fields".to_string(), json!(updated_fields)),
            ("success".to_string(), json!(true)),
        ]))
    }

    async fn run_operation(&self, parameters: &Metadata) -> Result<Metadata, AgentError> {
        let store = self.session()?;
        let operation = operation_from(parameters)
            .ok_or_else(|| AgentError::InvalidPayload("operation is required".to_string()))?;

        match operation {
            Operation::Update => self.update_customer(&store, parameters).await,
            other => Err(AgentError::UnsupportedOperation(other)),
        }
    }
}

/// Coerce a payload value to a column kind.
fn coerce_field(
    field: &str,
    kind: CustomerFieldKind,
    value: &Value,
) -> Result<Value, AgentError> {
    let coercion = |message: &str| AgentError::Coercion {
        field: field.to_string(),
        message: message.to_string(),
    };

    match kind {
        CustomerFieldKind::Text => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(coercion("expected a string")),
        },
        CustomerFieldKind::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(|i| json!(i))
                .ok_or_else(|| coercion("expected an integer")),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|i| json!(i))
                .map_err(|_| coercion("expected an integer")),
            _ => Err(coercion("expected an integer")),
        },
        CustomerFieldKind::Float => match value {
            Value::Number(n) => n
                .as_f64()
                .map(|f| json!(f))
                .ok_or_else(|| coercion("expected a number")),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(|f| json!(f))
                .map_err(|_| coercion("expected a number")),
            _ => Err(coercion("expected a number")),
        },
        CustomerFieldKind::Json => match value {
            Value::Object(_) => Ok(value.clone()),
            // String-encoded structured data is parsed before assignment.
            Value::String(s) => serde_json::from_str::<Value>(s)
                .ok()
                .filter(Value::is_object)
                .ok_or_else(|| coercion("expected a JSON object")),
            _ => Err(coercion("expected a JSON object")),
        },
    }
}

#[async_trait]
impl Agent for ExecutorAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn process_message(&self, message: AgentMessage) -> MessageResponse {
        debug!(agent_id = self.core.agent_id(), action = %message.action, "processing message");
        self.core.record(message.clone());

        let result = match message.action.as_str() {
            "execute_operation" => self.run_operation(&message.payload).await,
            other => Err(AgentError::UnknownAction(other.to_string())),
        };

        match result {
            Ok(result) => MessageResponse::ok(message.message_id, result),
            Err(e) => MessageResponse::fail(message.message_id, e.to_string()),
        }
    }

    async fn execute_task(&self, payload: &TaskPayload) -> Result<Metadata, AgentError> {
        let _busy = self.core.busy();
        debug!(agent_id = self.core.agent_id(), description = %payload.description, "executing task");

        match self.run_operation(&payload.parameters).await {
            Ok(inner) => Ok(Metadata::from([
                ("status".to_string(), json!("success")),
                ("result".to_string(), json!(inner)),
                (
                    "message".to_string(),
                    json!("Successfully executed update operation"),
                ),
            ])),
            Err(e) => {
                let customer_id =
                    target_from(&payload.parameters).unwrap_or_else(|| "unknown".to_string());
                warn!(
                    workflow_id = %payload.workflow_id,
                    customer_id,
                    error = %e,
                    "task execution failed"
                );
                // Record the failure into the workflow's context before
                // re-raising to the engine.
                self.core.create_message(
                    MessageType::Error,
                    None,
                    &payload.workflow_id,
                    &format!("failed_update_{customer_id}"),
                    Metadata::from([("error".to_string(), json!(e.to_string()))]),
                    Some(Metadata::from([(
                        "last_error".to_string(),
                        json!(e.to_string()),
                    )])),
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
