//! Agent capability layer.
//!
//! All three agents share [`AgentCore`]: identity, an idle/busy status
//! flag, an in-memory message history, and a handle to the context
//! store. The [`Agent`] trait is the uniform dispatch contract the
//! engine drives.

mod executor;
mod planner;
mod validator;

pub use executor::ExecutorAgent;
pub use planner::PlannerAgent;
pub use validator::ValidatorAgent;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use custmesh_protocols::error::AgentError;
use custmesh_protocols::message::{AgentMessage, MessageResponse, MessageType};
use custmesh_protocols::types::{Id, Metadata};
use custmesh_protocols::workflow::AgentKind;

use crate::context::ContextStore;

/// Agent availability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Busy,
}

/// Per-agent status projection for callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatusReport {
    pub agent_id: Id,
    #[serde(rename = "type")]
    pub kind: AgentKind,
    pub status: AgentStatus,
}

/// Unit of work handed to `execute_task`, already composed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayload {
    pub workflow_id: Id,
    pub task_id: Id,
    pub description: String,
    pub parameters: Metadata,
}

/// Uniform dispatch contract all agents honor.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Shared agent state.
    fn core(&self) -> &AgentCore;

    /// Action-name-driven dispatch. Handler errors never escape this
    /// boundary; they fold into a `success=false` response.
    async fn process_message(&self, message: AgentMessage) -> MessageResponse;

    /// Synchronous unit of work. Errors propagate to the engine, which
    /// owns abort semantics.
    async fn execute_task(&self, payload: &TaskPayload) -> Result<Metadata, AgentError>;
}

/// State shared by every agent variant.
pub struct AgentCore {
    agent_id: Id,
    kind: AgentKind,
    status: RwLock<AgentStatus>,
    history: Mutex<Vec<AgentMessage>>,
    context: Arc<ContextStore>,
}

impl AgentCore {
    /// Create a core with a `<kind>_<8-hex>` identifier.
    pub fn new(kind: AgentKind, context: Arc<ContextStore>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            agent_id: format!("{kind}_{}", &suffix[..8]),
            kind,
            status: RwLock::new(AgentStatus::Idle),
            history: Mutex::new(Vec::new()),
            context,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn status(&self) -> AgentStatus {
        *self.status.read()
    }

    pub fn status_report(&self) -> AgentStatusReport {
        AgentStatusReport {
            agent_id: self.agent_id.clone(),
            kind: self.kind,
            status: self.status(),
        }
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    /// Mark the agent busy until the returned guard drops.
    ///
    /// The flag is restored on every exit path, not best-effort.
    pub fn busy(&self) -> BusyGuard<'_> {
        *self.status.write() = AgentStatus::Busy;
        BusyGuard { status: &self.status }
    }

    /// Append a message to the in-memory history.
    pub fn record(&self, message: AgentMessage) {
        self.history.lock().push(message);
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Create a context-aware outgoing message.
    ///
    /// Stamps the message with the workflow's current context snapshot,
    /// appends `action` to that workflow's action log, and records the
    /// message in this agent's history.
    pub fn create_message(
        &self,
        message_type: MessageType,
        receiver: Option<(&str, &str)>,
        workflow_id: &str,
        action: &str,
        payload: Metadata,
        metadata: Option<Metadata>,
    ) -> AgentMessage {
        let entry = self.context.get_context(workflow_id);
        let mut snapshot = entry.snapshot();
        if let Some(extra) = &metadata {
            snapshot.metadata.extend(extra.clone());
        }

        let mut message = AgentMessage::new(
            message_type,
            self.agent_id.clone(),
            self.kind.to_string(),
            workflow_id,
            action,
        )
        .with_payload(payload)
        .with_context(snapshot);
        if let Some((id, kind)) = receiver {
            message = message.with_receiver(id, kind);
        }
        if let Some(extra) = metadata.clone() {
            message.metadata = extra;
        }

        self.context.update_context(workflow_id, Some(action), metadata);
        self.record(message.clone());
        message
    }
}

/// RAII guard restoring an agent to idle.
pub struct BusyGuard<'a> {
    status: &'a RwLock<AgentStatus>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        *self.status.write() = AgentStatus::Idle;
    }
}
