//! Inter-agent message envelope.
//!
//! Every exchange between the engine and an agent, or between two agents,
//! uses the same request/response pair: [`AgentMessage`] in,
//! [`MessageResponse`] out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Id, Metadata};

/// Types of messages agents can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Response,
    Notification,
    Error,
    #[serde(rename = "ack")]
    Acknowledgement,
}

/// Message priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for MessagePriority {
    fn default() -> Self {
        MessagePriority::Medium
    }
}

/// Snapshot of a workflow's context attached to an outgoing message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSnapshot {
    #[serde(default)]
    pub previous_actions: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// The standard inter-agent message envelope.
///
/// Ephemeral: constructed per call and kept only in the sending agent's
/// in-memory history, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub message_id: Id,
    pub message_type: MessageType,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub priority: MessagePriority,

    pub sender_id: Id,
    pub sender_type: String,

    /// Absent receiver ID means broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_type: Option<String>,

    /// Associated workflow, always present.
    pub workflow_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Id>,

    /// Action the receiver should perform.
    pub action: String,
    #[serde(default)]
    pub payload: Metadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<Id>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

fn default_status() -> String {
    "pending".to_string()
}

impl AgentMessage {
    /// Create a request message with a generated ID.
    pub fn request(
        sender_id: impl Into<Id>,
        sender_type: impl Into<String>,
        workflow_id: impl Into<Id>,
        action: impl Into<String>,
    ) -> Self {
        Self::new(MessageType::Request, sender_id, sender_type, workflow_id, action)
    }

    /// Create a message of the given type with a generated ID.
    pub fn new(
        message_type: MessageType,
        sender_id: impl Into<Id>,
        sender_type: impl Into<String>,
        workflow_id: impl Into<Id>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            message_type,
            timestamp: Utc::now(),
            priority: MessagePriority::default(),
            sender_id: sender_id.into(),
            sender_type: sender_type.into(),
            receiver_id: None,
            receiver_type: None,
            workflow_id: workflow_id.into(),
            task_id: None,
            action: action.into(),
            payload: Metadata::new(),
            context: None,
            in_reply_to: None,
            status: default_status(),
            error: None,
            metadata: Metadata::new(),
        }
    }

    /// Address the message to a specific agent.
    pub fn with_receiver(mut self, id: impl Into<Id>, kind: impl Into<String>) -> Self {
        self.receiver_id = Some(id.into());
        self.receiver_type = Some(kind.into());
        self
    }

    /// Set the payload map.
    pub fn with_payload(mut self, payload: Metadata) -> Self {
        self.payload = payload;
        self
    }

    /// Link to the task this message concerns.
    pub fn with_task(mut self, task_id: impl Into<Id>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Mark as a reply to an earlier message.
    pub fn with_in_reply_to(mut self, message_id: impl Into<Id>) -> Self {
        self.in_reply_to = Some(message_id.into());
        self
    }

    /// Attach a context snapshot.
    pub fn with_context(mut self, context: ContextSnapshot) -> Self {
        self.context = Some(context);
        self
    }

    /// Set priority.
    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Terminal value of one request/response exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    /// Echoes the originating message identifier.
    pub message_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl MessageResponse {
    /// A successful response carrying a result map.
    pub fn ok(message_id: impl Into<Id>, result: Metadata) -> Self {
        Self {
            success: true,
            message_id: message_id.into(),
            result: Some(result),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// A failure response carrying a human-readable error.
    pub fn fail(message_id: impl Into<Id>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: message_id.into(),
            result: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
