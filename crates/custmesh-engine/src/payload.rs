//! Inter-agent payload composition.
//!
//! Before dispatching a task, the engine folds the workflow-level
//! operation context into the task's own parameter map. Workflow-level
//! values win on collision, with two exceptions: `operation` and
//! `target_customer_id` are only filled in from the workflow when the
//! task itself does not carry them.

use custmesh_protocols::types::Metadata;
use custmesh_protocols::workflow::{Operation, OperationContext, Task};

use crate::agent::TaskPayload;

/// Compose the payload for one task.
///
/// `prior_result` is the inner result map of the most recent completed
/// executor task; it is threaded in under `result` so post-execution
/// validation has something to check.
pub fn compose_task_payload(
    workflow_id: &str,
    task: &Task,
    context: &OperationContext,
    prior_result: Option<&Metadata>,
) -> TaskPayload {
    let mut parameters = task.parameters.clone();

    // Task-level operation/target take precedence when present.
    if !parameters.contains_key("operation") {
        parameters.insert(
            "operation".to_string(),
            serde_json::json!(context.operation),
        );
    }
    if !parameters.contains_key("target_customer_id") {
        if let Some(target) = &context.target_customer_id {
            parameters.insert(
                "target_customer_id".to_string(),
                serde_json::Value::String(target.clone()),
            );
        }
    }

    // The workflow-level parameter map always wins.
    parameters.insert(
        "parameters".to_string(),
        serde_json::json!(context.parameters),
    );

    if let Some(result) = prior_result {
        parameters.insert("result".to_string(), serde_json::json!(result));
    }

    TaskPayload {
        workflow_id: workflow_id.to_string(),
        task_id: task.task_id.clone(),
        description: task.description.clone(),
        parameters,
    }
}

/// Read the operation out of a free-form parameter map.
pub fn operation_from(parameters: &Metadata) -> Option<Operation> {
    parameters
        .get("operation")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Read the target customer identifier, accepting either key the
/// callers have historically used.
pub fn target_from(parameters: &Metadata) -> Option<String> {
    parameters
        .get("target_customer_id")
        .or_else(|| parameters.get("customer_id"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// The nested caller-supplied parameter map, empty if absent.
pub fn nested_parameters(parameters: &Metadata) -> Metadata {
    parameters
        .get("parameters")
        .and_then(|v| v.as_object())
        .map(|obj| obj.clone().into_iter().collect())
        .unwrap_or_default()
}

/// Convert a JSON object value into a metadata map.
///
/// Non-object values collapse to an empty map; callers that need to
/// distinguish check the shape first.
pub fn to_metadata(value: serde_json::Value) -> Metadata {
    match value {
        serde_json::Value::Object(obj) => obj.into_iter().collect(),
        _ => Metadata::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custmesh_protocols::workflow::AgentKind;
    use serde_json::json;

    fn context() -> OperationContext {
        OperationContext {
            operation: Operation::Update,
            target_customer_id: Some("CUST001".to_string()),
            parameters: Metadata::from([("credit_limit".to_string(), json!(500))]),
        }
    }

    #[test]
    fn test_compose_fills_missing_keys_from_workflow() {
        let task = Task::new("Validate update request", AgentKind::Validator);
        let payload = compose_task_payload("wf-1", &task, &context(), None);

        assert_eq!(payload.workflow_id, "wf-1");
        assert_eq!(payload.parameters["operation"], json!("update"));
        assert_eq!(payload.parameters["target_customer_id"], json!("CUST001"));
        assert_eq!(payload.parameters["parameters"]["credit_limit"], json!(500));
    }

    #[test]
    fn test_compose_task_operation_wins() {
        let task = Task::new("Execute delete operation", AgentKind::Executor).with_parameters(
            Metadata::from([
                ("operation".to_string(), json!("delete")),
                ("target_customer_id".to_string(), json!("CUST777")),
            ]),
        );
        let payload = compose_task_payload("wf-1", &task, &context(), None);

        // Task-level operation and target survive the merge.
        assert_eq!(payload.parameters["operation"], json!("delete"));
        assert_eq!(payload.parameters["target_customer_id"], json!("CUST777"));
    }

    #[test]
    fn test_compose_workflow_parameters_win() {
        let task = Task::new("t", AgentKind::Executor).with_parameters(Metadata::from([(
            "parameters".to_string(),
            json!({"credit_limit": 1}),
        )]));
        let payload = compose_task_payload("wf-1", &task, &context(), None);
        assert_eq!(payload.parameters["parameters"]["credit_limit"], json!(500));
    }

    #[test]
    fn test_compose_threads_prior_result() {
        let task = Task::new("Validate update result", AgentKind::Validator);
        let prior = Metadata::from([("success".to_string(), json!(true))]);
        let payload = compose_task_payload("wf-1", &task, &context(), Some(&prior));
        assert_eq!(payload.parameters["result"]["success"], json!(true));
    }

    #[test]
    fn test_operation_from_unknown_string() {
        let params = Metadata::from([("operation".to_string(), json!("merge"))]);
        assert_eq!(operation_from(&params), None);
    }

    #[test]
    fn test_target_from_fallback_key() {
        let params = Metadata::from([("customer_id".to_string(), json!("CUST002"))]);
        assert_eq!(target_from(&params).as_deref(), Some("CUST002"));
    }

    #[test]
    fn test_nested_parameters_absent() {
        assert!(nested_parameters(&Metadata::new()).is_empty());
    }
}
