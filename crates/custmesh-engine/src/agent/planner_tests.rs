use super::*;
use custmesh_protocols::message::MessageType;
use custmesh_protocols::workflow::TaskStatus;

fn planner() -> (PlannerAgent, Arc<ContextStore>) {
    let context = Arc::new(ContextStore::new());
    (PlannerAgent::new(Arc::clone(&context)), context)
}

fn update_payload() -> Metadata {
    Metadata::from([
        ("operation".to_string(), json!("update")),
        ("target_customer_id".to_string(), json!("CUST001")),
        ("parameters".to_string(), json!({"credit_limit": 500})),
    ])
}

#[test]
fn test_plan_produces_three_ordered_tasks() {
    let (planner, _) = planner();
    let result = planner.plan_workflow(&update_payload(), "wf-1").unwrap();

    let tasks: Vec<Task> = serde_json::from_value(result["tasks"].clone()).unwrap();
    assert_eq!(tasks.len(), 3);

    assert_eq!(tasks[0].agent_kind, AgentKind::Validator);
    assert_eq!(tasks[0].priority, 1);
    assert_eq!(tasks[0].parameters["validation_type"], json!("pre_execution"));

    assert_eq!(tasks[1].agent_kind, AgentKind::Executor);
    assert_eq!(tasks[1].priority, 2);
    assert_eq!(tasks[1].parameters["operation"], json!("update"));
    assert_eq!(tasks[1].parameters["target_customer_id"], json!("CUST001"));
    // Caller parameters are spread into the execution task.
    assert_eq!(tasks[1].parameters["credit_limit"], json!(500));

    assert_eq!(tasks[2].agent_kind, AgentKind::Validator);
    assert_eq!(tasks[2].priority, 3);
    assert_eq!(tasks[2].parameters["validation_type"], json!("post_execution"));

    for task in &tasks {
        assert_eq!(task.status, TaskStatus::Pending);
    }
}

#[test]
fn test_plan_records_task_count_metadata() {
    let (planner, context) = planner();
    planner.plan_workflow(&update_payload(), "wf-1").unwrap();

    let entry = context.get_context("wf-1");
    assert_eq!(entry.metadata["task_count"], json!(3));
    assert!(entry.previous_actions.contains(&"plan_workflow".to_string()));
}

#[test]
fn test_plan_requires_operation() {
    let (planner, _) = planner();
    let err = planner.plan_workflow(&Metadata::new(), "wf-1").unwrap_err();
    assert!(matches!(err, AgentError::InvalidPayload(_)));
}

#[test]
fn test_validate_request_update_without_parameters() {
    let (planner, _) = planner();
    let payload = Metadata::from([
        ("operation".to_string(), json!("update")),
        ("target_customer_id".to_string(), json!("CUST001")),
    ]);
    let report = planner.validate_request(&payload, "wf-1");
    assert_eq!(report["valid"], json!(false));
    assert_eq!(report["errors"], json!(["Update operation requires parameters"]));
}

#[test]
fn test_validate_request_delete_without_target() {
    let (planner, _) = planner();
    let payload = Metadata::from([("operation".to_string(), json!("delete"))]);
    let report = planner.validate_request(&payload, "wf-1");
    assert_eq!(report["valid"], json!(false));
    assert_eq!(report["errors"], json!(["Customer ID required for this operation"]));
}

#[tokio::test]
async fn test_process_message_unknown_action() {
    let (planner, _) = planner();
    let msg = AgentMessage::request("orchestrator", "orchestrator", "wf-1", "reticulate_splines");
    let response = planner.process_message(msg.clone()).await;
    assert!(!response.success);
    assert_eq!(response.message_id, msg.message_id);
    assert!(response.error.unwrap().contains("Unknown action"));
}

#[tokio::test]
async fn test_process_message_plan_workflow() {
    let (planner, _) = planner();
    let msg = AgentMessage::request("orchestrator", "orchestrator", "wf-1", "plan_workflow")
        .with_payload(update_payload());
    let response = planner.process_message(msg).await;
    assert!(response.success);
    let tasks: Vec<Task> =
        serde_json::from_value(response.result.unwrap()["tasks"].clone()).unwrap();
    assert_eq!(tasks.len(), 3);
    assert_eq!(planner.core().history_len(), 1);
}

#[tokio::test]
async fn test_execute_task_outlines_operation() {
    let (planner, _) = planner();
    let payload = TaskPayload {
        workflow_id: "wf-1".to_string(),
        task_id: "t-1".to_string(),
        description: "Plan query".to_string(),
        parameters: Metadata::from([("operation".to_string(), json!("query"))]),
    };
    let result = planner.execute_task(&payload).await.unwrap();
    assert_eq!(result["status"], json!("success"));
    let plan = result["plan"].as_array().unwrap();
    assert_eq!(plan.len(), 3);
    assert_eq!(plan[0]["action"], json!("build_query"));
}

#[tokio::test]
async fn test_execute_task_restores_idle_on_error() {
    let (planner, _) = planner();
    let payload = TaskPayload {
        workflow_id: "wf-1".to_string(),
        task_id: "t-1".to_string(),
        description: "broken".to_string(),
        parameters: Metadata::new(),
    };
    assert!(planner.execute_task(&payload).await.is_err());
    assert_eq!(planner.core().status(), crate::agent::AgentStatus::Idle);
}

#[test]
fn test_message_sender_is_planner() {
    let (planner, context) = planner();
    let wf = context.create_workflow_context();
    let msg = planner.core().create_message(
        MessageType::Request,
        None,
        &wf,
        "plan_workflow",
        Metadata::new(),
        None,
    );
    assert_eq!(msg.sender_type, "planner");
    assert!(msg.sender_id.starts_with("planner_"));
    assert_eq!(msg.workflow_id, wf);
}
