use std::time::Duration;

use super::*;
use custmesh_protocols::customer::{Customer, CustomerStatus, SubscriptionPlan};
use custmesh_protocols::error::StoreError;
use custmesh_protocols::store::MemoryCustomerStore;
use custmesh_protocols::workflow::Operation;

fn sample_customer(id: &str) -> Customer {
    Customer {
        mcp_id: id.to_string(),
        customer_name: "Johnson Group".to_string(),
        email: "contact@johnsongroup.com".to_string(),
        phone: "5831580044".to_string(),
        credit_limit: 48983.0,
        kyc_date: "7/3/2021".to_string(),
        status: CustomerStatus::Active,
        region: "Lake Jesseberg".to_string(),
        industry: "IT".to_string(),
        country: "USA".to_string(),
        zip_code: "67390".to_string(),
        subscription_plan: SubscriptionPlan::Standard,
        signup_date: "6/20/2021".to_string(),
        last_login: "10/30/2023".to_string(),
        total_transactions: 65,
        total_spent: 17349.38,
        preferred_category: "Books".to_string(),
        loyalty_points: 758,
        data: None,
    }
}

async fn engine_with_customers(ids: &[&str]) -> (Arc<OrchestrationEngine>, Arc<MemoryCustomerStore>) {
    let store = Arc::new(MemoryCustomerStore::new());
    for id in ids {
        store.insert(sample_customer(id)).await.unwrap();
    }
    let engine = Arc::new(OrchestrationEngine::new(
        Arc::clone(&store) as Arc<dyn CustomerStore>,
        5,
    ));
    (engine, store)
}

fn update_request(target: &str, parameters: Metadata) -> WorkflowRequest {
    WorkflowRequest {
        name: "Update customer".to_string(),
        description: None,
        operation: Operation::Update,
        target_customer_id: Some(target.to_string()),
        parameters,
    }
}

async fn run_to_terminal(engine: &Arc<OrchestrationEngine>, request: WorkflowRequest) -> Id {
    let response = engine.create_workflow(request).await;
    let workflow_id = response.workflow_id.expect("workflow should be created");
    engine.wait_for_workflow(&workflow_id).await;
    workflow_id
}

#[tokio::test]
async fn test_update_workflow_completes() {
    let (engine, store) = engine_with_customers(&["CUST001"]).await;
    let request = update_request(
        "CUST001",
        Metadata::from([("credit_limit".to_string(), json!(60000.0))]),
    );

    let response = engine.create_workflow(request).await;
    assert_eq!(response.status, WorkflowStatus::Pending);
    assert_eq!(response.message, "Workflow created and started");
    assert_eq!(response.progress, 0.0);
    let first = response.current_task.as_ref().unwrap();
    assert_eq!(first.agent_kind, AgentKind::Validator);

    let workflow_id = response.workflow_id.unwrap();
    engine.wait_for_workflow(&workflow_id).await;

    let status = engine.get_workflow_status(&workflow_id).unwrap();
    assert_eq!(status.status, WorkflowStatus::Completed);
    assert_eq!(status.message, "Workflow completed");
    assert_eq!(status.progress, 100.0);
    // Cursor sits past the last task once everything completed.
    assert!(status.current_task.is_none());

    let customer = store.fetch("CUST001").await.unwrap().unwrap();
    assert_eq!(customer.credit_limit, 60000.0);
}

#[tokio::test]
async fn test_completed_workflow_context_trail() {
    let (engine, _store) = engine_with_customers(&["CUST001"]).await;
    let workflow_id = run_to_terminal(
        &engine,
        update_request(
            "CUST001",
            Metadata::from([("region".to_string(), json!("East Jordan"))]),
        ),
    )
    .await;

    let entry = engine.workflow_context(&workflow_id);
    assert!(entry.created_at.is_some());
    assert_eq!(entry.metadata["task_count"], json!(3));
    assert_eq!(entry.previous_actions[0], "plan_workflow");
    assert_eq!(
        entry
            .previous_actions
            .iter()
            .filter(|a| a.starts_with("executed_task_"))
            .count(),
        3
    );
    // The most recent task result is mirrored into the metadata.
    assert_eq!(entry.metadata["last_result"]["status"], json!("success"));
}

#[tokio::test]
async fn test_negative_credit_limit_fails_pre_validation() {
    let (engine, store) = engine_with_customers(&["CUST001"]).await;
    let workflow_id = run_to_terminal(
        &engine,
        update_request(
            "CUST001",
            Metadata::from([("credit_limit".to_string(), json!(-100.0))]),
        ),
    )
    .await;

    let entry = engine.workflows.get(&workflow_id).unwrap();
    let workflow = entry.state.read();
    assert_eq!(workflow.status, WorkflowStatus::Failed);
    assert_eq!(
        workflow.error.as_deref(),
        Some("Validation failed: credit_limit cannot be negative")
    );
    // The cursor never moved past the validation task and no later
    // task was started.
    assert_eq!(workflow.current_task_index, 0);
    assert_eq!(workflow.tasks[0].status, TaskStatus::Failed);
    assert_eq!(
        workflow.tasks[0].error.as_deref(),
        Some("Pre-execution validation failed")
    );
    // The validator's report stays attached to the failed task.
    let report = workflow.tasks[0].result.as_ref().unwrap();
    assert_eq!(report["result"]["valid"], json!(false));
    assert_eq!(
        report["result"]["errors"],
        json!(["credit_limit cannot be negative"])
    );
    assert_eq!(workflow.tasks[1].status, TaskStatus::Pending);
    assert_eq!(workflow.tasks[2].status, TaskStatus::Pending);
    drop(workflow);

    let entry = engine.workflow_context(&workflow_id);
    assert_eq!(
        entry.metadata["last_error"],
        json!("Validation failed: credit_limit cannot be negative")
    );

    // The customer record was never touched.
    let customer = store.fetch("CUST001").await.unwrap().unwrap();
    assert_eq!(customer.credit_limit, 48983.0);
}

#[tokio::test]
async fn test_missing_target_fails_pre_validation() {
    let (engine, _store) = engine_with_customers(&[]).await;
    let request = WorkflowRequest {
        name: "Update without target".to_string(),
        description: None,
        operation: Operation::Update,
        target_customer_id: None,
        parameters: Metadata::from([("region".to_string(), json!("West"))]),
    };
    let response = engine.create_workflow(request).await;
    let workflow_id = response.workflow_id.unwrap();
    engine.wait_for_workflow(&workflow_id).await;

    let status = engine.get_workflow_status(&workflow_id).unwrap();
    assert_eq!(status.status, WorkflowStatus::Failed);
    let workflow = engine.workflows.get(&workflow_id).unwrap().state.read().clone();
    assert!(workflow
        .error
        .unwrap()
        .contains("Missing target_customer_id"));
}

#[tokio::test]
async fn test_unknown_customer_fails_at_executor() {
    let (engine, _store) = engine_with_customers(&[]).await;
    let workflow_id = run_to_terminal(
        &engine,
        update_request(
            "CUST404",
            Metadata::from([("region".to_string(), json!("West"))]),
        ),
    )
    .await;

    let entry = engine.workflows.get(&workflow_id).unwrap();
    let workflow = entry.state.read();
    assert_eq!(workflow.status, WorkflowStatus::Failed);
    assert_eq!(workflow.error.as_deref(), Some("Customer CUST404 not found"));
    // Pre-validation passed, execution failed, post-validation never ran.
    assert_eq!(workflow.tasks[0].status, TaskStatus::Completed);
    assert_eq!(workflow.tasks[1].status, TaskStatus::Failed);
    assert_eq!(workflow.tasks[2].status, TaskStatus::Pending);
    assert_eq!(workflow.current_task_index, 1);
    drop(workflow);

    let entry = engine.workflow_context(&workflow_id);
    assert!(entry
        .previous_actions
        .iter()
        .any(|a| a == "failed_update_CUST404"));
    assert!(entry
        .previous_actions
        .last()
        .unwrap()
        .starts_with("failed_task_"));
}

#[tokio::test]
async fn test_unsupported_operation_fails_at_executor() {
    let (engine, _store) = engine_with_customers(&[]).await;
    let request = WorkflowRequest {
        name: "Create customer".to_string(),
        description: None,
        operation: Operation::Create,
        target_customer_id: None,
        parameters: Metadata::from([("customer_name".to_string(), json!("New Co"))]),
    };
    let response = engine.create_workflow(request).await;
    let workflow_id = response.workflow_id.unwrap();
    engine.wait_for_workflow(&workflow_id).await;

    let workflow = engine.workflows.get(&workflow_id).unwrap().state.read().clone();
    assert_eq!(workflow.status, WorkflowStatus::Failed);
    assert_eq!(
        workflow.error.as_deref(),
        Some("Unsupported operation: create")
    );
}

#[tokio::test]
async fn test_unknown_workflow_id_is_none() {
    let (engine, _store) = engine_with_customers(&[]).await;
    assert!(engine.get_workflow_status("no-such-workflow").is_none());
}

#[tokio::test]
async fn test_terminal_status_is_idempotent() {
    let (engine, _store) = engine_with_customers(&["CUST001"]).await;
    let workflow_id = run_to_terminal(
        &engine,
        update_request(
            "CUST001",
            Metadata::from([("loyalty_points".to_string(), json!(900))]),
        ),
    )
    .await;

    let first = engine.get_workflow_status(&workflow_id).unwrap();
    let second = engine.get_workflow_status(&workflow_id).unwrap();
    assert_eq!(first.status, WorkflowStatus::Completed);
    assert_eq!(second.status, first.status);
    assert_eq!(second.progress, first.progress);
    assert_eq!(second.message, first.message);
}

#[tokio::test]
async fn test_agents_idle_after_completion() {
    let (engine, _store) = engine_with_customers(&["CUST001"]).await;
    run_to_terminal(
        &engine,
        update_request(
            "CUST001",
            Metadata::from([("country".to_string(), json!("Canada"))]),
        ),
    )
    .await;

    let statuses = engine.agent_statuses();
    assert_eq!(statuses.len(), 3);
    for report in statuses {
        assert_eq!(report.status, crate::agent::AgentStatus::Idle);
    }
}

#[tokio::test]
async fn test_list_workflows_summaries() {
    let (engine, _store) = engine_with_customers(&["CUST001"]).await;
    let completed = run_to_terminal(
        &engine,
        update_request(
            "CUST001",
            Metadata::from([("industry".to_string(), json!("Retail"))]),
        ),
    )
    .await;
    let failed = run_to_terminal(
        &engine,
        update_request(
            "CUST404",
            Metadata::from([("industry".to_string(), json!("Retail"))]),
        ),
    )
    .await;

    let summaries = engine.list_workflows();
    assert_eq!(summaries.len(), 2);
    let completed_summary = summaries
        .iter()
        .find(|s| s.workflow_id == completed)
        .unwrap();
    assert_eq!(completed_summary.status, WorkflowStatus::Completed);
    assert_eq!(completed_summary.tasks_completed, 3);
    assert_eq!(completed_summary.tasks_total, 3);
    let failed_summary = summaries.iter().find(|s| s.workflow_id == failed).unwrap();
    assert_eq!(failed_summary.status, WorkflowStatus::Failed);
    assert_eq!(failed_summary.tasks_completed, 1);
}

/// Store whose reads stall, keeping a workflow in flight.
struct SlowStore {
    inner: MemoryCustomerStore,
    delay: Duration,
}

#[async_trait::async_trait]
impl CustomerStore for SlowStore {
    async fn fetch(&self, id: &str) -> Result<Option<Customer>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch(id).await
    }

    async fn insert(&self, customer: Customer) -> Result<(), StoreError> {
        self.inner.insert(customer).await
    }

    async fn update_fields(&self, id: &str, fields: Metadata) -> Result<(), StoreError> {
        self.inner.update_fields(id, fields).await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete(id).await
    }

    async fn list(&self, limit: usize) -> Result<Vec<Customer>, StoreError> {
        self.inner.list(limit).await
    }
}

#[tokio::test]
async fn test_capacity_rejection_leaves_no_trace() {
    let store = SlowStore {
        inner: MemoryCustomerStore::new(),
        delay: Duration::from_millis(200),
    };
    store.insert(sample_customer("CUST001")).await.unwrap();
    let engine = Arc::new(OrchestrationEngine::new(Arc::new(store), 1));

    let request = update_request(
        "CUST001",
        Metadata::from([("region".to_string(), json!("North"))]),
    );
    let first = engine.create_workflow(request.clone()).await;
    let first_id = first.workflow_id.unwrap();

    // The running workflow is stalled in the store; a second request
    // must bounce off the ceiling without being retained.
    let rejected = engine.create_workflow(request.clone()).await;
    assert!(rejected.workflow_id.is_none());
    assert_eq!(rejected.status, WorkflowStatus::Failed);
    assert_eq!(rejected.message, "Maximum concurrent workflows (1) reached");
    assert_eq!(engine.list_workflows().len(), 1);

    // Once the slot frees up the same request is admitted.
    engine.wait_for_workflow(&first_id).await;
    let admitted = engine.create_workflow(request).await;
    assert!(admitted.workflow_id.is_some());
}
