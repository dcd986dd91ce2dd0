//! Orchestration engine.
//!
//! Owns the workflow table and the three agents. Each created workflow
//! gets a background loop that drives its tasks strictly in planner
//! order; callers only ever observe read-only snapshots.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use custmesh_protocols::message::AgentMessage;
use custmesh_protocols::store::CustomerStore;
use custmesh_protocols::types::{Id, Metadata};
use custmesh_protocols::workflow::{
    AgentKind, OperationContext, Task, TaskStatus, WorkflowRequest, WorkflowResponse,
    WorkflowState, WorkflowStatus, WorkflowSummary,
};

use crate::agent::{Agent, AgentStatusReport, ExecutorAgent, PlannerAgent, ValidatorAgent};
use crate::context::{ContextEntry, ContextStore};
use crate::payload::{compose_task_payload, to_metadata};

/// One tracked workflow: shared mutable state plus the loop's handle.
///
/// The handle is owned by the record, not detached, so a dropped engine
/// takes its loops' ownership with it.
struct WorkflowEntry {
    state: Arc<RwLock<WorkflowState>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// The orchestration engine.
///
/// An explicit value constructed at startup and shared behind an `Arc`.
/// Thread-safe throughout; every public method takes `&self`.
pub struct OrchestrationEngine {
    workflows: DashMap<Id, Arc<WorkflowEntry>>,
    planner: PlannerAgent,
    executor: ExecutorAgent,
    validator: ValidatorAgent,
    context: Arc<ContextStore>,
    store: Arc<dyn CustomerStore>,
    max_concurrent_workflows: usize,
}

impl OrchestrationEngine {
    pub fn new(store: Arc<dyn CustomerStore>, max_concurrent_workflows: usize) -> Self {
        let context = Arc::new(ContextStore::new());
        let engine = Self {
            workflows: DashMap::new(),
            planner: PlannerAgent::new(Arc::clone(&context)),
            executor: ExecutorAgent::new(Arc::clone(&context)),
            validator: ValidatorAgent::new(Arc::clone(&context)),
            context,
            store,
            max_concurrent_workflows,
        };
        info!(
            max_concurrent_workflows = engine.max_concurrent_workflows,
            "orchestration engine initialized"
        );
        engine
    }

    pub fn max_concurrent_workflows(&self) -> usize {
        self.max_concurrent_workflows
    }

    /// Number of workflows still counting against the ceiling.
    pub fn active_workflows(&self) -> usize {
        self.workflows
            .iter()
            .filter(|entry| entry.state.read().is_active())
            .count()
    }

    /// Create a workflow and start its execution loop.
    ///
    /// Rejections and planning failures come back synchronously; once
    /// this returns a pending response the workflow runs to a terminal
    /// status on its own.
    pub async fn create_workflow(self: &Arc<Self>, request: WorkflowRequest) -> WorkflowResponse {
        // Advisory capacity check: concurrent admissions may briefly
        // overshoot the ceiling, but a rejected request never leaves
        // any trace behind.
        if self.active_workflows() >= self.max_concurrent_workflows {
            warn!(
                max_concurrent_workflows = self.max_concurrent_workflows,
                "workflow rejected at capacity"
            );
            return WorkflowResponse {
                workflow_id: None,
                status: WorkflowStatus::Failed,
                message: format!(
                    "Maximum concurrent workflows ({}) reached",
                    self.max_concurrent_workflows
                ),
                current_task: None,
                progress: 0.0,
            };
        }

        let workflow_id = self.context.create_workflow_context();
        let operation = request.operation;
        let mut state = WorkflowState::new(
            request.name,
            request.description,
            OperationContext {
                operation,
                target_customer_id: request.target_customer_id.clone(),
                parameters: request.parameters.clone(),
            },
        );
        state.workflow_id = workflow_id.clone();
        info!(workflow_id, %operation, "workflow created");

        let entry = Arc::new(WorkflowEntry {
            state: Arc::new(RwLock::new(state)),
            handle: Mutex::new(None),
        });
        // Registered before planning so status queries see the pending
        // workflow immediately.
        self.workflows.insert(workflow_id.clone(), Arc::clone(&entry));

        // Planning is synchronous; a workflow never starts executing
        // with an empty or invalid task list.
        let mut plan_payload = Metadata::from([
            ("operation".to_string(), json!(operation)),
            ("parameters".to_string(), json!(request.parameters)),
        ]);
        if let Some(target) = &request.target_customer_id {
            plan_payload.insert("target_customer_id".to_string(), json!(target));
        }
        let plan_message = AgentMessage::request("engine", "orchestrator", &workflow_id, "plan_workflow")
            .with_payload(plan_payload);
        let plan_response = self.planner.process_message(plan_message).await;

        if !plan_response.success {
            let message = plan_response
                .error
                .unwrap_or_else(|| "Workflow planning failed".to_string());
            return self.fail_before_start(&entry, workflow_id, message);
        }
        let tasks: Vec<Task> = match plan_response
            .result
            .as_ref()
            .and_then(|result| result.get("tasks"))
            .cloned()
            .map(serde_json::from_value)
        {
            Some(Ok(tasks)) => tasks,
            _ => {
                return self.fail_before_start(
                    &entry,
                    workflow_id,
                    "Planner returned an invalid task list".to_string(),
                );
            }
        };

        let first_task = tasks.first().cloned();
        entry.state.write().tasks = tasks;

        let engine = Arc::clone(self);
        let loop_id = workflow_id.clone();
        let handle = tokio::spawn(async move {
            // A fault anywhere in the loop still lands the workflow in
            // a terminal status, never `running` forever.
            let run = std::panic::AssertUnwindSafe(engine.run_workflow(&loop_id)).catch_unwind();
            if run.await.is_err() {
                error!(workflow_id = loop_id, "workflow loop aborted unexpectedly");
                engine.abort_workflow(&loop_id, "Workflow execution aborted unexpectedly");
            }
        });
        *entry.handle.lock() = Some(handle);

        WorkflowResponse {
            workflow_id: Some(workflow_id),
            status: WorkflowStatus::Pending,
            message: "Workflow created and started".to_string(),
            current_task: first_task,
            progress: 0.0,
        }
    }

    /// Terminal failure before the loop ever spawned.
    fn fail_before_start(
        &self,
        entry: &WorkflowEntry,
        workflow_id: Id,
        message: String,
    ) -> WorkflowResponse {
        error!(workflow_id, error = %message, "workflow failed before start");
        let mut state = entry.state.write();
        state.status = WorkflowStatus::Failed;
        state.error = Some(message.clone());
        state.completed_at = Some(Utc::now());
        WorkflowResponse {
            workflow_id: Some(workflow_id),
            status: WorkflowStatus::Failed,
            message,
            current_task: None,
            progress: 0.0,
        }
    }

    /// The per-workflow execution loop. Strictly sequential.
    async fn run_workflow(&self, workflow_id: &str) {
        let Some(state) = self
            .workflows
            .get(workflow_id)
            .map(|entry| Arc::clone(&entry.state))
        else {
            warn!(workflow_id, "execution loop started for unknown workflow");
            return;
        };

        let total = {
            let mut workflow = state.write();
            workflow.status = WorkflowStatus::Running;
            workflow.started_at = Some(Utc::now());
            workflow.tasks.len()
        };
        info!(workflow_id, tasks = total, "workflow running");

        // Every workflow gets a fresh session on the shared store.
        self.executor.attach_session(Arc::clone(&self.store));

        let mut last_executor_result: Option<Metadata> = None;
        for index in 0..total {
            let (payload, agent_kind, task_id) = {
                let mut workflow = state.write();
                workflow.current_task_index = index;
                let operation_context = workflow.context.clone();
                let task = &mut workflow.tasks[index];
                task.status = TaskStatus::InProgress;
                task.started_at = Some(Utc::now());
                (
                    compose_task_payload(
                        workflow_id,
                        task,
                        &operation_context,
                        last_executor_result.as_ref(),
                    ),
                    task.agent_kind,
                    task.task_id.clone(),
                )
            };
            debug!(workflow_id, task_id, %agent_kind, "dispatching task");

            let outcome = match agent_kind {
                AgentKind::Planner => self.planner.execute_task(&payload).await,
                AgentKind::Executor => self.executor.execute_task(&payload).await,
                AgentKind::Validator => self.validator.execute_task(&payload).await,
            };

            match outcome {
                Ok(result) => {
                    // A failed pre-execution validation aborts the
                    // workflow even though the validator itself ran
                    // cleanly.
                    if agent_kind == AgentKind::Validator
                        && payload.parameters.get("validation_type")
                            == Some(&json!("pre_execution"))
                        && result.get("result").and_then(|r| r.get("valid"))
                            == Some(&json!(false))
                    {
                        let errors = result
                            .get("result")
                            .and_then(|r| r.get("errors"))
                            .and_then(|e| e.as_array())
                            .map(|errors| {
                                errors
                                    .iter()
                                    .filter_map(|e| e.as_str())
                                    .collect::<Vec<_>>()
                                    .join("; ")
                            })
                            .unwrap_or_default();
                        // The report is still the task's result; only
                        // its verdict aborts the workflow.
                        state.write().tasks[index].result = Some(result);
                        self.fail_task(
                            &state,
                            workflow_id,
                            index,
                            &task_id,
                            "Pre-execution validation failed",
                            format!("Validation failed: {errors}"),
                        );
                        return;
                    }

                    if agent_kind == AgentKind::Executor {
                        last_executor_result = result
                            .get("result")
                            .cloned()
                            .map(to_metadata)
                            .filter(|r| !r.is_empty());
                    }

                    let metadata =
                        Metadata::from([("last_result".to_string(), json!(result))]);
                    let mut workflow = state.write();
                    let task = &mut workflow.tasks[index];
                    task.result = Some(result);
                    task.status = TaskStatus::Completed;
                    task.completed_at = Some(Utc::now());
                    drop(workflow);
                    self.context.update_context(
                        workflow_id,
                        Some(&format!("executed_task_{task_id}")),
                        Some(metadata),
                    );
                    debug!(workflow_id, task_id, "task completed");
                }
                Err(e) => {
                    let message = e.to_string();
                    self.fail_task(&state, workflow_id, index, &task_id, &message, message.clone());
                    return;
                }
            }
        }

        let mut workflow = state.write();
        workflow.status = WorkflowStatus::Completed;
        workflow.current_task_index = workflow.tasks.len();
        workflow.completed_at = Some(Utc::now());
        drop(workflow);
        info!(workflow_id, "workflow completed");
    }

    /// Mark the task at `index` failed and the workflow with it.
    ///
    /// Remaining tasks stay pending; the loop returns right after.
    fn fail_task(
        &self,
        state: &RwLock<WorkflowState>,
        workflow_id: &str,
        index: usize,
        task_id: &str,
        task_error: &str,
        workflow_error: String,
    ) {
        warn!(workflow_id, task_id, error = %workflow_error, "task failed, aborting workflow");
        let metadata = Metadata::from([("last_error".to_string(), json!(workflow_error))]);
        let mut workflow = state.write();
        let task = &mut workflow.tasks[index];
        task.status = TaskStatus::Failed;
        task.error = Some(task_error.to_string());
        task.completed_at = Some(Utc::now());
        workflow.status = WorkflowStatus::Failed;
        workflow.error = Some(workflow_error);
        workflow.completed_at = Some(Utc::now());
        drop(workflow);
        self.context.update_context(
            workflow_id,
            Some(&format!("failed_task_{task_id}")),
            Some(metadata),
        );
    }

    /// Last-resort terminal transition for a loop that died mid-flight.
    fn abort_workflow(&self, workflow_id: &str, message: &str) {
        let Some(state) = self
            .workflows
            .get(workflow_id)
            .map(|entry| Arc::clone(&entry.state))
        else {
            return;
        };
        let mut workflow = state.write();
        if !workflow.is_active() {
            return;
        }
        if let Some(task) = workflow
            .tasks
            .iter_mut()
            .find(|t| t.status == TaskStatus::InProgress)
        {
            task.status = TaskStatus::Failed;
            task.error = Some(message.to_string());
            task.completed_at = Some(Utc::now());
        }
        workflow.status = WorkflowStatus::Failed;
        workflow.error = Some(message.to_string());
        workflow.completed_at = Some(Utc::now());
    }

    /// Point-in-time status snapshot. `None` for unknown identifiers.
    pub fn get_workflow_status(&self, workflow_id: &str) -> Option<WorkflowResponse> {
        let entry = self.workflows.get(workflow_id)?;
        let workflow = entry.state.read();
        Some(WorkflowResponse {
            workflow_id: Some(workflow.workflow_id.clone()),
            status: workflow.status,
            message: format!("Workflow {}", workflow.status),
            current_task: workflow.current_task().cloned(),
            progress: workflow.progress(),
        })
    }

    /// Read-only summaries of every tracked workflow. No eviction.
    pub fn list_workflows(&self) -> Vec<WorkflowSummary> {
        self.workflows
            .iter()
            .map(|entry| {
                let workflow = entry.state.read();
                WorkflowSummary {
                    workflow_id: workflow.workflow_id.clone(),
                    name: workflow.name.clone(),
                    status: workflow.status,
                    created_at: workflow.created_at,
                    tasks_total: workflow.tasks.len(),
                    tasks_completed: workflow.tasks_completed(),
                }
            })
            .collect()
    }

    /// Per-agent identity and availability.
    pub fn agent_statuses(&self) -> Vec<AgentStatusReport> {
        vec![
            self.planner.core().status_report(),
            self.executor.core().status_report(),
            self.validator.core().status_report(),
        ]
    }

    /// The recorded context for a workflow; structurally empty if unknown.
    pub fn workflow_context(&self, workflow_id: &str) -> ContextEntry {
        self.context.get_context(workflow_id)
    }

    /// Wait for a workflow's loop to finish. Test and CLI convenience;
    /// a no-op for workflows that never spawned one.
    pub async fn wait_for_workflow(&self, workflow_id: &str) {
        let handle = self
            .workflows
            .get(workflow_id)
            .and_then(|entry| entry.handle.lock().take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
