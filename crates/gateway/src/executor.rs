//! Executor — drains approved tasks in the background.
//!
//! Does not re-check policy: approval authorizes execution at the moment
//! granted. No retry — a dispatch failure is terminal for the task.

use std::sync::Arc;
use std::time::Duration;

use portero_core::model::{Task, TaskStatus};

use crate::anonymizer::Anonymizer;
use crate::approval::{ActivityNotice, ApprovalChannel};
use crate::audit::{AuditEvent, AuditSink};
use crate::registry::BackendRegistry;
use crate::router::Router;
use crate::tasks::TaskManager;

pub struct Executor {
    tasks: Arc<TaskManager>,
    registry: Arc<BackendRegistry>,
    anonymizer: Arc<Anonymizer>,
    approval: Arc<ApprovalChannel>,
    audit: Arc<dyn AuditSink>,
}

impl Executor {
    pub fn new(
        tasks: Arc<TaskManager>,
        registry: Arc<BackendRegistry>,
        anonymizer: Arc<Anonymizer>,
        approval: Arc<ApprovalChannel>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { tasks, registry, anonymizer, approval, audit }
    }

    /// Execute one approved task to completion. Concurrent callers may run
    /// this for distinct tasks in parallel — there is no per-backend
    /// serialization at this layer.
    pub async fn execute(&self, task: Task) {
        let task_id = task.id;
        let tool_name = task.tool_name.clone();

        if let Err(e) = self.tasks.transition_to(&task_id, TaskStatus::Executing) {
            tracing::error!(task_id = %task_id, error = %e, "failed to transition task to executing");
            return;
        }

        let dispatch = Router::dispatch_call(&self.registry, &tool_name, task.real_args.clone()).await;

        match dispatch {
            Ok(result) => {
                self.registry.mark_used(&tool_name);
                let raw = match serde_json::to_value(&result) {
                    Ok(v) => v,
                    Err(e) => {
                        self.finish_error(task_id, &tool_name, format!("serializing backend reply: {e}")).await;
                        return;
                    }
                };
                let outbound = self.anonymizer.anonymize_outbound(&raw);
                if let Err(e) = self.tasks.set_result(&task_id, outbound) {
                    tracing::error!(task_id = %task_id, error = %e, "failed to persist task result");
                    return;
                }
                let _ = self
                    .audit
                    .record(AuditEvent::new(&tool_name).with_task(task_id).with_approval_status("approved"))
                    .await;
                self.approval.notify(ActivityNotice {
                    status: "completed".into(),
                    tool_name: tool_name.clone(),
                    reason: None,
                });
            }
            Err(e) => {
                self.finish_error(task_id, &tool_name, e.to_string()).await;
            }
        }
    }

    /// Run forever, polling for `ApprovedQueued` tasks every `interval` and
    /// running each to completion concurrently. Intended to be
    /// `tokio::spawn`ed from `main.rs` against an `Arc<Executor>`.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for task in self.tasks.list(Some(TaskStatus::ApprovedQueued), usize::MAX) {
                let this = self.clone();
                tokio::spawn(async move { this.execute(task).await });
            }
        }
    }

    async fn finish_error(&self, task_id: uuid::Uuid, tool_name: &str, message: String) {
        if let Err(e) = self.tasks.set_error(&task_id, message.clone()) {
            tracing::error!(task_id = %task_id, error = %e, "failed to persist task error");
        }
        let _ = self
            .audit
            .record(
                AuditEvent::new(tool_name)
                    .with_task(task_id)
                    .with_approval_status("approved")
                    .with_error(message),
            )
            .await;
        self.approval.notify(ActivityNotice {
            status: "error".into(),
            tool_name: tool_name.to_string(),
            reason: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::NullTransport;
    use crate::store::{JsonDocStore, SingleDocStore};
    use portero_core::model::PolicyAction;

    fn executor() -> (Executor, Arc<TaskManager>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let task_manager = TaskManager::new(JsonDocStore::open(dir.path().join("tasks.json")).unwrap());
        let tasks = Arc::new(task_manager.clone());
        let registry = Arc::new(BackendRegistry::empty());
        let anonymizer = Arc::new(Anonymizer::new(vec![]));
        let approval = Arc::new(ApprovalChannel::new(
            SingleDocStore::open(dir.path().join("admin.json")).unwrap(),
            JsonDocStore::open(dir.path().join("grants.json")).unwrap(),
            JsonDocStore::open(dir.path().join("rules.json")).unwrap(),
            task_manager,
            Box::new(NullTransport),
            25,
        ));
        let audit: Arc<dyn AuditSink> = Arc::new(crate::audit::FileAuditSink::new(dir.path().join("audit.jsonl")));
        let executor = Executor::new(tasks.clone(), registry, anonymizer, approval, audit);
        (executor, tasks, dir)
    }

    #[tokio::test]
    async fn dispatch_to_unknown_backend_moves_task_to_error() {
        let (executor, tasks, _dir) = executor();
        let task = tasks
            .create("ghost/do_thing", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        tasks.transition_to(&task.id, TaskStatus::ApprovedQueued).unwrap();
        let task = tasks.get(&task.id).unwrap();
        executor.execute(task).await;
        let finished = tasks.get(&task.id).unwrap();
        assert_eq!(finished.status, TaskStatus::Error);
        assert!(finished.error.is_some());
    }
}
