//! Task Manager — stateful facade over the tasks collection enforcing the
//! FSM documented on [`TaskStatus`](portero_core::model::TaskStatus).

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use portero_core::error::{Error, Result};
use portero_core::model::{PolicyAction, Task, TaskStatus};

use crate::store::{HasId, JsonDocStore};

impl HasId for Task {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Cheaply cloneable — every clone shares the same underlying store, so
/// the Request Pipeline, the Executor, and the Approval Channel can each
/// hold their own handle without splitting the task collection in two.
#[derive(Clone)]
pub struct TaskManager {
    store: Arc<JsonDocStore<Task>>,
}

impl TaskManager {
    pub fn new(store: JsonDocStore<Task>) -> Self {
        Self { store: Arc::new(store) }
    }

    pub fn create(
        &self,
        tool_name: impl Into<String>,
        real_args: Value,
        original_args: Value,
        policy_action: PolicyAction,
    ) -> Result<Task> {
        self.store.create(Task::new(tool_name, real_args, original_args, policy_action))
    }

    pub fn get(&self, id: &Uuid) -> Option<Task> {
        self.store.get(id)
    }

    pub fn list(&self, status: Option<TaskStatus>, limit: usize) -> Vec<Task> {
        self.store.list(|t| status.map(|s| t.status == s).unwrap_or(true), limit)
    }

    /// Move a task to `target`. A disallowed transition is a programming
    /// error — it fails loudly rather than silently clamping.
    pub fn transition_to(&self, id: &Uuid, target: TaskStatus) -> Result<Task> {
        let updated = self.store.try_update(id, |task| {
            if !task.status.can_transition_to(target) {
                return Err(invalid_transition(task.status, target));
            }
            let from = task.status;
            task.status = target;
            match target {
                TaskStatus::ApprovedQueued => task.approved_at = Some(Utc::now()),
                TaskStatus::Executing => task.executed_at = Some(Utc::now()),
                TaskStatus::Completed | TaskStatus::Error if from == TaskStatus::Executing => {
                    task.executed_at = Some(Utc::now());
                }
                _ => {}
            }
            Ok(())
        })?;
        updated.ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    /// `status ∈ {executing, approved-queued}` -> `completed`, with
    /// `result` set and `executedAt` stamped.
    pub fn set_result(&self, id: &Uuid, value: Value) -> Result<Task> {
        let updated = self.store.try_update(id, |task| {
            if !matches!(task.status, TaskStatus::Executing | TaskStatus::ApprovedQueued) {
                return Err(invalid_transition(task.status, TaskStatus::Completed));
            }
            task.status = TaskStatus::Completed;
            task.result = Some(value);
            task.executed_at = Some(Utc::now());
            Ok(())
        })?;
        updated.ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    /// Any non-terminal status -> `error`, with `error` set and
    /// `executedAt` stamped.
    pub fn set_error(&self, id: &Uuid, message: impl Into<String>) -> Result<Task> {
        let message = message.into();
        let updated = self.store.try_update(id, |task| {
            if task.status.is_terminal() {
                return Err(invalid_transition(task.status, TaskStatus::Error));
            }
            task.status = TaskStatus::Error;
            task.error = Some(message);
            task.executed_at = Some(Utc::now());
            Ok(())
        })?;
        updated.ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    /// Observability only — does not gate state.
    pub fn mark_checked(&self, id: &Uuid) -> Result<Task> {
        let updated = self.store.try_update(id, |task| {
            task.checked_at = Some(Utc::now());
            Ok(())
        })?;
        updated.ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    /// Record the approval-channel message handle once the request has
    /// been rendered and sent.
    pub fn set_approval_handle(&self, id: &Uuid, handle: impl Into<String>) -> Result<Task> {
        let handle = handle.into();
        let updated = self.store.try_update(id, |task| {
            task.approval_message_handle = Some(handle);
            Ok(())
        })?;
        updated.ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }
}

fn invalid_transition(from: TaskStatus, to: TaskStatus) -> Error {
    Error::InvalidTransition {
        from: format!("{from:?}"),
        to: format!("{to:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TaskManager {
        let dir = tempfile::tempdir().unwrap();
        TaskManager::new(JsonDocStore::open(dir.path().join("tasks.json")).unwrap())
    }

    #[test]
    fn create_starts_pending_approval() {
        let mgr = manager();
        let task = mgr
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        assert_eq!(task.status, TaskStatus::PendingApproval);
    }

    #[test]
    fn full_happy_path_transitions() {
        let mgr = manager();
        let task = mgr
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        mgr.transition_to(&task.id, TaskStatus::ApprovedQueued).unwrap();
        mgr.transition_to(&task.id, TaskStatus::Executing).unwrap();
        let done = mgr.set_result(&task.id, serde_json::json!({"ok": true})).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.result, Some(serde_json::json!({"ok": true})));
        assert!(done.executed_at.is_some());
        assert!(done.approved_at.is_some());
    }

    #[test]
    fn deny_path() {
        let mgr = manager();
        let task = mgr
            .create("fs/delete_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        let denied = mgr.transition_to(&task.id, TaskStatus::Denied).unwrap();
        assert_eq!(denied.status, TaskStatus::Denied);
    }

    #[test]
    fn disallowed_transition_fails_loudly() {
        let mgr = manager();
        let task = mgr
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        let result = mgr.transition_to(&task.id, TaskStatus::Executing);
        assert!(result.is_err());
        // The task's actual status is unaffected by the rejected attempt.
        assert_eq!(mgr.get(&task.id).unwrap().status, TaskStatus::PendingApproval);
    }

    #[test]
    fn set_error_from_approved_queued_marks_terminal() {
        let mgr = manager();
        let task = mgr
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        mgr.transition_to(&task.id, TaskStatus::ApprovedQueued).unwrap();
        let errored = mgr.set_error(&task.id, "dispatch failed").unwrap();
        assert_eq!(errored.status, TaskStatus::Error);
        assert_eq!(errored.error.as_deref(), Some("dispatch failed"));
    }

    #[test]
    fn set_error_on_terminal_task_is_rejected() {
        let mgr = manager();
        let task = mgr
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        mgr.transition_to(&task.id, TaskStatus::Denied).unwrap();
        assert!(mgr.set_error(&task.id, "too late").is_err());
    }

    #[test]
    fn mark_checked_does_not_change_status() {
        let mgr = manager();
        let task = mgr
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        let checked = mgr.mark_checked(&task.id).unwrap();
        assert_eq!(checked.status, TaskStatus::PendingApproval);
        assert!(checked.checked_at.is_some());
    }

    #[test]
    fn list_filters_by_status() {
        let mgr = manager();
        let a = mgr
            .create("a", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        let b = mgr
            .create("b", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        mgr.transition_to(&b.id, TaskStatus::Denied).unwrap();
        let pending = mgr.list(Some(TaskStatus::PendingApproval), 10);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a.id);
    }

    #[test]
    fn transition_on_unknown_task_is_task_not_found() {
        let mgr = manager();
        let result = mgr.transition_to(&Uuid::new_v4(), TaskStatus::Denied);
        assert!(matches!(result, Err(Error::TaskNotFound(_))));
    }

    #[test]
    fn set_approval_handle_records_the_handle() {
        let mgr = manager();
        let task = mgr
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        let updated = mgr.set_approval_handle(&task.id, "chat-msg-42").unwrap();
        assert_eq!(updated.approval_message_handle.as_deref(), Some("chat-msg-42"));
    }
}
