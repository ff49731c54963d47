//! Core data model shared by the State Store, Policy Resolver, Task Manager
//! and Approval Channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Replacement rule (owned by the Anonymizer, loaded at startup)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single anonymization rule. Rules are process-scoped and applied in
/// configuration order; `fake` is never empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementRule {
    pub fake: String,
    pub real: String,
    #[serde(default = "d_true")]
    pub bidirectional: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub response_replacement: Option<String>,
}

fn d_true() -> bool {
    true
}

pub const DEFAULT_REDACTION: &str = "***REDACTED***";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The three possible policy outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyAction {
    Allow,
    Deny,
    RequireApproval,
}

/// Where a policy decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicySource {
    DynamicRule,
    StaticExact,
    StaticPattern,
    Default,
}

/// The full resolver output: `{ action, source, pattern?, ruleId? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub action: PolicyAction,
    pub source: PolicySource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<Uuid>,
}

/// A persisted, admin-editable policy entry. Exactly one rule exists per
/// `pattern` at any time: `upsert` replaces in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicRule {
    pub id: Uuid,
    pub pattern: String,
    pub action: PolicyAction,
    pub created_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Grant
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A time-bounded exemption from `require-approval` for tools matching
/// `pattern`. Active iff `now < expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    pub id: Uuid,
    pub pattern: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Grant {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The task state machine. No transitions other than the ones drawn
/// below are permitted; [`TaskStatus::can_transition_to`]
/// is the single source of truth for that diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    PendingApproval,
    ApprovedQueued,
    Executing,
    Completed,
    Denied,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Denied | Self::Error)
    }

    /// Whether the FSM permits `self -> target`.
    pub fn can_transition_to(self, target: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, target),
            (PendingApproval, ApprovedQueued)
                | (PendingApproval, Denied)
                | (PendingApproval, Error)
                | (ApprovedQueued, Executing)
                | (ApprovedQueued, Error)
                | (Executing, Completed)
                | (Executing, Error)
        )
    }
}

/// A durable record of a tool invocation, deferred or executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub tool_name: String,
    /// Arguments after inbound anonymization — what the backend will see.
    pub real_args: Value,
    /// Arguments as the caller sent them.
    pub original_args: Value,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub policy_action: PolicyAction,
    /// Opaque handle into the approval transport (e.g. a chat message id),
    /// set once the approval request has been rendered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_message_handle: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        tool_name: impl Into<String>,
        real_args: Value,
        original_args: Value,
        policy_action: PolicyAction,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_name: tool_name.into(),
            real_args,
            original_args,
            status: TaskStatus::PendingApproval,
            result: None,
            error: None,
            policy_action,
            approval_message_handle: None,
            created_at: Utc::now(),
            approved_at: None,
            executed_at: None,
            checked_at: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin pairing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Single record establishing which principal may drive the approval
/// channel. `None` until `pair(secret)` succeeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminPairing {
    pub admin_chat_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_active_before_expiry() {
        let now = Utc::now();
        let g = Grant {
            id: Uuid::new_v4(),
            pattern: "*".into(),
            created_at: now,
            expires_at: now + chrono::Duration::seconds(60),
        };
        assert!(g.is_active(now));
    }

    #[test]
    fn grant_inactive_after_expiry() {
        let now = Utc::now();
        let g = Grant {
            id: Uuid::new_v4(),
            pattern: "*".into(),
            created_at: now - chrono::Duration::seconds(120),
            expires_at: now - chrono::Duration::seconds(60),
        };
        assert!(!g.is_active(now));
    }

    #[test]
    fn fsm_allows_documented_transitions() {
        use TaskStatus::*;
        assert!(PendingApproval.can_transition_to(ApprovedQueued));
        assert!(PendingApproval.can_transition_to(Denied));
        assert!(PendingApproval.can_transition_to(Error));
        assert!(ApprovedQueued.can_transition_to(Executing));
        assert!(Executing.can_transition_to(Completed));
        assert!(Executing.can_transition_to(Error));
    }

    #[test]
    fn fsm_rejects_undocumented_transitions() {
        use TaskStatus::*;
        assert!(!PendingApproval.can_transition_to(Executing));
        assert!(!PendingApproval.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Executing));
        assert!(!Denied.can_transition_to(ApprovedQueued));
        assert!(!ApprovedQueued.can_transition_to(PendingApproval));
    }

    #[test]
    fn terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Denied.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert!(!TaskStatus::PendingApproval.is_terminal());
        assert!(!TaskStatus::ApprovedQueued.is_terminal());
        assert!(!TaskStatus::Executing.is_terminal());
    }

    #[test]
    fn task_new_starts_pending_approval() {
        let t = Task::new(
            "fs/read",
            serde_json::json!({}),
            serde_json::json!({}),
            PolicyAction::RequireApproval,
        );
        assert_eq!(t.status, TaskStatus::PendingApproval);
        assert!(t.result.is_none());
        assert!(t.error.is_none());
    }

    #[test]
    fn policy_action_serde_is_kebab_case() {
        let json = serde_json::to_string(&PolicyAction::RequireApproval).unwrap();
        assert_eq!(json, "\"require-approval\"");
    }
}
