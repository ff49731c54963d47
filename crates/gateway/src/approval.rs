//! Approval Channel — out-of-band approval UI: render a request, collect
//! the admin's decision, surface activity as a batched digest.
//!
//! The channel never blocks a held request on a human decision (see the
//! design notes on the earlier, rejected poll-in-a-loop approach). It
//! records a message handle on the task and returns; [`ApprovalChannel::decide`]
//! is the separate entry point a chat transport calls once the decision
//! arrives.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use portero_core::error::{Error, Result};
use portero_core::model::{AdminPairing, DynamicRule, Grant, PolicyAction, Task, TaskStatus};

use crate::store::{HasId, JsonDocStore, SingleDocStore};
use crate::tasks::TaskManager;

impl HasId for Grant {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl HasId for DynamicRule {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A rendered message handed to the chat transport. Kept as a plain string
/// body — formatting (§6's type-aware rendering) happens before this point.
#[derive(Debug, Clone)]
pub struct Message {
    pub body: String,
}

impl Message {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// Seam between the Approval Channel and whatever chat-bot library actually
/// ships bytes to the admin. Out of scope per the system's purpose — only
/// the trait and a logging default live here.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, principal_hint: &str, message: Message) -> Result<()>;
}

/// Default transport for a configuration with no chat backend wired up:
/// logs the message instead of delivering it anywhere.
pub struct NullTransport;

#[async_trait]
impl ChatTransport for NullTransport {
    async fn send(&self, principal_hint: &str, message: Message) -> Result<()> {
        tracing::info!(principal = principal_hint, body = %message.body, "approval channel (null transport)");
        Ok(())
    }
}

/// The decision a paired admin can render on a pending task, including the
/// optional side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Deny,
    ApproveWithGrantShort,
    ApproveWithGrantLong,
    ApproveAlwaysAllowTool,
    DenyAlwaysDenyTool,
}

impl Decision {
    fn approves(self) -> bool {
        !matches!(self, Decision::Deny | Decision::DenyAlwaysDenyTool)
    }
}

fn grant_short() -> ChronoDuration {
    ChronoDuration::minutes(15)
}
fn grant_long() -> ChronoDuration {
    ChronoDuration::hours(8)
}

/// One notice queued for the next activity-digest flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityNotice {
    pub status: String,
    pub tool_name: String,
    pub reason: Option<String>,
}

pub struct ApprovalChannel {
    admin_pairing: SingleDocStore<AdminPairing>,
    grants: JsonDocStore<Grant>,
    rules: JsonDocStore<DynamicRule>,
    tasks: TaskManager,
    transport: Box<dyn ChatTransport>,
    digest_queue: Mutex<VecDeque<ActivityNotice>>,
    digest_max_per_flush: usize,
}

impl ApprovalChannel {
    pub fn new(
        admin_pairing: SingleDocStore<AdminPairing>,
        grants: JsonDocStore<Grant>,
        rules: JsonDocStore<DynamicRule>,
        tasks: TaskManager,
        transport: Box<dyn ChatTransport>,
        digest_max_per_flush: usize,
    ) -> Self {
        Self {
            admin_pairing,
            grants,
            rules,
            tasks,
            transport,
            digest_queue: Mutex::new(VecDeque::new()),
            digest_max_per_flush,
        }
    }

    pub fn is_paired(&self) -> bool {
        self.admin_pairing.get().admin_chat_id.is_some()
    }

    fn admin_chat_id(&self) -> Option<String> {
        self.admin_pairing.get().admin_chat_id
    }

    /// An unpaired channel accepts pairing from any principal; a paired one
    /// accepts commands only from the bound principal.
    pub fn authorize(&self, principal: &str) -> Result<()> {
        match self.admin_chat_id() {
            Some(admin) if admin == principal => Ok(()),
            Some(_) => Err(Error::Auth("principal is not the paired admin".into())),
            None => Err(Error::Auth("no admin paired yet".into())),
        }
    }

    /// `pair(secret)`: succeeds once, binding `principal` as the admin.
    /// Re-pairing an already-paired channel is rejected.
    pub fn pair(&self, principal: &str, provided_secret: &str, configured_secret: &str) -> Result<()> {
        if self.is_paired() {
            return Err(Error::Auth("channel is already paired".into()));
        }
        if provided_secret != configured_secret {
            return Err(Error::Auth("invalid pairing secret".into()));
        }
        self.admin_pairing.update(|p| p.admin_chat_id = Some(principal.to_string()))?;
        Ok(())
    }

    /// Render and send an approval request for a newly created task,
    /// recording the transport's message handle onto it.
    pub async fn request_approval(&self, task: &Task) -> Result<()> {
        let Some(admin) = self.admin_chat_id() else {
            return Err(Error::ApprovalChannel("no admin paired, cannot request approval".into()));
        };
        let body = render_approval_request(task);
        self.transport.send(&admin, Message::new(body)).await?;
        let handle = format!("{}:{}", admin, task.id);
        self.tasks.set_approval_handle(&task.id, handle)?;
        Ok(())
    }

    /// Decision ingestion. Idempotent: a second decision on an
    /// already-resolved task is rejected, not silently accepted.
    pub async fn decide(&self, task_id: Uuid, principal: &str, decision: Decision) -> Result<Task> {
        self.authorize(principal)?;

        let task = self.tasks.get(&task_id).ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
        if task.status != TaskStatus::PendingApproval {
            return Err(Error::ApprovalChannel(format!(
                "task {task_id} already processed (status = {:?})",
                task.status
            )));
        }

        let updated = if decision.approves() {
            self.apply_side_effect(&task, decision)?;
            self.tasks.transition_to(&task_id, TaskStatus::ApprovedQueued)?
        } else {
            self.apply_side_effect(&task, decision)?;
            self.tasks.transition_to(&task_id, TaskStatus::Denied)?
        };

        Ok(updated)
    }

    fn apply_side_effect(&self, task: &Task, decision: Decision) -> Result<()> {
        match decision {
            Decision::ApproveWithGrantShort => {
                self.create_grant(task.tool_name.clone(), grant_short())?;
            }
            Decision::ApproveWithGrantLong => {
                self.create_grant(task.tool_name.clone(), grant_long())?;
            }
            Decision::ApproveAlwaysAllowTool => {
                self.upsert_rule(task.tool_name.clone(), PolicyAction::Allow)?;
            }
            Decision::DenyAlwaysDenyTool => {
                self.upsert_rule(task.tool_name.clone(), PolicyAction::Deny)?;
            }
            Decision::Approve | Decision::Deny => {}
        }
        Ok(())
    }

    pub fn create_grant(&self, pattern: impl Into<String>, ttl: ChronoDuration) -> Result<Grant> {
        let now = Utc::now();
        self.grants.create(Grant {
            id: Uuid::new_v4(),
            pattern: pattern.into(),
            created_at: now,
            expires_at: now + ttl,
        })
    }

    pub fn revoke_grant(&self, id: &Uuid) -> Result<bool> {
        self.grants.remove(id)
    }

    pub fn active_grants(&self) -> Vec<Grant> {
        let now = Utc::now();
        self.grants.list(|g| g.is_active(now), usize::MAX)
    }

    /// Remove grants whose `expires_at` has passed. Tasks have no expiry
    /// under the task-FSM model (approval waits indefinitely), so this is
    /// the Cleanup Loop's only real work.
    pub fn remove_expired_grants(&self) -> Result<usize> {
        let now = Utc::now();
        let expired = self.grants.list(|g| !g.is_active(now), usize::MAX);
        for g in &expired {
            self.grants.remove(&g.id)?;
        }
        Ok(expired.len())
    }

    /// Exactly one dynamic rule exists per pattern at any time: the most
    /// recent `upsert` wins.
    pub fn upsert_rule(&self, pattern: impl Into<String>, action: PolicyAction) -> Result<DynamicRule> {
        let pattern = pattern.into();
        if let Some(existing) = self.rules.list(|r| r.pattern == pattern, 1).into_iter().next() {
            self.rules.remove(&existing.id)?;
        }
        self.rules.create(DynamicRule {
            id: Uuid::new_v4(),
            pattern,
            action,
            created_at: Utc::now(),
        })
    }

    pub fn remove_rule(&self, id: &Uuid) -> Result<bool> {
        self.rules.remove(id)
    }

    pub fn list_rules(&self) -> Vec<DynamicRule> {
        self.rules.list(|_| true, usize::MAX)
    }

    /// Queue an execution notice for the next digest flush.
    pub fn notify(&self, notice: ActivityNotice) {
        self.digest_queue.lock().push_back(notice);
    }

    /// Flush up to `digest_max_per_flush` queued notices as one message,
    /// grouped by `(status, toolName, reason)`. No-op if nothing is queued.
    pub async fn flush_digest(&self) -> Result<()> {
        let Some(admin) = self.admin_chat_id() else {
            self.digest_queue.lock().clear();
            return Ok(());
        };

        let batch: Vec<ActivityNotice> = {
            let mut queue = self.digest_queue.lock();
            let take = queue.len().min(self.digest_max_per_flush);
            queue.drain(..take).collect()
        };
        if batch.is_empty() {
            return Ok(());
        }

        let body = render_digest(&batch);
        self.transport.send(&admin, Message::new(body)).await
    }
}

fn render_approval_request(task: &Task) -> String {
    format!(
        "Approval requested for {} (task {})\n{}\nchoices: approve | deny | approve+grant-short | approve+grant-long | approve+always-allow-tool | deny+always-deny-tool",
        task.tool_name, task.id, render_args(&task.original_args)
    )
}

/// Type-aware rendering of a call's arguments for the admin-facing approval
/// message. Recognizes a handful of common shapes by their distinguished
/// fields; anything else falls back to a generic key-value summary.
fn render_args(args: &serde_json::Value) -> String {
    let Some(obj) = args.as_object() else {
        return format!("args: {args}");
    };

    render_email(obj)
        .or_else(|| render_calendar_event(obj))
        .or_else(|| render_source_control(obj))
        .or_else(|| render_payment(obj))
        .or_else(|| render_file_operation(obj))
        .unwrap_or_else(|| render_generic(obj))
}

fn render_email(obj: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    if !obj.contains_key("to") || !(obj.contains_key("subject") || obj.contains_key("body")) {
        return None;
    }
    let mut fields = Vec::new();
    for key in ["to", "cc", "bcc", "subject"] {
        if let Some(v) = field(obj, key, usize::MAX) {
            fields.push(format!("{key}: {v}"));
        }
    }
    if let Some(v) = field(obj, "body", 800) {
        fields.push(format!("body: {v}"));
    }
    Some(format!("email — {}", fields.join(", ")))
}

fn render_calendar_event(obj: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    if !obj.contains_key("summary") || !(obj.contains_key("start") || obj.contains_key("end")) {
        return None;
    }
    let mut fields = Vec::new();
    for key in ["summary", "start", "end", "attendees", "location"] {
        if let Some(v) = field(obj, key, usize::MAX) {
            fields.push(format!("{key}: {v}"));
        }
    }
    if let Some(v) = field(obj, "description", 800) {
        fields.push(format!("description: {v}"));
    }
    Some(format!("calendar event — {}", fields.join(", ")))
}

fn render_source_control(obj: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    if !obj.contains_key("owner") || !obj.contains_key("repo") {
        return None;
    }
    let mut fields = Vec::new();
    for key in ["owner", "repo", "title", "branch", "head", "base"] {
        if let Some(v) = field(obj, key, usize::MAX) {
            fields.push(format!("{key}: {v}"));
        }
    }
    if let Some(v) = field(obj, "body", 800) {
        fields.push(format!("body: {v}"));
    }
    Some(format!("source-control action — {}", fields.join(", ")))
}

fn render_payment(obj: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    if !obj.contains_key("amount") || !obj.contains_key("currency") {
        return None;
    }
    let mut fields = Vec::new();
    for key in ["amount", "currency", "customer", "description", "email", "name"] {
        if let Some(v) = field(obj, key, 200) {
            fields.push(format!("{key}: {v}"));
        }
    }
    Some(format!("payment — {}", fields.join(", ")))
}

fn render_file_operation(obj: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    if !obj.contains_key("path") && !obj.contains_key("destination") {
        return None;
    }
    let mut fields = Vec::new();
    for key in ["path", "destination"] {
        if let Some(v) = field(obj, key, usize::MAX) {
            fields.push(format!("{key}: {v}"));
        }
    }
    if let Some(content) = obj.get("content").and_then(|v| v.as_str()) {
        fields.push(format!("content-length: {}", content.len()));
    }
    Some(format!("file operation — {}", fields.join(", ")))
}

/// Fallback for shapes with no recognized family: first 8 fields in
/// insertion order, values truncated at 200 chars.
fn render_generic(obj: &serde_json::Map<String, serde_json::Value>) -> String {
    let fields: Vec<String> = obj
        .iter()
        .take(8)
        .map(|(k, v)| format!("{k}: {}", truncate(&value_display(v), 200)))
        .collect();
    format!("args — {}", fields.join(", "))
}

fn field(obj: &serde_json::Map<String, serde_json::Value>, key: &str, max_len: usize) -> Option<String> {
    obj.get(key).map(|v| truncate(&value_display(v), max_len))
}

fn value_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truncate to at most `max_len` chars on a char boundary, appending `…`
/// when truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_len).collect();
    out.push('…');
    out
}

fn render_digest(notices: &[ActivityNotice]) -> String {
    let mut grouped: Vec<(&str, &str, Option<&str>, usize)> = Vec::new();
    for n in notices {
        let key = (n.status.as_str(), n.tool_name.as_str(), n.reason.as_deref());
        if let Some(entry) = grouped
            .iter_mut()
            .find(|(s, t, r, _)| *s == key.0 && *t == key.1 && *r == key.2)
        {
            entry.3 += 1;
        } else {
            grouped.push((key.0, key.1, key.2, 1));
        }
    }
    let lines: Vec<String> = grouped
        .into_iter()
        .map(|(status, tool, reason, count)| match reason {
            Some(r) => format!("- {status} {tool} x{count} ({r})"),
            None => format!("- {status} {tool} x{count}"),
        })
        .collect();
    format!("activity digest ({} notices):\n{}", notices.len(), lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use portero_core::model::PolicyAction;
    use std::sync::Arc;
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Arc<TokioMutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        async fn send(&self, principal_hint: &str, message: Message) -> Result<()> {
            self.sent.lock().await.push((principal_hint.to_string(), message.body));
            Ok(())
        }
    }

    fn channel(transport: Box<dyn ChatTransport>) -> (ApprovalChannel, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let chan = ApprovalChannel::new(
            SingleDocStore::open(dir.path().join("admin.json")).unwrap(),
            JsonDocStore::open(dir.path().join("grants.json")).unwrap(),
            JsonDocStore::open(dir.path().join("rules.json")).unwrap(),
            TaskManager::new(JsonDocStore::open(dir.path().join("tasks.json")).unwrap()),
            transport,
            25,
        );
        (chan, dir)
    }

    fn paired_channel() -> (ApprovalChannel, tempfile::TempDir) {
        let (chan, dir) = channel(Box::new(NullTransport));
        chan.pair("admin-1", "secret", "secret").unwrap();
        (chan, dir)
    }

    #[test]
    fn pair_succeeds_once_then_rejects_repair() {
        let (chan, _dir) = channel(Box::new(NullTransport));
        assert!(!chan.is_paired());
        chan.pair("admin-1", "secret", "secret").unwrap();
        assert!(chan.is_paired());
        assert!(chan.pair("admin-2", "secret", "secret").is_err());
    }

    #[test]
    fn pair_rejects_wrong_secret() {
        let (chan, _dir) = channel(Box::new(NullTransport));
        assert!(chan.pair("admin-1", "wrong", "secret").is_err());
        assert!(!chan.is_paired());
    }

    #[test]
    fn authorize_rejects_unpaired_and_non_admin_principals() {
        let (chan, _dir) = paired_channel();
        assert!(chan.authorize("admin-1").is_ok());
        assert!(chan.authorize("someone-else").is_err());
    }

    #[tokio::test]
    async fn request_approval_records_message_handle() {
        let (chan, _dir) = paired_channel();
        let task = chan
            .tasks
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        chan.request_approval(&task).await.unwrap();
        let updated = chan.tasks.get(&task.id).unwrap();
        assert!(updated.approval_message_handle.is_some());
    }

    #[tokio::test]
    async fn request_approval_fails_when_unpaired() {
        let (chan, _dir) = channel(Box::new(NullTransport));
        let task = chan
            .tasks
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        assert!(chan.request_approval(&task).await.is_err());
    }

    #[tokio::test]
    async fn approve_transitions_task_to_approved_queued() {
        let (chan, _dir) = paired_channel();
        let task = chan
            .tasks
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        let updated = chan.decide(task.id, "admin-1", Decision::Approve).await.unwrap();
        assert_eq!(updated.status, TaskStatus::ApprovedQueued);
    }

    #[tokio::test]
    async fn deny_transitions_task_to_denied() {
        let (chan, _dir) = paired_channel();
        let task = chan
            .tasks
            .create("fs/delete_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        let updated = chan.decide(task.id, "admin-1", Decision::Deny).await.unwrap();
        assert_eq!(updated.status, TaskStatus::Denied);
    }

    #[tokio::test]
    async fn re_decision_on_resolved_task_is_rejected() {
        let (chan, _dir) = paired_channel();
        let task = chan
            .tasks
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        chan.decide(task.id, "admin-1", Decision::Approve).await.unwrap();
        let second = chan.decide(task.id, "admin-1", Decision::Deny).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn decide_rejects_non_admin_principal() {
        let (chan, _dir) = paired_channel();
        let task = chan
            .tasks
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        let result = chan.decide(task.id, "intruder", Decision::Approve).await;
        assert!(result.is_err());
        assert_eq!(chan.tasks.get(&task.id).unwrap().status, TaskStatus::PendingApproval);
    }

    #[tokio::test]
    async fn approve_with_grant_short_creates_active_grant() {
        let (chan, _dir) = paired_channel();
        let task = chan
            .tasks
            .create("github/create_pull_request", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        chan.decide(task.id, "admin-1", Decision::ApproveWithGrantShort).await.unwrap();
        let grants = chan.active_grants();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].pattern, "github/create_pull_request");
    }

    #[tokio::test]
    async fn approve_always_allow_tool_upserts_allow_rule() {
        let (chan, _dir) = paired_channel();
        let task = chan
            .tasks
            .create("fs/read_file", serde_json::json!({}), serde_json::json!({}), PolicyAction::RequireApproval)
            .unwrap();
        chan.decide(task.id, "admin-1", Decision::ApproveAlwaysAllowTool).await.unwrap();
        let rules = chan.list_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].action, PolicyAction::Allow);
    }

    #[test]
    fn upsert_rule_replaces_existing_rule_for_same_pattern() {
        let (chan, _dir) = paired_channel();
        chan.upsert_rule("x/y", PolicyAction::Allow).unwrap();
        chan.upsert_rule("x/y", PolicyAction::Deny).unwrap();
        let rules = chan.list_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].action, PolicyAction::Deny);
    }

    #[tokio::test]
    async fn flush_digest_groups_by_status_tool_and_reason() {
        let sent = Arc::new(TokioMutex::new(Vec::new()));
        let (chan, _dir) = channel(Box::new(RecordingTransport { sent: sent.clone() }));
        chan.pair("admin-1", "s", "s").unwrap();
        chan.notify(ActivityNotice { status: "allowed".into(), tool_name: "fs/read_file".into(), reason: None });
        chan.notify(ActivityNotice { status: "allowed".into(), tool_name: "fs/read_file".into(), reason: None });
        chan.notify(ActivityNotice { status: "blocked".into(), tool_name: "fs/delete_file".into(), reason: Some("policy".into()) });
        chan.flush_digest().await.unwrap();
        let messages = sent.lock().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.contains("3 notices"));
        assert!(messages[0].1.contains("allowed fs/read_file x2"));
    }

    #[tokio::test]
    async fn flush_digest_is_noop_when_queue_empty() {
        let sent = Arc::new(TokioMutex::new(Vec::new()));
        let (chan, _dir) = channel(Box::new(RecordingTransport { sent: sent.clone() }));
        chan.pair("admin-1", "s", "s").unwrap();
        chan.flush_digest().await.unwrap();
        assert!(sent.lock().await.is_empty());
    }

    #[test]
    fn remove_expired_grants_keeps_active_ones() {
        let (chan, _dir) = paired_channel();
        chan.create_grant("fs/*", ChronoDuration::minutes(-1)).unwrap();
        let keep = chan.create_grant("gh/*", ChronoDuration::hours(1)).unwrap();
        let removed = chan.remove_expired_grants().unwrap();
        assert_eq!(removed, 1);
        let remaining = chan.active_grants();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[tokio::test]
    async fn flush_digest_respects_max_per_flush() {
        let sent = Arc::new(TokioMutex::new(Vec::new()));
        let (chan, _dir) = channel(Box::new(RecordingTransport { sent: sent.clone() }));
        chan.pair("admin-1", "s", "s").unwrap();
        for i in 0..30 {
            chan.notify(ActivityNotice { status: "allowed".into(), tool_name: format!("fs/t{i}"), reason: None });
        }
        chan.flush_digest().await.unwrap();
        assert_eq!(chan.digest_queue.lock().len(), 5);
    }

    #[test]
    fn render_args_recognizes_email() {
        let args = serde_json::json!({
            "to": "a@example.com",
            "subject": "hi",
            "body": "x".repeat(900),
        });
        let rendered = render_args(&args);
        assert!(rendered.starts_with("email —"));
        assert!(rendered.contains("subject: hi"));
        assert!(rendered.contains('…'));
        assert!(!rendered.contains(&"x".repeat(900)));
    }

    #[test]
    fn render_args_recognizes_calendar_event() {
        let args = serde_json::json!({
            "summary": "standup",
            "start": "2026-01-01T09:00:00Z",
            "end": "2026-01-01T09:30:00Z",
            "attendees": ["a", "b"],
        });
        let rendered = render_args(&args);
        assert!(rendered.starts_with("calendar event —"));
        assert!(rendered.contains("summary: standup"));
    }

    #[test]
    fn render_args_recognizes_source_control() {
        let args = serde_json::json!({
            "owner": "acme",
            "repo": "widgets",
            "title": "fix bug",
            "branch": "fix/bug",
        });
        let rendered = render_args(&args);
        assert!(rendered.starts_with("source-control action —"));
        assert!(rendered.contains("owner: acme"));
        assert!(rendered.contains("repo: widgets"));
    }

    #[test]
    fn render_args_recognizes_payment() {
        let args = serde_json::json!({
            "amount": 4200,
            "currency": "usd",
            "customer": "cus_123",
        });
        let rendered = render_args(&args);
        assert!(rendered.starts_with("payment —"));
        assert!(rendered.contains("amount: 4200"));
    }

    #[test]
    fn render_args_recognizes_file_operation() {
        let args = serde_json::json!({
            "path": "/tmp/a.txt",
            "content": "hello world",
        });
        let rendered = render_args(&args);
        assert!(rendered.starts_with("file operation —"));
        assert!(rendered.contains("path: /tmp/a.txt"));
        assert!(rendered.contains("content-length: 11"));
    }

    #[test]
    fn render_args_falls_back_to_generic_for_unrecognized_shape() {
        let mut fields = serde_json::Map::new();
        for i in 0..10 {
            fields.insert(format!("field{i}"), serde_json::json!(format!("value{i}")));
        }
        let args = serde_json::Value::Object(fields);
        let rendered = render_args(&args);
        assert!(rendered.starts_with("args —"));
        assert!(!rendered.contains("field8"));
        assert!(!rendered.contains("field9"));
    }

    #[test]
    fn render_args_generic_truncates_long_values() {
        let mut fields = serde_json::Map::new();
        fields.insert("note".into(), serde_json::json!("y".repeat(300)));
        let args = serde_json::Value::Object(fields);
        let rendered = render_args(&args);
        assert!(rendered.contains('…'));
        assert!(!rendered.contains(&"y".repeat(300)));
    }
}
