//! Request Pipeline — orchestrates the Anonymizer, Policy Resolver, Task
//! Manager, Approval Channel, Router and Audit Sink per `tools/call`, and
//! dispatches the virtual tools that live inside the gateway itself.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use portero_core::error::{Error, Result};
use portero_core::model::{PolicyAction, Task, TaskStatus};
use portero_core::pattern;
use portero_core::tool::{text_content, ToolDefinition};

use crate::aggregator::Aggregator;
use crate::anonymizer::Anonymizer;
use crate::approval::{ActivityNotice, ApprovalChannel};
use crate::audit::{AuditEvent, AuditSink};
use crate::policy::PolicyResolver;
use crate::registry::BackendRegistry;
use crate::router::Router;
use crate::tasks::TaskManager;

pub const SEARCH_TOOLS: &str = "portero/search_tools";
pub const CALL: &str = "portero/call";
pub const CHECK_TASK: &str = "portero/check_task";
pub const LIST_TASKS: &str = "portero/list_tasks";

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("filesystem", &["filesystem", "file", "fs"]),
    ("google", &["google", "gmail", "calendar", "drive"]),
    ("gmail", &["gmail", "email", "mail"]),
    ("calendar", &["calendar", "event"]),
    ("drive", &["drive", "document", "file"]),
    ("email", &["email", "mail", "gmail"]),
    ("stripe", &["stripe", "payment", "invoice", "charge"]),
];

const MAX_LIST_TASKS_LIMIT: usize = 100;
const DEFAULT_LIST_TASKS_LIMIT: usize = 20;

pub fn virtual_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: SEARCH_TOOLS.into(),
            description: "Search the full tool catalog by query or category".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "query": {"type": "string"}, "category": {"type": "string"} }
            }),
        },
        ToolDefinition {
            name: CALL.into(),
            description: "Call any tool by its full namespaced name".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "tool": {"type": "string"}, "args": {"type": "object"} },
                "required": ["tool"]
            }),
        },
        ToolDefinition {
            name: CHECK_TASK.into(),
            description: "Retrieve a task's status or final result".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "task_id": {"type": "string"} },
                "required": ["task_id"]
            }),
        },
        ToolDefinition {
            name: LIST_TASKS.into(),
            description: "Summarize tasks, optionally filtered by status".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "status": {"type": "string"}, "limit": {"type": "integer"} }
            }),
        },
    ]
}

pub fn is_virtual_tool(name: &str) -> bool {
    matches!(name, SEARCH_TOOLS | CALL | CHECK_TASK | LIST_TASKS)
}

pub struct Pipeline {
    registry: Arc<BackendRegistry>,
    anonymizer: Arc<Anonymizer>,
    policy: Arc<PolicyResolver>,
    approval: Arc<ApprovalChannel>,
    tasks: Arc<TaskManager>,
    audit: Arc<dyn AuditSink>,
}

impl Pipeline {
    pub fn new(
        registry: Arc<BackendRegistry>,
        anonymizer: Arc<Anonymizer>,
        policy: Arc<PolicyResolver>,
        approval: Arc<ApprovalChannel>,
        tasks: Arc<TaskManager>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { registry, anonymizer, policy, approval, tasks, audit }
    }

    /// `tools/list`: the filtered aggregate prepended with the virtual
    /// tools.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut tools = virtual_tool_definitions();
        tools.extend(Aggregator::filtered(&self.registry));
        tools
    }

    pub async fn list_resources(&self, backend_id: &str) -> Result<Value> {
        Router::list_resources(&self.registry, backend_id).await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Value> {
        Router::read_resource(&self.registry, uri).await
    }

    /// `tools/call`: virtual tool dispatch, or the full anonymize ->
    /// policy -> route/park pipeline.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<Value> {
        match name {
            SEARCH_TOOLS => Ok(self.search_tools(&args)),
            CALL => self.call_virtual_delegate(&args).await,
            CHECK_TASK => self.check_task(&args),
            LIST_TASKS => Ok(self.list_tasks(&args)),
            _ => self.dispatch(name, args).await,
        }
    }

    fn search_tools(&self, args: &Value) -> Value {
        let query = args.get("query").and_then(Value::as_str);
        let category = args.get("category").and_then(Value::as_str);
        let catalog = Aggregator::unfiltered(&self.registry);

        let matches_query = |tool: &ToolDefinition| -> bool {
            query.map(|q| {
                let q = q.to_lowercase();
                tool.name.to_lowercase().contains(&q) || tool.description.to_lowercase().contains(&q)
            })
            .unwrap_or(true)
        };
        let matches_category = |tool: &ToolDefinition| -> bool {
            let Some(cat) = category else { return true };
            let cat_lower = cat.to_lowercase();
            let keywords = CATEGORY_KEYWORDS
                .iter()
                .find(|(key, _)| *key == cat_lower)
                .map(|(_, kw)| *kw)
                .unwrap_or(&[]);
            let haystack = format!("{} {}", tool.name, tool.description).to_lowercase();
            if keywords.is_empty() {
                haystack.contains(&cat_lower)
            } else {
                keywords.iter().any(|k| haystack.contains(*k))
            }
        };

        let results: Vec<Value> = catalog
            .iter()
            .filter(|t| matches_query(t) && matches_category(t))
            .map(|t| serde_json::json!({ "name": t.name, "description": t.description }))
            .collect();

        text_content(
            serde_json::json!({ "count": results.len(), "tools": results }).to_string(),
        )
    }

    async fn call_virtual_delegate(&self, args: &Value) -> Result<Value> {
        let tool = args
            .get("tool")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Other("portero/call requires a `tool` argument".into()))?;
        let inner_args = args.get("args").cloned().unwrap_or_else(|| serde_json::json!({}));
        self.call_tool(tool, inner_args).await
    }

    fn check_task(&self, args: &Value) -> Result<Value> {
        let task_id = args
            .get("task_id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Other("portero/check_task requires a `task_id` argument".into()))?;
        let Ok(id) = task_id.parse::<Uuid>() else {
            return Ok(text_content(serde_json::json!({ "status": "not-found", "taskId": task_id }).to_string()));
        };
        let Some(task) = self.tasks.get(&id) else {
            return Ok(text_content(serde_json::json!({ "status": "not-found", "taskId": task_id }).to_string()));
        };
        let _ = self.tasks.mark_checked(&id);

        if task.status == TaskStatus::Completed {
            return Ok(task.result.unwrap_or_else(|| serde_json::json!(null)));
        }
        Ok(text_content(
            serde_json::json!({
                "status": task.status,
                "taskId": task.id,
                "toolName": task.tool_name,
                "error": task.error,
            })
            .to_string(),
        ))
    }

    fn list_tasks(&self, args: &Value) -> Value {
        let status = args
            .get("status")
            .and_then(Value::as_str)
            .and_then(|s| serde_json::from_value::<TaskStatus>(serde_json::json!(s)).ok());
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map(|n| (n as usize).min(MAX_LIST_TASKS_LIMIT))
            .unwrap_or(DEFAULT_LIST_TASKS_LIMIT);

        let summaries: Vec<Value> = self
            .tasks
            .list(status, limit)
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "taskId": t.id,
                    "toolName": t.tool_name,
                    "status": t.status,
                    "createdAt": t.created_at,
                })
            })
            .collect();

        text_content(serde_json::json!({ "count": summaries.len(), "tasks": summaries }).to_string())
    }

    async fn dispatch(&self, name: &str, args: Value) -> Result<Value> {
        let real_args = self.anonymizer.anonymize_inbound(&args);
        let dynamic_rules = self.approval.list_rules();
        let decision = self.policy.resolve(name, &dynamic_rules);
        let has_grant = self
            .approval
            .active_grants()
            .iter()
            .any(|g| pattern::matches(name, &g.pattern));

        match decision.action {
            PolicyAction::Deny => {
                let message = format!("denied by policy: {name}");
                let _ = self.audit.record(AuditEvent::new(name).with_error(message.clone())).await;
                self.approval.notify(ActivityNotice {
                    status: "blocked".into(),
                    tool_name: name.to_string(),
                    reason: Some("policy".into()),
                });
                Err(Error::PolicyDenied(message))
            }
            PolicyAction::RequireApproval if !has_grant => {
                self.park_as_task(name, real_args, args, decision.action).await
            }
            _ => self.dispatch_and_finalize(name, real_args, args).await,
        }
    }

    async fn park_as_task(&self, name: &str, real_args: Value, original_args: Value, action: PolicyAction) -> Result<Value> {
        let task = self.tasks.create(name, real_args, original_args, action)?;
        if let Err(e) = self.approval.request_approval(&task).await {
            tracing::warn!(task_id = %task.id, error = %e, "approval send failed, moving task to error");
            let _ = self.tasks.set_error(&task.id, format!("approval send failed: {e}"));
        }
        Ok(text_content(
            serde_json::json!({
                "status": "pending-approval",
                "taskId": task.id,
                "toolName": name,
                "message": "awaiting admin approval",
            })
            .to_string(),
        ))
    }

    async fn dispatch_and_finalize(&self, name: &str, real_args: Value, _original_args: Value) -> Result<Value> {
        let result = Router::dispatch_call(&self.registry, name, real_args).await;
        match result {
            Ok(call_result) => {
                self.registry.mark_used(name);
                let raw = serde_json::to_value(&call_result)?;
                let outbound = self.anonymizer.anonymize_outbound(&raw);
                let _ = self.audit.record(AuditEvent::new(name)).await;
                self.approval.notify(ActivityNotice { status: "allowed".into(), tool_name: name.to_string(), reason: None });
                Ok(outbound)
            }
            Err(e) => {
                let _ = self.audit.record(AuditEvent::new(name).with_error(e.to_string())).await;
                self.approval.notify(ActivityNotice { status: "error".into(), tool_name: name.to_string(), reason: Some(e.to_string()) });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(unused_imports)]
mod tests {
    use super::*;
    use crate::approval::NullTransport;
    use crate::store::{JsonDocStore, SingleDocStore};
    use portero_core::config::PolicyConfig;

    fn pipeline() -> (Pipeline, tempfile::TempDir) {
        pipeline_with_policy(PolicyConfig::default())
    }

    fn pipeline_with_policy(policy_config: PolicyConfig) -> (Pipeline, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(BackendRegistry::empty());
        let anonymizer = Arc::new(Anonymizer::new(vec![]));
        let policy = Arc::new(PolicyResolver::new(policy_config));
        let task_manager = TaskManager::new(JsonDocStore::open(dir.path().join("tasks.json")).unwrap());
        let tasks = Arc::new(task_manager.clone());
        let approval = Arc::new(ApprovalChannel::new(
            SingleDocStore::open(dir.path().join("admin.json")).unwrap(),
            JsonDocStore::open(dir.path().join("grants.json")).unwrap(),
            JsonDocStore::open(dir.path().join("rules.json")).unwrap(),
            task_manager,
            Box::new(NullTransport),
            25,
        ));
        let audit: Arc<dyn AuditSink> = Arc::new(crate::audit::FileAuditSink::new(dir.path().join("audit.jsonl")));
        (Pipeline::new(registry, anonymizer, policy, approval, tasks, audit), dir)
    }

    #[test]
    fn list_tools_prepends_virtual_tools() {
        let (pipe, _dir) = pipeline();
        let tools = pipe.list_tools();
        assert!(tools.iter().any(|t| t.name == SEARCH_TOOLS));
        assert!(tools.iter().any(|t| t.name == CALL));
        assert!(tools.iter().any(|t| t.name == CHECK_TASK));
        assert!(tools.iter().any(|t| t.name == LIST_TASKS));
    }

    #[tokio::test]
    async fn deny_policy_raises_error_and_no_task_is_created() {
        use portero_core::config::PolicyConfigEntry;
        let (pipe, _dir) = pipeline_with_policy(PolicyConfig {
            default_action: PolicyAction::Allow,
            entries: vec![PolicyConfigEntry { pattern: "filesystem/delete_file".into(), action: PolicyAction::Deny }],
        });
        let result = pipe.call_tool("filesystem/delete_file", serde_json::json!({})).await;
        assert!(matches!(result, Err(Error::PolicyDenied(_))));
        let tasks = pipe.tasks.list(None, 10);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_tool_parks_as_task_under_default_require_approval() {
        let (pipe, _dir) = pipeline();
        let result = pipe.call_tool("ghost/delete_file", serde_json::json!({})).await.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["status"], "pending-approval");
    }

    #[tokio::test]
    async fn check_task_on_unknown_id_returns_structured_not_found() {
        let (pipe, _dir) = pipeline();
        let result = pipe
            .call_tool(CHECK_TASK, serde_json::json!({ "task_id": Uuid::new_v4().to_string() }))
            .await
            .unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["status"], "not-found");
    }

    #[tokio::test]
    async fn check_task_on_malformed_id_returns_structured_not_found() {
        let (pipe, _dir) = pipeline();
        let result = pipe.call_tool(CHECK_TASK, serde_json::json!({ "task_id": "not-a-uuid" })).await.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["status"], "not-found");
    }

    #[tokio::test]
    async fn require_approval_parks_task_and_returns_pending_envelope() {
        let (pipe, _dir) = pipeline();
        let result = pipe.call_tool("github/create_pull_request", serde_json::json!({"title": "x"})).await.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["status"], "pending-approval");
        assert_eq!(parsed["toolName"], "github/create_pull_request");
        assert!(parsed["taskId"].is_string());
    }

    #[tokio::test]
    async fn list_tasks_returns_count_and_summaries() {
        let (pipe, _dir) = pipeline();
        pipe.call_tool("github/create_pull_request", serde_json::json!({})).await.unwrap();
        let result = pipe.call_tool(LIST_TASKS, serde_json::json!({})).await.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["count"], 1);
    }

    #[test]
    fn search_tools_category_keyword_matches_description() {
        let (pipe, _dir) = pipeline();
        let args = serde_json::json!({ "category": "stripe" });
        let result = pipe.search_tools(&args);
        let text = result["content"][0]["text"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["count"], 0);
    }
}
