use std::sync::Arc;

use portero_core::config::Config;

use crate::anonymizer::Anonymizer;
use crate::approval::ApprovalChannel;
use crate::audit::AuditSink;
use crate::executor::Executor;
use crate::pipeline::Pipeline;
use crate::policy::PolicyResolver;
use crate::registry::BackendRegistry;
use crate::tasks::TaskManager;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services** — config
/// - **Request pipeline** — registry, anonymizer, policy, tasks, approval,
///   executor, audit, all wired together as `pipeline`
/// - **Security** — the bearer-token hash computed once at startup
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Request pipeline components ───────────────────────────────────
    pub registry: Arc<BackendRegistry>,
    pub anonymizer: Arc<Anonymizer>,
    pub policy: Arc<PolicyResolver>,
    pub tasks: Arc<TaskManager>,
    pub approval: Arc<ApprovalChannel>,
    pub executor: Arc<Executor>,
    pub audit: Arc<dyn AuditSink>,
    pub pipeline: Arc<Pipeline>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
