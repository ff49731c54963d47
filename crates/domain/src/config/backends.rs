use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backends
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One configured backend (a `[[backends]]` table entry). `${VAR}`
/// placeholders in `command`, `args`, and `env` are substituted from the
/// process environment at startup; a backend with an unresolved
/// placeholder is skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Registry key — the `backend` half of `backend/local-name`.
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub transport: BackendTransportKind,
    pub url: Option<String>,
    /// Configured pinned tool set for the Aggregator's filtered view.
    /// Absent means "no pinning — always include this backend's tools".
    #[serde(default)]
    pub pinned_tools: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendTransportKind {
    #[default]
    Stdio,
    Sse,
}
