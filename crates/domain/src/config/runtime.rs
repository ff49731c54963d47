use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Aggregator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tuning for the Backend Registry's tool-catalog cache (TTL-bounded,
/// default 60s).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "d_ttl_secs")]
    pub catalog_ttl_secs: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            catalog_ttl_secs: d_ttl_secs(),
        }
    }
}

fn d_ttl_secs() -> u64 {
    60
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cleanup loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tuning for the periodic grant/approval-expiry sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "d_cleanup_interval_secs")]
    pub interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: d_cleanup_interval_secs(),
        }
    }
}

fn d_cleanup_interval_secs() -> u64 {
    60
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Approval channel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tuning for admin pairing, activity-digest batching, and the channel's
/// startup liveness probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Env var holding the one-time pairing secret.
    #[serde(default = "d_pairing_secret_env")]
    pub pairing_secret_env: String,
    /// Activity digest batch window, in seconds (default 3s).
    #[serde(default = "d_digest_batch_window_secs")]
    pub digest_batch_window_secs: u64,
    /// Max notices flushed in a single digest message.
    #[serde(default = "d_digest_max_per_flush")]
    pub digest_max_per_flush: usize,
    /// Liveness-probe timeout on startup (non-fatal).
    #[serde(default = "d_liveness_probe_secs")]
    pub liveness_probe_secs: u64,
    /// Slow-start warning threshold (non-fatal).
    #[serde(default = "d_slow_start_warn_secs")]
    pub slow_start_warn_secs: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            pairing_secret_env: d_pairing_secret_env(),
            digest_batch_window_secs: d_digest_batch_window_secs(),
            digest_max_per_flush: d_digest_max_per_flush(),
            liveness_probe_secs: d_liveness_probe_secs(),
            slow_start_warn_secs: d_slow_start_warn_secs(),
        }
    }
}

fn d_pairing_secret_env() -> String {
    "PORTERO_PAIRING_SECRET".into()
}
fn d_digest_batch_window_secs() -> u64 {
    3
}
fn d_digest_max_per_flush() -> usize {
    25
}
fn d_liveness_probe_secs() -> u64 {
    5
}
fn d_slow_start_warn_secs() -> u64 {
    30
}
