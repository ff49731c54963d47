//! Backend manager — holds all backend connections and orchestrates tool
//! discovery and dispatch.

use std::collections::HashMap;

use serde_json::Value;

use portero_core::config::{BackendConfig, BackendTransportKind};
use crate::protocol::{self, McpToolDef, ToolCallResult, ToolsListResult};
use crate::transport::{BackendTransport, SseTransport, StdioTransport, TransportError};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BackendConnection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A connection to one configured backend.
pub struct BackendConnection {
    /// Backend ID from config.
    pub id: String,
    /// Tools discovered via `tools/list`, unfiltered.
    pub tools: Vec<McpToolDef>,
    /// Configured pinned tool set, if any. Visibility filtering on this is
    /// the Aggregator's job, not the manager's — the manager always
    /// discovers and exposes the backend's full catalog.
    pub pinned_tools: Option<Vec<String>>,
    /// Handle to the running process or remote connection.
    transport: Box<dyn BackendTransport>,
}

impl BackendConnection {
    /// Initialize a connection: spawn the process (or connect remotely),
    /// perform the handshake, and discover tools.
    async fn initialize(config: &BackendConfig) -> Result<Self, BackendError> {
        let transport: Box<dyn BackendTransport> = match config.transport {
            BackendTransportKind::Stdio => {
                let t = StdioTransport::spawn(config).map_err(BackendError::Transport)?;
                Box::new(t)
            }
            BackendTransportKind::Sse => {
                tracing::warn!(
                    backend_id = %config.id,
                    "SSE transport is not yet implemented, backend will be non-functional"
                );
                Box::new(SseTransport)
            }
        };

        let init_params = protocol::initialize_params();
        let params_value = serde_json::to_value(&init_params)
            .map_err(|e| BackendError::Protocol(format!("failed to serialize initialize params: {e}")))?;

        let resp = transport
            .send_request("initialize", Some(params_value))
            .await
            .map_err(BackendError::Transport)?;

        if resp.is_error() {
            let err = resp.error.unwrap();
            return Err(BackendError::Protocol(format!("initialize failed: {err}")));
        }

        tracing::debug!(backend_id = %config.id, "initialize response received");

        transport
            .send_notification("notifications/initialized")
            .await
            .map_err(BackendError::Transport)?;

        tracing::debug!(backend_id = %config.id, "sent notifications/initialized");

        let tools_resp = transport
            .send_request("tools/list", None)
            .await
            .map_err(BackendError::Transport)?;

        let tools = if tools_resp.is_error() {
            tracing::warn!(
                backend_id = %config.id,
                "tools/list returned error, backend will have no tools"
            );
            Vec::new()
        } else {
            let result_value = tools_resp.result.unwrap_or(Value::Null);
            match serde_json::from_value::<ToolsListResult>(result_value) {
                Ok(r) => r.tools,
                Err(e) => {
                    tracing::warn!(
                        backend_id = %config.id,
                        error = %e,
                        "failed to parse tools/list result"
                    );
                    Vec::new()
                }
            }
        };

        tracing::info!(
            backend_id = %config.id,
            tool_count = tools.len(),
            "backend initialized"
        );

        Ok(Self {
            id: config.id.clone(),
            tools,
            pinned_tools: config.pinned_tools.clone(),
            transport,
        })
    }

    /// Check if the backend's transport is still alive.
    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    /// Call a tool on this backend.
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<ToolCallResult, BackendError> {
        if !self.transport.is_alive() {
            return Err(BackendError::BackendDown(self.id.clone()));
        }

        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments
        });

        let resp = self
            .transport
            .send_request("tools/call", Some(params))
            .await
            .map_err(BackendError::Transport)?;

        if resp.is_error() {
            let err = resp.error.unwrap();
            return Err(BackendError::Protocol(format!("tools/call failed: {err}")));
        }

        let result_value = resp.result.unwrap_or(Value::Null);
        serde_json::from_value::<ToolCallResult>(result_value)
            .map_err(|e| BackendError::Protocol(format!("failed to parse tools/call result: {e}")))
    }

    /// List this backend's resources.
    pub async fn list_resources(&self) -> Result<Value, BackendError> {
        if !self.transport.is_alive() {
            return Err(BackendError::BackendDown(self.id.clone()));
        }
        let resp = self
            .transport
            .send_request("resources/list", None)
            .await
            .map_err(BackendError::Transport)?;
        if resp.is_error() {
            let err = resp.error.unwrap();
            return Err(BackendError::Protocol(format!("resources/list failed: {err}")));
        }
        Ok(resp.result.unwrap_or(Value::Null))
    }

    /// Read a single resource by its original (un-prefixed) URI.
    pub async fn read_resource(&self, uri: &str) -> Result<Value, BackendError> {
        if !self.transport.is_alive() {
            return Err(BackendError::BackendDown(self.id.clone()));
        }
        let params = serde_json::json!({ "uri": uri });
        let resp = self
            .transport
            .send_request("resources/read", Some(params))
            .await
            .map_err(BackendError::Transport)?;
        if resp.is_error() {
            let err = resp.error.unwrap();
            return Err(BackendError::Protocol(format!("resources/read failed: {err}")));
        }
        Ok(resp.result.unwrap_or(Value::Null))
    }

    /// Gracefully shut down the backend.
    async fn shutdown(&self) {
        tracing::info!(backend_id = %self.id, "shutting down backend");
        self.transport.shutdown().await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BackendManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all backend connections keyed by backend id.
pub struct BackendManager {
    backends: HashMap<String, BackendConnection>,
}

impl BackendManager {
    /// Create an empty manager (no backends configured).
    pub fn empty() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Initialize from config: spawn processes, handshake, discover tools.
    ///
    /// Backends that fail to initialize are logged and skipped, not fatal.
    pub async fn from_config(configs: &[BackendConfig]) -> Self {
        let mut backends = HashMap::new();

        for backend_config in configs {
            tracing::info!(
                backend_id = %backend_config.id,
                command = %backend_config.command,
                transport = ?backend_config.transport,
                "initializing backend"
            );

            match BackendConnection::initialize(backend_config).await {
                Ok(conn) => {
                    backends.insert(backend_config.id.clone(), conn);
                }
                Err(e) => {
                    tracing::warn!(
                        backend_id = %backend_config.id,
                        error = %e,
                        "failed to initialize backend, skipping"
                    );
                }
            }
        }

        if !backends.is_empty() {
            tracing::info!(count = backends.len(), "backend manager ready");
        }

        Self { backends }
    }

    /// Get all discovered tools across all backends.
    ///
    /// Returns tuples of `(backend_id, tool_def)`.
    pub fn list_tools(&self) -> Vec<(&str, &McpToolDef)> {
        self.backends
            .values()
            .filter(|b| b.is_alive())
            .flat_map(|backend| backend.tools.iter().map(move |tool| (backend.id.as_str(), tool)))
            .collect()
    }

    /// The configured pinned tool set for `backend_id`, if any. `None`
    /// means unconfigured (not "pinned to nothing"); `Some(&[])` would mean
    /// pinned to an empty set.
    pub fn pinned_tools(&self, backend_id: &str) -> Option<&Vec<String>> {
        self.backends.get(backend_id)?.pinned_tools.as_ref()
    }

    /// Call a tool on a specific backend.
    pub async fn call_tool(
        &self,
        backend_id: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, BackendError> {
        let backend = self
            .backends
            .get(backend_id)
            .ok_or_else(|| BackendError::BackendNotFound(backend_id.to_string()))?;

        backend.call_tool(tool_name, arguments).await
    }

    /// List resources on a specific backend.
    pub async fn list_resources(&self, backend_id: &str) -> Result<Value, BackendError> {
        let backend = self
            .backends
            .get(backend_id)
            .ok_or_else(|| BackendError::BackendNotFound(backend_id.to_string()))?;
        backend.list_resources().await
    }

    /// Read a resource on a specific backend.
    pub async fn read_resource(&self, backend_id: &str, uri: &str) -> Result<Value, BackendError> {
        let backend = self
            .backends
            .get(backend_id)
            .ok_or_else(|| BackendError::BackendNotFound(backend_id.to_string()))?;
        backend.read_resource(uri).await
    }

    /// Return the number of connected backends.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Return the total number of discovered tools across all alive backends.
    pub fn tool_count(&self) -> usize {
        self.backends.values().filter(|b| b.is_alive()).map(|b| b.tools.len()).sum()
    }

    /// Check if there are any configured backends.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Gracefully shut down all backends concurrently.
    pub async fn shutdown(&self) {
        let futs: Vec<_> = self.backends.values().map(|b| b.shutdown()).collect();
        futures_util::future::join_all(futs).await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors specific to backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("backend protocol error: {0}")]
    Protocol(String),

    #[error("backend not found: {0}")]
    BackendNotFound(String),

    #[error("backend is down: {0}")]
    BackendDown(String),
}

impl From<BackendError> for portero_core::error::Error {
    fn from(e: BackendError) -> Self {
        portero_core::error::Error::Backend(e.to_string())
    }
}
