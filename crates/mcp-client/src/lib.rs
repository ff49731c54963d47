//! `portero-backend` — backend connectivity for the gateway.
//!
//! This crate provides:
//! - JSON-RPC 2.0 protocol types for communicating with backends.
//! - A stdio transport that spawns child processes and communicates over stdin/stdout.
//! - A `BackendManager` that manages connections to multiple configured backends and
//!   orchestrates tool discovery and dispatch.
//!
//! # Usage
//!
//! ```rust,ignore
//! use portero_backend::BackendManager;
//!
//! let manager = BackendManager::from_config(&config.backends).await;
//!
//! // List all discovered tools.
//! for (backend_id, tool) in manager.list_tools() {
//!     println!("{backend_id}/{}", tool.name);
//! }
//!
//! // Call a tool.
//! let result = manager.call_tool("filesystem", "read_file", json!({"path": "/tmp/test.txt"})).await?;
//! ```

pub mod manager;
pub mod protocol;
pub mod transport;

// Re-exports for convenience.
pub use manager::{BackendError, BackendManager};
pub use protocol::{McpToolDef, ToolCallResult};
