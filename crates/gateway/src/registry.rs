//! Backend Registry — the flat `backend/local-name` namespace over all
//! connected backends, with a TTL-bounded tool-catalog cache.
//!
//! Namespacing is a plain split on the first `/`, not capability matching:
//! the registry key is the configured backend id.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;

use portero_backend::{BackendManager, ToolCallResult};
use portero_core::config::{AggregatorConfig, BackendConfig};
use portero_core::error::{Error, Result};
use portero_core::tool::ToolDefinition;

struct Catalog {
    tools: Vec<(String, ToolDefinition)>,
    built_at: Instant,
}

pub struct BackendRegistry {
    manager: BackendManager,
    ttl: Duration,
    catalog: RwLock<Option<Catalog>>,
    /// Process-wide recency set of fully namespaced tool names, used by the
    /// Aggregator's filtered view to promote a tool into visibility once a
    /// caller has used it.
    recently_used: RwLock<HashSet<String>>,
}

impl BackendRegistry {
    pub async fn from_config(backends: &[BackendConfig], aggregator: &AggregatorConfig) -> Self {
        let manager = BackendManager::from_config(backends).await;
        Self {
            manager,
            ttl: Duration::from_secs(aggregator.catalog_ttl_secs),
            catalog: RwLock::new(None),
            recently_used: RwLock::new(HashSet::new()),
        }
    }

    #[cfg(test)]
    pub fn empty() -> Self {
        Self {
            manager: BackendManager::empty(),
            ttl: Duration::from_secs(60),
            catalog: RwLock::new(None),
            recently_used: RwLock::new(HashSet::new()),
        }
    }

    /// Insert a fully namespaced tool name into the recency set.
    pub fn mark_used(&self, namespaced_name: &str) {
        self.recently_used.write().insert(namespaced_name.to_string());
    }

    pub fn is_recently_used(&self, namespaced_name: &str) -> bool {
        self.recently_used.read().contains(namespaced_name)
    }

    /// The configured pinned tool set for `backend_id`, if any.
    pub fn pinned_tools(&self, backend_id: &str) -> Option<Vec<String>> {
        self.manager.pinned_tools(backend_id).cloned()
    }

    /// Whether any connected backend declares a pinned set at all — per
    /// §4.3, this determines whether the filtered view equals unfiltered.
    pub fn any_backend_has_pinned_set(&self) -> bool {
        self.namespaced_tools()
            .iter()
            .map(|(backend_id, _)| backend_id.as_str())
            .collect::<HashSet<_>>()
            .iter()
            .any(|backend_id| self.manager.pinned_tools(backend_id).is_some())
    }

    /// Namespaced `(backend_id, tool)` catalog across all alive backends,
    /// rebuilt at most once per TTL window.
    pub fn namespaced_tools(&self) -> Vec<(String, ToolDefinition)> {
        {
            let guard = self.catalog.read();
            if let Some(c) = guard.as_ref() {
                if c.built_at.elapsed() < self.ttl {
                    return c.tools.clone();
                }
            }
        }
        let tools: Vec<(String, ToolDefinition)> = self
            .manager
            .list_tools()
            .into_iter()
            .map(|(backend_id, def)| {
                (
                    backend_id.to_string(),
                    ToolDefinition {
                        name: format!("{backend_id}/{}", def.name),
                        description: def.description.clone(),
                        input_schema: def.input_schema.clone(),
                    },
                )
            })
            .collect();
        *self.catalog.write() = Some(Catalog {
            tools: tools.clone(),
            built_at: Instant::now(),
        });
        tools
    }

    /// Split a namespaced tool name `backend/local-name` into its two
    /// halves. The split is on the first `/` only.
    pub fn split_namespace(namespaced: &str) -> Result<(&str, &str)> {
        namespaced
            .split_once('/')
            .filter(|(b, l)| !b.is_empty() && !l.is_empty())
            .ok_or_else(|| Error::MalformedToolName(namespaced.to_string()))
    }

    pub async fn call(&self, backend_id: &str, local_name: &str, args: Value) -> Result<ToolCallResult> {
        self.manager
            .call_tool(backend_id, local_name, args)
            .await
            .map_err(Error::from)
    }

    pub async fn list_resources(&self, backend_id: &str) -> Result<Value> {
        self.manager.list_resources(backend_id).await.map_err(Error::from)
    }

    pub async fn read_resource(&self, backend_id: &str, uri: &str) -> Result<Value> {
        self.manager.read_resource(backend_id, uri).await.map_err(Error::from)
    }

    pub fn backend_count(&self) -> usize {
        self.manager.backend_count()
    }

    pub fn tool_count(&self) -> usize {
        self.manager.tool_count()
    }

    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_namespace_splits_on_first_slash() {
        let (backend, local) = BackendRegistry::split_namespace("filesystem/read_file").unwrap();
        assert_eq!(backend, "filesystem");
        assert_eq!(local, "read_file");
    }

    #[test]
    fn split_namespace_keeps_remainder_on_nested_slashes() {
        let (backend, local) = BackendRegistry::split_namespace("filesystem/a/b").unwrap();
        assert_eq!(backend, "filesystem");
        assert_eq!(local, "a/b");
    }

    #[test]
    fn split_namespace_rejects_missing_separator() {
        assert!(BackendRegistry::split_namespace("no_slash_here").is_err());
    }

    #[test]
    fn split_namespace_rejects_empty_halves() {
        assert!(BackendRegistry::split_namespace("/local").is_err());
        assert!(BackendRegistry::split_namespace("backend/").is_err());
    }

    #[tokio::test]
    async fn empty_registry_has_no_tools() {
        let reg = BackendRegistry::empty();
        assert!(reg.namespaced_tools().is_empty());
        assert_eq!(reg.backend_count(), 0);
    }

    #[test]
    fn mark_used_promotes_into_recency_set() {
        let reg = BackendRegistry::empty();
        assert!(!reg.is_recently_used("filesystem/read_file"));
        reg.mark_used("filesystem/read_file");
        assert!(reg.is_recently_used("filesystem/read_file"));
    }

    #[test]
    fn empty_registry_reports_no_pinned_backends() {
        let reg = BackendRegistry::empty();
        assert!(!reg.any_backend_has_pinned_set());
    }
}
