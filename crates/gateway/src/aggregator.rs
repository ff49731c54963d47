//! Aggregator — the namespaced, filtered tool list exposed upstream.
//!
//! Two list modes: unfiltered (the full union, used by the search virtual
//! tool) and filtered (the view published in `tools/list`). The filtering
//! rule is pure and tested independently of any live backend connection.

use portero_core::tool::ToolDefinition;

use crate::registry::BackendRegistry;

/// One catalog entry with the pinning/recency facts needed to decide
/// visibility, kept separate from `BackendRegistry` so the filtering rule
/// can be unit-tested without spinning up backend connections.
struct CatalogEntry {
    tool: ToolDefinition,
    pinned: Option<Vec<String>>,
    recently_used: bool,
}

pub struct Aggregator;

impl Aggregator {
    /// Full namespaced union of every connected backend's tools.
    pub fn unfiltered(registry: &BackendRegistry) -> Vec<ToolDefinition> {
        registry.namespaced_tools().into_iter().map(|(_, t)| t).collect()
    }

    /// The view published to the client. Equal to unfiltered when no
    /// connected backend declares a pinned set.
    pub fn filtered(registry: &BackendRegistry) -> Vec<ToolDefinition> {
        let entries: Vec<CatalogEntry> = registry
            .namespaced_tools()
            .into_iter()
            .map(|(backend_id, tool)| CatalogEntry {
                recently_used: registry.is_recently_used(&tool.name),
                pinned: registry.pinned_tools(&backend_id),
                tool,
            })
            .collect();
        filter_catalog(&entries)
    }
}

fn filter_catalog(entries: &[CatalogEntry]) -> Vec<ToolDefinition> {
    if !entries.iter().any(|e| e.pinned.is_some()) {
        return entries.iter().map(|e| e.tool.clone()).collect();
    }
    entries
        .iter()
        .filter(|e| match &e.pinned {
            None => true,
            Some(pinned) => {
                let local_name = BackendRegistry::split_namespace(&e.tool.name)
                    .map(|(_, local)| local)
                    .unwrap_or(e.tool.name.as_str());
                pinned.iter().any(|p| p == local_name) || e.recently_used
            }
        })
        .map(|e| e.tool.clone())
        .collect()
}
