//! Router — parses namespaced identifiers and dispatches calls/reads to
//! the owning backend.
//!
//! Dispatch forwards the post-anonymization arguments verbatim and returns
//! the backend's raw reply; failures propagate unchanged.

use serde_json::Value;

use portero_backend::ToolCallResult;
use portero_core::error::Result;

use crate::registry::BackendRegistry;

pub struct Router;

impl Router {
    /// Dispatch a `tools/call` to the backend named by `namespaced_name`
    /// (`backend/local-name`). `args` are the already-anonymized,
    /// backend-facing arguments.
    pub async fn dispatch_call(
        registry: &BackendRegistry,
        namespaced_name: &str,
        args: Value,
    ) -> Result<ToolCallResult> {
        let (backend_id, local_name) = BackendRegistry::split_namespace(namespaced_name)?;
        registry.call(backend_id, local_name, args).await
    }

    /// `resources/list` on a single backend (the caller loops over the
    /// Registry's backends to build a full union, mirroring the
    /// Aggregator's approach to tools).
    pub async fn list_resources(registry: &BackendRegistry, backend_id: &str) -> Result<Value> {
        registry.list_resources(backend_id).await
    }

    /// `resources/read` for a URI of the form `backend://original-uri`:
    /// peels the `backend://` prefix and forwards `original-uri` verbatim.
    pub async fn read_resource(registry: &BackendRegistry, uri: &str) -> Result<Value> {
        let (backend_id, original_uri) = Self::peel_resource_uri(uri)?;
        registry.read_resource(backend_id, original_uri).await
    }

    /// Split a resource URI `backend://original-uri` into `(backend_id,
    /// original_uri)` on the first `://`.
    fn peel_resource_uri(uri: &str) -> Result<(&str, &str)> {
        uri.split_once("://")
            .filter(|(b, _)| !b.is_empty())
            .ok_or_else(|| portero_core::error::Error::MalformedToolName(uri.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peel_resource_uri_splits_on_first_scheme_separator() {
        let (backend, rest) = Router::peel_resource_uri("filesystem:///home/x/file.txt").unwrap();
        assert_eq!(backend, "filesystem");
        assert_eq!(rest, "/home/x/file.txt");
    }

    #[test]
    fn peel_resource_uri_preserves_nested_scheme_in_remainder() {
        let (backend, rest) = Router::peel_resource_uri("github://repo://issues/1").unwrap();
        assert_eq!(backend, "github");
        assert_eq!(rest, "repo://issues/1");
    }

    #[test]
    fn peel_resource_uri_rejects_missing_scheme() {
        assert!(Router::peel_resource_uri("not-a-uri").is_err());
    }

    #[tokio::test]
    async fn dispatch_call_rejects_malformed_name() {
        let registry = BackendRegistry::empty();
        let result = Router::dispatch_call(&registry, "no_slash", serde_json::json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn dispatch_call_rejects_unknown_backend() {
        let registry = BackendRegistry::empty();
        let result = Router::dispatch_call(&registry, "ghost/read_file", serde_json::json!({})).await;
        assert!(result.is_err());
    }
}
