use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use sha2::{Digest, Sha256};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use portero_core::config::{Config, ConfigSeverity};
use portero_gateway::anonymizer::Anonymizer;
use portero_gateway::api;
use portero_gateway::approval::{ApprovalChannel, NullTransport};
use portero_gateway::audit::{AuditSink, FileAuditSink};
use portero_gateway::cleanup::CleanupLoop;
use portero_gateway::cli::{Cli, Command, ConfigCommand};
use portero_gateway::executor::Executor;
use portero_gateway::pipeline::Pipeline;
use portero_gateway::policy::PolicyResolver;
use portero_gateway::registry::BackendRegistry;
use portero_gateway::state::AppState;
use portero_gateway::store::{import_legacy_approvals, JsonDocStore, SingleDocStore};
use portero_gateway::tasks::TaskManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = portero_gateway::cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = portero_gateway::cli::load_config()?;
            let valid = portero_gateway::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = portero_gateway::cli::load_config()?;
            portero_gateway::cli::config::show(&config);
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,portero_gateway=debug")),
        )
        .json()
        .init();
}

/// Directory holding the State Store's JSON collections and the audit
/// log. Configurable via `PORTERO_STATE_DIR`; defaults to `./state`.
fn state_dir() -> PathBuf {
    std::env::var("PORTERO_STATE_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("state"))
}

/// Substitute `${VAR}` placeholders in a backend's `command`, `args`, and
/// `env` values from the process environment. A backend with an
/// unresolved placeholder is dropped (logged as a warning); the rest
/// still start.
fn resolve_backend_placeholders(backends: &[portero_core::config::BackendConfig]) -> Vec<portero_core::config::BackendConfig> {
    fn substitute(input: &str) -> Result<String, String> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| input.to_string())?;
            let var = &after[..end];
            let value = std::env::var(var).map_err(|_| var.to_string())?;
            out.push_str(&value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    backends
        .iter()
        .filter_map(|b| {
            let command = substitute(&b.command);
            let args: Result<Vec<String>, String> = b.args.iter().map(|a| substitute(a)).collect();
            let env: Result<std::collections::HashMap<String, String>, String> =
                b.env.iter().map(|(k, v)| substitute(v).map(|v| (k.clone(), v))).collect();

            match (command, args, env) {
                (Ok(command), Ok(args), Ok(env)) => {
                    Some(portero_core::config::BackendConfig { command, args, env, ..b.clone() })
                }
                _ => {
                    tracing::warn!(backend_id = %b.id, "unresolved ${{VAR}} placeholder, skipping backend");
                    None
                }
            }
        })
        .collect()
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("portero starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── State Store directory ─────────────────────────────────────────
    let state_dir = state_dir();
    std::fs::create_dir_all(&state_dir).with_context(|| format!("creating state dir {}", state_dir.display()))?;
    let legacy_count = import_legacy_approvals(&state_dir);
    if legacy_count > 0 {
        tracing::info!(count = legacy_count, "imported legacy approvals.json (discarded, not re-written)");
    }

    // ── Backend Registry ───────────────────────────────────────────────
    let resolved_backends = resolve_backend_placeholders(&config.backends);
    let registry = Arc::new(BackendRegistry::from_config(&resolved_backends, &config.aggregator).await);
    tracing::info!(
        backends = registry.backend_count(),
        tools = registry.tool_count(),
        "backend registry ready"
    );

    // ── Anonymizer ───────────────────────────────────────────────────
    let anonymizer = Arc::new(Anonymizer::new(config.replacements.clone()));
    tracing::info!(rules = config.replacements.len(), "anonymizer ready");

    // ── Policy Resolver ──────────────────────────────────────────────
    let policy = Arc::new(PolicyResolver::new(config.policy.clone()));
    tracing::info!(entries = config.policy.entries.len(), "policy resolver ready");

    // ── Task Manager ─────────────────────────────────────────────────
    let task_manager = TaskManager::new(
        JsonDocStore::open(state_dir.join("tasks.json")).context("opening tasks store")?,
    );
    let tasks = Arc::new(task_manager.clone());

    // ── Approval Channel ─────────────────────────────────────────────
    let approval = Arc::new(ApprovalChannel::new(
        SingleDocStore::open(state_dir.join("admin.json")).context("opening admin pairing store")?,
        JsonDocStore::open(state_dir.join("grants.json")).context("opening grants store")?,
        JsonDocStore::open(state_dir.join("rules.json")).context("opening dynamic rules store")?,
        task_manager,
        Box::new(NullTransport),
        config.approval.digest_max_per_flush,
    ));
    tracing::info!(paired = approval.is_paired(), "approval channel ready");

    // ── Audit Sink ───────────────────────────────────────────────────
    let audit: Arc<dyn AuditSink> = Arc::new(FileAuditSink::new(state_dir.join("audit.jsonl")));

    // ── Request Pipeline ──────────────────────────────────────────────
    let pipeline = Arc::new(Pipeline::new(
        registry.clone(),
        anonymizer.clone(),
        policy.clone(),
        approval.clone(),
        tasks.clone(),
        audit.clone(),
    ));

    // ── Executor ─────────────────────────────────────────────────────
    let executor = Arc::new(Executor::new(tasks.clone(), registry.clone(), anonymizer.clone(), approval.clone(), audit.clone()));
    tokio::spawn(executor.clone().run(Duration::from_secs(1)));
    tracing::info!("executor drain loop started");

    // ── Cleanup Loop ─────────────────────────────────────────────────
    let cleanup = CleanupLoop::new(approval.clone(), Duration::from_secs(config.cleanup.interval_secs));
    tokio::spawn(cleanup.run());
    tracing::info!(interval_secs = config.cleanup.interval_secs, "cleanup loop started");

    // ── Activity digest flusher ──────────────────────────────────────
    {
        let approval = approval.clone();
        let window = Duration::from_secs(config.approval.digest_batch_window_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(window);
            loop {
                ticker.tick().await;
                approval.flush_digest();
            }
        });
    }
    tracing::info!("activity digest flusher started");

    // ── API token (read once, hash for constant-time comparison) ────
    let api_token_hash = {
        let env_var = &config.server.api_token_env;
        match std::env::var(env_var) {
            Ok(token) if !token.is_empty() => {
                tracing::info!(env_var = %env_var, "API bearer-token auth enabled");
                Some(Sha256::digest(token.as_bytes()).to_vec())
            }
            _ => {
                tracing::warn!(env_var = %env_var, "API bearer-token auth DISABLED — set {env_var} to enable");
                None
            }
        }
    };

    let state = AppState {
        config: config.clone(),
        registry,
        anonymizer,
        policy,
        tasks,
        approval,
        executor,
        audit,
        pipeline,
        api_token_hash,
    };

    // ── CORS ─────────────────────────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);

    // ── Router ───────────────────────────────────────────────────────
    let app = api::router(state.clone()).layer(cors_layer).with_state(state);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "portero listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins. Origins may
/// contain a trailing `*` wildcard for the port segment; a literal `"*"`
/// allows all origins.
fn build_cors_layer(cors: &portero_core::config::CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            let prefix = origin.trim_end_matches('*').to_owned();
            wildcard_prefixes.push(prefix);
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
