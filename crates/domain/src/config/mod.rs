mod backends;
mod policy;
mod runtime;
mod server;
mod tasks;

pub use backends::*;
pub use policy::*;
pub use runtime::*;
pub use server::*;
pub use tasks::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::model::ReplacementRule;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The three configuration documents (backends, replacements, policies),
/// plus the ambient server/task/runtime tuning.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub replacements: Vec<ReplacementRule>,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means everything looks good. Any `Error`-severity issue is
    /// fatal at startup.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        // Backends: non-empty unique ids, stdio requires a command.
        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, backend) in self.backends.iter().enumerate() {
            if backend.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("backends[{i}].id"),
                    message: "backend id must not be empty".into(),
                });
            }
            if backend.id.contains('/') {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("backends[{i}].id"),
                    message: "backend id must not contain '/' (used as the namespace separator)"
                        .into(),
                });
            }
            if !backend.id.is_empty() && !seen_ids.insert(&backend.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("backends[{i}].id"),
                    message: format!("duplicate backend id \"{}\"", backend.id),
                });
            }
            if backend.transport == BackendTransportKind::Stdio && backend.command.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("backends[{i}].command"),
                    message: "stdio transport requires a non-empty command".into(),
                });
            }
            if backend.transport == BackendTransportKind::Sse && backend.url.is_none() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("backends[{i}].url"),
                    message: "sse transport requires a url".into(),
                });
            }
        }

        // Replacement rules: `fake` must never be empty.
        for (i, rule) in self.replacements.iter().enumerate() {
            if rule.fake.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("replacements[{i}].fake"),
                    message: "fake must not be empty".into(),
                });
            }
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            backends: vec![BackendConfig {
                id: "filesystem".into(),
                command: "npx".into(),
                args: vec![],
                env: Default::default(),
                transport: BackendTransportKind::Stdio,
                url: None,
                pinned_tools: None,
            }],
            ..Config::default()
        }
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "server.port").unwrap().severity,
            ConfigSeverity::Error
        );
    }

    #[test]
    fn duplicate_backend_id_is_error() {
        let mut cfg = valid_config();
        cfg.backends.push(cfg.backends[0].clone());
        let issues = cfg.validate();
        assert!(issues.iter().any(|e| e.message.contains("duplicate backend id")));
    }

    #[test]
    fn backend_id_with_slash_is_error() {
        let mut cfg = valid_config();
        cfg.backends[0].id = "fs/nested".into();
        let issues = cfg.validate();
        assert!(find_issue(&issues, "backends[0].id").is_some());
    }

    #[test]
    fn stdio_backend_without_command_is_error() {
        let mut cfg = valid_config();
        cfg.backends[0].command = String::new();
        let issues = cfg.validate();
        assert!(find_issue(&issues, "backends[0].command").is_some());
    }

    #[test]
    fn sse_backend_without_url_is_error() {
        let mut cfg = valid_config();
        cfg.backends[0].transport = BackendTransportKind::Sse;
        cfg.backends[0].url = None;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "backends[0].url").is_some());
    }

    #[test]
    fn replacement_rule_empty_fake_is_error() {
        let mut cfg = valid_config();
        cfg.replacements.push(ReplacementRule {
            fake: String::new(),
            real: "secret".into(),
            bidirectional: true,
            case_sensitive: false,
            response_replacement: None,
        });
        let issues = cfg.validate();
        assert!(find_issue(&issues, "replacements[0].fake").is_some());
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = valid_config();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "server.cors.allowed_origins")
                .unwrap()
                .severity,
            ConfigSeverity::Warning
        );
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] server.port: port must be greater than 0"
        );
    }

    #[test]
    fn deserialize_empty_document_uses_all_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 3939);
        assert!(cfg.backends.is_empty());
        assert!(cfg.replacements.is_empty());
    }
}
