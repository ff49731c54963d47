/// Shared error type used across the gateway's crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("store unavailable: {0}")]
    Store(String),

    #[error("backend: {0}")]
    Backend(String),

    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("malformed tool name: {0}")]
    MalformedToolName(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("invalid task transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("approval channel: {0}")]
    ApprovalChannel(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
