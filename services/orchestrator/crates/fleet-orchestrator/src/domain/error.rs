//! Typed error enums for every seam of the orchestrator.
//!
//! Adapter-level errors (`RuntimeError`, `StoreError`, `GatewayError`,
//! `WorkspaceError`) are raised by ports; services convert them into the
//! single caller-facing taxonomy, `OrchestratorError`.

use thiserror::Error;

// ── Container runtime ─────────────────────────────────────────────────────────

/// Errors raised by the container runtime adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// The referenced container or network does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The runtime refused the operation because of the resource's current
    /// state (already exists, not running, not paused).
    #[error("runtime conflict: {0}")]
    Conflict(String),

    /// Daemon unreachable or failing for any other reason.
    #[error("container runtime error: {0}")]
    Transport(String),
}

// ── Key-value store ───────────────────────────────────────────────────────────

/// Errors raised by the registry, credit and rate-window stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("key-value store unavailable: {0}")]
    Backend(String),

    #[error("corrupt value at '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

// ── LLM gateway ───────────────────────────────────────────────────────────────

/// Errors raised by the LLM gateway client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("gateway unreachable: {0}")]
    Transport(String),

    #[error("unexpected gateway response: {0}")]
    Malformed(String),
}

// ── Workspace ─────────────────────────────────────────────────────────────────

/// Errors raised while materializing an agent workspace.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkspaceError {
    #[error("workspace I/O failed at {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to encode workspace config: {0}")]
    Encode(String),
}

// ── Caller-facing taxonomy ────────────────────────────────────────────────────

/// Every failure an orchestrator operation can report to its caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Rejected before any side effect.
    #[error("{0}")]
    Validation(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// A runtime sub-resource is missing where it is required.
    #[error("{0} not found")]
    NotFound(String),

    /// The agent or its container is in a state that forbids the operation.
    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Runtime(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("LLM gateway returned {status}")]
    UpstreamGateway { status: u16, body: String },

    #[error("{0}")]
    GatewayTransport(String),
}

impl From<RuntimeError> for OrchestratorError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::NotFound(what) => Self::NotFound(what),
            RuntimeError::Conflict(reason) => Self::InvalidState(reason),
            err @ RuntimeError::Transport(_) => Self::Runtime(err.to_string()),
        }
    }
}

impl From<GatewayError> for OrchestratorError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Upstream { status, body } => Self::UpstreamGateway { status, body },
            other => Self::GatewayTransport(other.to_string()),
        }
    }
}
