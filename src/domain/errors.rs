//! Error taxonomy for the forager agent.
//!
//! Three tiers: task-level errors (recovered locally, retried or reported),
//! coordinator errors (transient unless the credentials were rejected), and
//! sandbox errors (surface as retryable task failures).

use thiserror::Error;

/// Errors from a single task execution.
///
/// `is_retryable` decides whether the failure re-enters the queue; terminal
/// variants go straight to permanent-failure reporting.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("task timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("remote service error: {0}")]
    Remote(String),

    #[error("sandbox failure: {0}")]
    Sandbox(String),

    #[error("handler panicked: {0}")]
    HandlerPanic(String),

    #[error("unsupported task: no handler registered for {domain}/{kind}")]
    Unsupported { domain: String, kind: String },

    #[error("malformed parameters: {0}")]
    InvalidParameters(String),

    #[error("not applicable: {0}")]
    NotApplicable(String),
}

impl TaskError {
    /// Whether this failure may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Timeout { .. }
                | Self::Remote(_)
                | Self::Sandbox(_)
                | Self::HandlerPanic(_)
        )
    }

    /// Terminal failures bypass the retry budget entirely.
    pub fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }
}

/// Errors from the coordinator boundary.
#[derive(Debug, Clone, Error)]
pub enum CoordinatorError {
    /// The coordinator rejected our credentials. Fatal for the agent:
    /// polling halts rather than retrying indefinitely.
    #[error("credentials rejected by coordinator")]
    Unauthenticated,

    #[error("network failure: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("coordinator returned status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl CoordinatorError {
    /// Whether the call is worth repeating on a later cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Remote { status, .. } => *status >= 500,
            Self::Unauthenticated | Self::Protocol(_) => false,
        }
    }
}

/// Errors from sandbox allocation or teardown.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to allocate sandbox: {0}")]
    Allocation(String),

    #[error("failed to tear down sandbox: {0}")]
    Teardown(String),
}
