//! Error types for the remote service and the session state machine.

use crate::model::{Operation, SessionStatus};
use thiserror::Error;

/// Message recorded when the service reports `failed` without an error message.
pub const DEPLOYMENT_FAILED: &str = "Deployment failed";

/// Failure of a single remote call.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The service answered with a non-success status.
    #[error("service returned {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Api { status: u16, detail: Option<String> },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::InvalidResponse(e.to_string())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

/// Errors surfaced by the orchestration controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionStatus,
    },

    /// Non-success response; carries the server detail or a generic fallback.
    #[error("{message}")]
    Remote { operation: Operation, message: String },

    /// Network-level failure; always carries the generic fallback.
    #[error("{message}")]
    Transport { operation: Operation, message: String },

    #[error("{}", deployment_failure_text(.0))]
    DeploymentFailure(String),
}

fn deployment_failure_text(message: &str) -> String {
    if message == DEPLOYMENT_FAILED {
        message.to_string()
    } else {
        format!("{DEPLOYMENT_FAILED}: {message}")
    }
}

impl SessionError {
    /// Classify a remote failure for the given operation.
    ///
    /// Server details are surfaced verbatim; everything else falls back to the
    /// operation's generic message.
    pub fn from_remote(operation: Operation, err: &RemoteError) -> Self {
        match err {
            RemoteError::Api { detail, .. } => SessionError::Remote {
                operation,
                message: detail
                    .as_deref()
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .unwrap_or(operation.fallback_message())
                    .to_string(),
            },
            RemoteError::Transport(_) | RemoteError::InvalidResponse(_) => {
                SessionError::Transport {
                    operation,
                    message: operation.fallback_message().to_string(),
                }
            }
        }
    }
}
