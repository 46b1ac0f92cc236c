//! Error types for the cluster shutdown procedure.
//!
//! Only a handful of these are fatal. Enumeration failures end the run, while
//! dispatch, detach and probe failures are logged by the component that hit them
//! and folded into its report.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShutdownError {
    #[error("Management plane error during {operation}: {message}")]
    ManagementPlane { operation: String, message: String },
    #[error("Dispatch of {action} to {target} failed: {message}")]
    Dispatch {
        action: String,
        target: String,
        message: String,
    },
    #[error("Liveness probe of {address} failed: {message}")]
    Probe { address: String, message: String },
    #[error("Invalid cluster topology: {0}")]
    Topology(String),
    #[error("Local role source error: {0}")]
    RoleSource(String),
}

impl ShutdownError {
    /// Create a management plane error for a named operation
    pub fn management_plane(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ManagementPlane {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a dispatch error for an action issued against a single resource
    pub fn dispatch(
        action: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Dispatch {
            action: action.into(),
            target: target.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShutdownError>;
