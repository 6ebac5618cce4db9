use serde::{Deserialize, Serialize};

/// Daemon-level notices and the lifecycle of pipeline operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneralEvent {
    /// Something degraded but the daemon carries on
    Warning { message: String },

    DebugLog { message: String },

    /// A fetch-and-admit run began for the named request
    OperationStarted { operation: String },

    OperationCompleted { operation: String },

    OperationFailed { operation: String, error: String },
}

impl GeneralEvent {
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
        }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Self::DebugLog {
            message: message.into(),
        }
    }
}
