//! Session types for plugin execution.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an execution session, assigned by the remote runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a session identifier received from the runtime.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local identifier of one `execute` run, for correlating log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Nothing in flight
    #[default]
    Idle,
    /// Transport is being opened
    Connecting,
    /// Execute command sent, waiting for output
    Starting,
    /// Output is streaming
    Running,
    /// Run finished successfully
    Completed,
    /// Run finished unsuccessfully
    Failed,
    /// Run was stopped locally
    Stopped,
    /// Error notice or transport failure
    Error,
}

impl Status {
    /// Terminal for the current session: no protocol-driven transition
    /// happens without a new `execute`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Completed | Status::Failed | Status::Stopped | Status::Error
        )
    }

    /// A command is outstanding on the connection.
    pub fn is_active(self) -> bool {
        matches!(self, Status::Starting | Status::Running)
    }

    /// A new command may be issued in this status.
    pub fn accepts_commands(self) -> bool {
        !self.is_active()
    }

    /// Lowercase name, as shown to users.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Connecting => "connecting",
            Status::Starting => "starting",
            Status::Running => "running",
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::Stopped => "stopped",
            Status::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of the current execution session.
///
/// Output lines live in the output aggregator alongside this state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SessionState {
    /// Current status
    pub status: Status,
    /// Session identifier, once announced by the runtime
    pub session_id: Option<SessionId>,
    /// Most recent error message
    pub last_error: Option<String>,
    /// Free-form status string from the latest `update` envelope
    pub remote_status: Option<String>,
}

impl SessionState {
    /// Reset to a fresh idle state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
