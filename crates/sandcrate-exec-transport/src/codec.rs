//! Protocol codec for the plugin-execution channel.
//!
//! Outbound commands are JSON objects tagged by `command`; inbound envelopes
//! are JSON objects tagged by `type`. The set of inbound variants is closed:
//! a payload that is not JSON, or whose tag is absent or unknown, fails to
//! decode instead of being coerced into some default variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sandcrate_exec_core::{Error, ExecutionCommand, Result, SessionId};

/// Command sent from the executor to the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum OutboundCommand {
    /// Start a plugin run
    ExecutePlugin {
        /// Plugin to execute
        plugin_id: String,
        /// JSON parameters for the plugin
        parameters: Value,
        /// Advisory timeout in milliseconds
        timeout: u64,
    },
    /// Ask the runtime to acknowledge interest in an existing session
    Subscribe {
        /// Session to subscribe to
        session_id: SessionId,
    },
}

impl From<&ExecutionCommand> for OutboundCommand {
    fn from(command: &ExecutionCommand) -> Self {
        OutboundCommand::ExecutePlugin {
            plugin_id: command.plugin_id.clone(),
            parameters: command.parameters.clone(),
            timeout: command.timeout_ms,
        }
    }
}

impl OutboundCommand {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundCommand::ExecutePlugin { .. } => "execute_plugin",
            OutboundCommand::Subscribe { .. } => "subscribe",
        }
    }
}

/// Message received from the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEnvelope {
    /// Transport-level handshake acknowledgement
    Connected {
        /// Session identifier, if the runtime assigns one at connect time
        session_id: Option<SessionId>,
        /// Greeting text
        message: Option<String>,
    },
    /// Coarse lifecycle notice, e.g. `starting`
    Status {
        /// Session identifier
        session_id: Option<SessionId>,
        /// Lifecycle value
        status: Option<String>,
        /// Human-readable notice
        message: Option<String>,
    },
    /// Incremental output line and/or status refresh
    Update {
        /// Session identifier
        session_id: Option<SessionId>,
        /// Output line
        output: Option<String>,
        /// Free-form status value
        status: Option<String>,
    },
    /// Terminal outcome of a run
    Result {
        /// Session identifier
        session_id: Option<SessionId>,
        /// Whether the run succeeded; absent counts as failure
        success: Option<bool>,
        /// Final output
        output: Option<String>,
        /// Failure description
        error: Option<String>,
    },
    /// Out-of-band error notice
    Error {
        /// Session identifier
        session_id: Option<SessionId>,
        /// Error description
        message: Option<String>,
    },
    /// Subscription acknowledgement, informational only
    Subscribed {
        /// Session identifier
        session_id: Option<SessionId>,
        /// Acknowledgement text
        message: Option<String>,
    },
}

impl InboundEnvelope {
    /// Wire tag of the envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEnvelope::Connected { .. } => "connected",
            InboundEnvelope::Status { .. } => "status",
            InboundEnvelope::Update { .. } => "update",
            InboundEnvelope::Result { .. } => "result",
            InboundEnvelope::Error { .. } => "error",
            InboundEnvelope::Subscribed { .. } => "subscribed",
        }
    }

    /// Session identifier carried by the envelope, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            InboundEnvelope::Connected { session_id, .. }
            | InboundEnvelope::Status { session_id, .. }
            | InboundEnvelope::Update { session_id, .. }
            | InboundEnvelope::Result { session_id, .. }
            | InboundEnvelope::Error { session_id, .. }
            | InboundEnvelope::Subscribed { session_id, .. } => session_id.as_ref(),
        }
    }
}

/// Serialize an outbound command to its JSON text.
pub fn encode_command(command: &OutboundCommand) -> Result<String> {
    serde_json::to_string(command).map_err(|e| Error::InvalidParameters(e.to_string()))
}

/// Parse and validate one inbound payload.
pub fn decode_envelope(payload: &[u8]) -> Result<InboundEnvelope> {
    serde_json::from_slice(payload).map_err(|e| Error::MalformedEnvelope(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandcrate_exec_core::PluginRef;
    use serde_json::json;

    #[test]
    fn test_encode_execute_command() {
        let plugin = PluginRef::new("plugin_hello", "Hello");
        let command = ExecutionCommand::with_timeout(
            &plugin,
            json!({"input": "test data", "options": {"verbose": true}}),
            30000,
        );

        let text = encode_command(&OutboundCommand::from(&command)).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({
                "command": "execute_plugin",
                "plugin_id": "plugin_hello",
                "parameters": {"input": "test data", "options": {"verbose": true}},
                "timeout": 30000
            })
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        let plugin = PluginRef::new("p", "P");
        let command = ExecutionCommand::new(&plugin, json!({"b": 2, "a": 1}));
        let first = encode_command(&OutboundCommand::from(&command)).unwrap();
        let second = encode_command(&OutboundCommand::from(&command)).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("{\"command\":\"execute_plugin\""));
    }

    #[test]
    fn test_encode_subscribe_command() {
        let command = OutboundCommand::Subscribe {
            session_id: SessionId::from("s-1"),
        };
        assert_eq!(command.name(), "subscribe");
        let text = encode_command(&command).unwrap();
        assert_eq!(text, r#"{"command":"subscribe","session_id":"s-1"}"#);
    }

    #[test]
    fn test_decode_connected() {
        let env =
            decode_envelope(br#"{"type":"connected","message":"WebSocket connected successfully"}"#)
                .unwrap();
        assert_eq!(
            env,
            InboundEnvelope::Connected {
                session_id: None,
                message: Some("WebSocket connected successfully".to_string()),
            }
        );
        assert_eq!(env.kind(), "connected");
    }

    #[test]
    fn test_decode_status_with_extra_fields() {
        let env = decode_envelope(
            br#"{"type":"status","session_id":"abc","plugin_id":"plugin_hello","status":"starting","message":"Plugin execution started"}"#,
        )
        .unwrap();
        match env {
            InboundEnvelope::Status {
                session_id,
                status,
                message,
            } => {
                assert_eq!(session_id, Some(SessionId::from("abc")));
                assert_eq!(status.as_deref(), Some("starting"));
                assert_eq!(message.as_deref(), Some("Plugin execution started"));
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_decode_update_without_output() {
        let env = decode_envelope(br#"{"type":"update","status":"running"}"#).unwrap();
        assert_eq!(
            env,
            InboundEnvelope::Update {
                session_id: None,
                output: None,
                status: Some("running".to_string()),
            }
        );
    }

    #[test]
    fn test_decode_result_success_is_optional() {
        let ok = decode_envelope(br#"{"type":"result","success":true,"output":"done"}"#).unwrap();
        assert!(matches!(
            ok,
            InboundEnvelope::Result {
                success: Some(true),
                ..
            }
        ));

        let missing = decode_envelope(br#"{"type":"result","error":"boom"}"#).unwrap();
        assert_eq!(
            missing,
            InboundEnvelope::Result {
                session_id: None,
                success: None,
                output: None,
                error: Some("boom".to_string()),
            }
        );
    }

    #[test]
    fn test_decode_session_id_accessor() {
        let env = decode_envelope(br#"{"type":"error","session_id":"x","message":"boom"}"#).unwrap();
        assert_eq!(env.session_id(), Some(&SessionId::from("x")));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let result = decode_envelope(b"definitely not json");
        assert!(matches!(result, Err(Error::MalformedEnvelope(_))));
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let result = decode_envelope(br#"{"type":"progress","output":"x"}"#);
        match result {
            Err(Error::MalformedEnvelope(detail)) => assert!(detail.contains("progress")),
            other => panic!("expected malformed envelope, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_missing_tag() {
        let result = decode_envelope(br#"{"output":"x"}"#);
        assert!(matches!(result, Err(Error::MalformedEnvelope(_))));
    }
}
