//! Execution state machine.
//!
//! [`SessionMachine`] owns the [`SessionState`] and the [`OutputAggregator`]
//! of one executor. It is driven purely by decoded envelopes, transport
//! lifecycle notifications, and user commands; it performs no I/O itself.
//!
//! ```text
//! idle ──connect──▶ connecting ──connected/close──▶ idle
//!   │                   │
//!   └──execute──────────┴──▶ starting ──update──▶ running
//!                               │                   │
//!                               └──result/error─────┴──▶ completed | failed | error
//!
//! any state ──stop──▶ stopped
//! ```

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use sandcrate_exec_core::{Error, ExecutionCommand, Result, RunId, SessionId, SessionState, Status};
use sandcrate_exec_transport::InboundEnvelope;

use crate::output::OutputAggregator;

const DEFAULT_START_MESSAGE: &str = "Plugin execution started";
const DEFAULT_FAILURE: &str = "Plugin execution failed";
const DEFAULT_ERROR: &str = "An error occurred";
const DEFAULT_SUBSCRIBED: &str = "Subscribed to session updates";

/// Bookkeeping of the execution currently in flight.
#[derive(Debug, Clone, Copy)]
struct RunClock {
    run_id: RunId,
    started_at: Instant,
    timeout: Duration,
}

/// State machine for one execution session at a time.
#[derive(Debug, Default)]
pub struct SessionMachine {
    state: SessionState,
    output: OutputAggregator,
    run: Option<RunClock>,
}

impl SessionMachine {
    /// Create an idle machine with empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.state.status
    }

    /// Session output.
    pub fn output(&self) -> &OutputAggregator {
        &self.output
    }

    /// Session output, for cursor-based reads.
    pub fn output_mut(&mut self) -> &mut OutputAggregator {
        &mut self.output
    }

    /// Identifier of the current or most recent run.
    pub fn run_id(&self) -> Option<RunId> {
        self.run.map(|run| run.run_id)
    }

    /// Time since the current run was started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.run.map(|run| run.started_at.elapsed())
    }

    /// Whether an active run has outlived its advisory timeout.
    pub fn deadline_exceeded(&self) -> bool {
        match self.run {
            Some(run) if self.state.status.is_active() => run.started_at.elapsed() >= run.timeout,
            _ => false,
        }
    }

    /// User-initiated connect. Returns false when a run is in flight.
    pub fn begin_connect(&mut self) -> bool {
        if self.state.status.is_active() {
            debug!("Ignoring connect while {}", self.state.status);
            return false;
        }
        self.set_status(Status::Connecting);
        true
    }

    /// Start a fresh session for `command`.
    ///
    /// Output and state are reset first. Rejected while a command is
    /// outstanding; the machine is left untouched in that case.
    pub fn begin_execution(&mut self, command: &ExecutionCommand) -> Result<RunId> {
        if !self.state.status.accepts_commands() {
            warn!(
                "Rejecting execute for '{}': status={}",
                command.plugin_id, self.state.status
            );
            return Err(Error::ProtocolViolation(format!(
                "execution already in progress (status: {})",
                self.state.status
            )));
        }

        self.output.clear();
        self.state.reset();

        let run_id = RunId::new();
        self.run = Some(RunClock {
            run_id,
            started_at: Instant::now(),
            timeout: command.timeout(),
        });
        self.set_status(Status::Starting);
        info!(
            "Execution started: run={}, plugin='{}', timeout_ms={}",
            run_id, command.plugin_id, command.timeout_ms
        );
        Ok(run_id)
    }

    /// Check that a non-execute command may be sent now.
    pub fn check_accepts_command(&self, command: &str) -> Result<()> {
        if self.state.status.accepts_commands() {
            Ok(())
        } else {
            warn!("Rejecting {}: status={}", command, self.state.status);
            Err(Error::ProtocolViolation(format!(
                "cannot send {command} while {}",
                self.state.status
            )))
        }
    }

    /// Apply one decoded envelope and return the resulting status.
    pub fn apply(&mut self, envelope: InboundEnvelope) -> Status {
        debug!(
            "Applying envelope: type={}, status={}",
            envelope.kind(),
            self.state.status
        );

        if !self.belongs_to_session(envelope.session_id()) {
            debug!(
                "Ignoring {} for foreign session {:?}",
                envelope.kind(),
                envelope.session_id()
            );
            return self.state.status;
        }

        match envelope {
            InboundEnvelope::Connected {
                session_id,
                message,
            } => {
                if !self.state.status.is_terminal() {
                    self.adopt_session_id(session_id);
                }
                if self.state.status == Status::Connecting {
                    self.set_status(Status::Idle);
                }
                if let Some(message) = message {
                    self.output.append_notice(message);
                }
            }

            InboundEnvelope::Status {
                session_id,
                status,
                message,
            } => {
                if !self.state.status.is_active() {
                    debug!("Ignoring status notice while {}", self.state.status);
                    return self.state.status;
                }
                self.adopt_session_id(session_id);
                match status.as_deref() {
                    Some("starting") => {
                        let text = message.unwrap_or_else(|| DEFAULT_START_MESSAGE.to_string());
                        if self.state.status == Status::Starting {
                            self.output.append_notice(text);
                        }
                    }
                    _ => {
                        if status.is_some() {
                            self.state.remote_status = status;
                        }
                        if let Some(message) = message {
                            self.output.append_notice(message);
                        }
                    }
                }
            }

            InboundEnvelope::Update { output, status, .. } => {
                if !self.state.status.is_active() {
                    debug!("Ignoring update while {}", self.state.status);
                    return self.state.status;
                }
                let mut progressed = false;
                if let Some(line) = output.filter(|line| !line.is_empty()) {
                    self.output.append_output(line);
                    progressed = true;
                }
                if let Some(status) = status {
                    self.state.remote_status = Some(status);
                    progressed = true;
                }
                if progressed && self.state.status == Status::Starting {
                    self.set_status(Status::Running);
                }
            }

            InboundEnvelope::Result {
                success,
                output,
                error,
                ..
            } => {
                if !self.state.status.is_active() {
                    debug!("Ignoring result while {}", self.state.status);
                    return self.state.status;
                }
                if success == Some(true) {
                    if let Some(line) = output.filter(|line| !line.is_empty()) {
                        self.output.append_output(line);
                    }
                    self.set_status(Status::Completed);
                } else {
                    let error = error.unwrap_or_else(|| DEFAULT_FAILURE.to_string());
                    self.output
                        .append_diagnostic(format!("{DEFAULT_FAILURE}: {error}"));
                    self.state.last_error = Some(error);
                    self.set_status(Status::Failed);
                }
            }

            InboundEnvelope::Error { message, .. } => {
                let message = message.unwrap_or_else(|| DEFAULT_ERROR.to_string());
                self.output.append_diagnostic(format!("Error: {message}"));
                if self.state.status.is_terminal() {
                    debug!("Error notice after terminal status {}", self.state.status);
                } else {
                    warn!("Runtime reported error: {}", message);
                    self.state.last_error = Some(message);
                    self.set_status(Status::Error);
                }
            }

            InboundEnvelope::Subscribed { message, .. } => {
                self.output
                    .append_notice(message.unwrap_or_else(|| DEFAULT_SUBSCRIBED.to_string()));
            }
        }

        self.state.status
    }

    /// Record a payload that could not be decoded. Status is unchanged.
    pub fn decode_failed(&mut self, payload: &[u8], error: &Error) {
        let raw = String::from_utf8_lossy(payload);
        warn!("Failed to decode envelope: {}", error);
        self.output
            .append_diagnostic(format!("Failed to parse message: {raw}"));
    }

    /// The transport closed.
    pub fn connection_closed(&mut self, code: u16, reason: &str) -> Status {
        match self.state.status {
            Status::Connecting => {
                self.output
                    .append_notice(format!("Connection closed ({code})"));
                self.set_status(Status::Idle);
            }
            status if status.is_active() => {
                let detail = if reason.is_empty() {
                    format!("connection closed before the run finished ({code})")
                } else {
                    format!("connection closed before the run finished ({code}): {reason}")
                };
                self.output.append_diagnostic(format!("Error: {detail}"));
                self.state.last_error = Some(detail);
                self.set_status(Status::Error);
            }
            Status::Stopped => {}
            _ => {
                self.output
                    .append_notice(format!("Connection closed ({code})"));
            }
        }
        self.state.status
    }

    /// The transport failed to open, read, or write.
    pub fn transport_failed(&mut self, detail: &str) -> Status {
        self.output
            .append_diagnostic(format!("Connection failed: {detail}"));
        if self.state.status.is_terminal() {
            debug!("Transport failure after terminal status {}", self.state.status);
        } else {
            self.state.last_error = Some(detail.to_string());
            self.set_status(Status::Error);
        }
        self.state.status
    }

    /// Local stop. Returns false when already stopped.
    pub fn stop(&mut self) -> bool {
        let previous = self.state.status;
        if previous == Status::Stopped {
            return false;
        }
        if previous.is_active() {
            self.output.append_notice("Execution stopped by user");
        }
        self.set_status(Status::Stopped);
        true
    }

    /// Clear output and the last error; a terminal status returns to idle.
    pub fn clear_output(&mut self) {
        self.output.clear();
        self.state.last_error = None;
        if self.state.status.is_terminal() {
            self.set_status(Status::Idle);
        }
    }

    /// Reset state and output completely.
    pub fn reset(&mut self) {
        self.output.clear();
        self.state.reset();
        self.run = None;
    }

    fn belongs_to_session(&self, incoming: Option<&SessionId>) -> bool {
        match (&self.state.session_id, incoming) {
            (Some(current), Some(incoming)) => current == incoming,
            _ => true,
        }
    }

    fn adopt_session_id(&mut self, session_id: Option<SessionId>) {
        if self.state.session_id.is_none() {
            if let Some(id) = session_id {
                info!("Session identified: {}", id);
                self.state.session_id = Some(id);
            }
        }
    }

    fn set_status(&mut self, status: Status) {
        let old_status = self.state.status;
        if old_status != status {
            self.state.status = status;
            info!("Session status changed: {} → {}", old_status, status);
        }
    }
}
