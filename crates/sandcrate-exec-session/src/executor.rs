//! Lifecycle coordinator for real-time plugin execution.

use std::time::Duration;

use tracing::{debug, info, warn};

use sandcrate_exec_core::{
    Error, ExecutionCommand, ExecutorConfig, PluginRef, Result, RunId, SessionId, SessionState,
    Status,
};
use sandcrate_exec_transport::{
    decode_envelope, encode_command, ConnectionManager, Endpoint, OutboundCommand, TransportEvent,
};

use crate::machine::SessionMachine;
use crate::output::{OutputAggregator, OutputLine};

/// Runs plugins over a single connection, one execution at a time.
///
/// All protocol handling happens inside the caller's own awaits: nothing
/// runs in the background except the socket reader and writer, whose events
/// are only applied by [`process_next`](Self::process_next). Transport and
/// decode failures never surface as `Err`; they become output lines and a
/// status change.
///
/// The connection is released whenever a run reaches a terminal status, on
/// [`stop`](Self::stop), on [`dispose`](Self::dispose), and on drop.
#[derive(Debug)]
pub struct PluginExecutor {
    connection: ConnectionManager,
    machine: SessionMachine,
    plugin: Option<PluginRef>,
}

impl PluginExecutor {
    /// Create an executor for the given endpoint.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            connection: ConnectionManager::new(endpoint),
            machine: SessionMachine::new(),
            plugin: None,
        }
    }

    /// Create an executor from configuration.
    pub fn from_config(config: &ExecutorConfig) -> Result<Self> {
        Ok(Self::new(Endpoint::from_config(config)?))
    }

    /// Current session state.
    pub fn state(&self) -> &SessionState {
        self.machine.state()
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.machine.status()
    }

    /// Session output.
    pub fn output(&self) -> &OutputAggregator {
        self.machine.output()
    }

    /// Lines appended since the previous call.
    pub fn read_since_last(&mut self) -> &[OutputLine] {
        self.machine.output_mut().read_since_last()
    }

    /// Plugin of the current or most recent run.
    pub fn plugin(&self) -> Option<&PluginRef> {
        self.plugin.as_ref()
    }

    /// Identifier of the current or most recent run.
    pub fn run_id(&self) -> Option<RunId> {
        self.machine.run_id()
    }

    /// Time since the current or most recent run was started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.machine.elapsed()
    }

    /// Whether the connection is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    /// Whether the active run has outlived its advisory timeout.
    ///
    /// Nothing is enforced here; callers decide whether to [`stop`](Self::stop).
    pub fn deadline_exceeded(&self) -> bool {
        self.machine.deadline_exceeded()
    }

    /// Open the connection ahead of an execution.
    pub async fn connect(&mut self) -> Status {
        if self.connection.is_open() {
            debug!("Already connected to {}", self.connection.endpoint());
            return self.status();
        }
        if self.machine.begin_connect() {
            self.open_connection().await;
        }
        self.status()
    }

    /// Start executing `plugin`.
    ///
    /// Fails locally with [`Error::ProtocolViolation`] while another run is
    /// in flight, or [`Error::InvalidParameters`] when the command does not
    /// target `plugin` or cannot be encoded; nothing is sent in either case.
    /// Transport failures are absorbed and reported through the returned
    /// status.
    pub async fn start(&mut self, plugin: &PluginRef, command: ExecutionCommand) -> Result<Status> {
        if !self.status().accepts_commands() {
            warn!(
                "Rejecting start of '{}': execution already in progress ({})",
                plugin.id,
                self.status()
            );
            return Err(Error::ProtocolViolation(format!(
                "execution already in progress (status: {})",
                self.status()
            )));
        }

        if command.plugin_id != plugin.id {
            return Err(Error::InvalidParameters(format!(
                "command targets '{}' but plugin is '{}'",
                command.plugin_id, plugin.id
            )));
        }

        let payload = encode_command(&OutboundCommand::from(&command))?;

        if !self.connection.is_open() {
            self.machine.begin_connect();
            if !self.open_connection().await {
                return Ok(self.status());
            }
        }

        self.machine.begin_execution(&command)?;
        self.plugin = Some(plugin.clone());
        info!("Executing plugin: {}", plugin);

        if let Err(e) = self.connection.send(payload) {
            self.machine.transport_failed(&e.to_string());
            self.connection.close();
        }
        Ok(self.status())
    }

    /// Ask the runtime to acknowledge an existing session.
    pub async fn subscribe(&mut self, session_id: SessionId) -> Result<Status> {
        self.machine.check_accepts_command("subscribe")?;
        let payload = encode_command(&OutboundCommand::Subscribe { session_id })?;

        if !self.connection.is_open() {
            self.machine.begin_connect();
            if !self.open_connection().await {
                return Ok(self.status());
            }
        }

        if let Err(e) = self.connection.send(payload) {
            self.machine.transport_failed(&e.to_string());
        }
        Ok(self.status())
    }

    /// Wait for and apply the next transport event.
    ///
    /// Returns `None` once no connection is live. Cancel safe, so it can be
    /// raced against a caller-side timer.
    pub async fn process_next(&mut self) -> Option<Status> {
        let event = self.connection.next_event().await?;
        let before = self.status();

        let status = match event {
            TransportEvent::Opened => {
                debug!("Transport open: {}", self.connection.endpoint());
                self.status()
            }
            TransportEvent::Message(payload) => match decode_envelope(&payload) {
                Ok(envelope) => self.machine.apply(envelope),
                Err(e) => {
                    self.machine.decode_failed(&payload, &e);
                    self.status()
                }
            },
            TransportEvent::Closed { code, reason } => {
                self.machine.connection_closed(code, &reason)
            }
            TransportEvent::Error(detail) => self.machine.transport_failed(&detail),
        };

        if status.is_terminal() && !before.is_terminal() {
            debug!("Run reached {}, releasing connection", status);
            self.connection.close();
        }

        Some(status)
    }

    /// Pump events until the run is terminal or the connection is gone.
    pub async fn run_until_terminal(&mut self) -> Status {
        while !self.status().is_terminal() {
            if self.process_next().await.is_none() {
                break;
            }
        }
        self.status()
    }

    /// Stop the current run and close the connection.
    ///
    /// Envelopes the runtime sends afterwards are never applied. Calling it
    /// again is a no-op.
    pub fn stop(&mut self) -> Status {
        let was_open = self.connection.connection_id().is_some();
        self.connection.close();
        if self.machine.stop() || was_open {
            info!("Execution stopped: run={:?}", self.run_id());
        }
        self.status()
    }

    /// Clear output; a finished run returns to idle.
    pub fn clear_output(&mut self) {
        self.machine.clear_output();
    }

    /// Close the connection and reset all session state.
    ///
    /// Idempotent, and safe before anything was opened. The connection's
    /// event stream is detached before state is reset.
    pub fn dispose(&mut self) {
        let had_connection = self.connection.connection_id().is_some();
        self.connection.close();
        self.machine.reset();
        self.plugin = None;
        if had_connection {
            info!("Executor disposed: {}", self.connection.endpoint());
        }
    }

    async fn open_connection(&mut self) -> bool {
        match self.connection.open().await {
            Ok(_) => true,
            Err(e) => {
                self.machine.transport_failed(&e.to_string());
                false
            }
        }
    }
}

impl Drop for PluginExecutor {
    fn drop(&mut self) {
        self.dispose();
    }
}
