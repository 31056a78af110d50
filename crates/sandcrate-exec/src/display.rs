//! Terminal rendering of session output.

use serde::Serialize;

use sandcrate_exec_core::{PluginRef, RunId, SessionId, Status};
use sandcrate_exec_session::{LineKind, OutputLine, PluginExecutor};

/// Render one line for the terminal. Diagnostics are marked with `!`.
pub fn render_line(line: &OutputLine) -> String {
    match line.kind {
        LineKind::Diagnostic => format!("! {}", line.render()),
        LineKind::Output | LineKind::Notice => line.render(),
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Plugin that was run
    pub plugin: Option<PluginRef>,
    /// Local run identifier
    pub run_id: Option<RunId>,
    /// Session identifier announced by the runtime
    pub session_id: Option<SessionId>,
    /// Final status
    pub status: Status,
    /// Milliseconds from start to capture
    pub elapsed_ms: Option<u64>,
    /// Most recent error message
    pub last_error: Option<String>,
    /// All output lines, in arrival order
    pub lines: Vec<OutputLine>,
}

impl RunReport {
    /// Capture the executor's current session.
    pub fn capture(executor: &PluginExecutor) -> Self {
        let state = executor.state();
        Self {
            plugin: executor.plugin().cloned(),
            run_id: executor.run_id(),
            session_id: state.session_id.clone(),
            status: state.status,
            elapsed_ms: executor
                .elapsed()
                .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)),
            last_error: state.last_error.clone(),
            lines: executor.output().lines().to_vec(),
        }
    }

    /// Whether the run finished successfully.
    pub fn succeeded(&self) -> bool {
        self.status == Status::Completed
    }

    /// One-line outcome for the end of a streamed run.
    pub fn summary(&self) -> String {
        let plugin = self
            .plugin
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "plugin".to_string());
        let mut summary = match &self.last_error {
            Some(error) if !self.succeeded() => format!("{plugin}: {} ({error})", self.status),
            _ => format!("{plugin}: {}", self.status),
        };
        if let Some(ms) = self.elapsed_ms {
            summary.push_str(&format!(" in {ms} ms"));
        }
        summary
    }
}
