//! Ordered output log of an execution session.

use chrono::{DateTime, Local};
use serde::Serialize;

/// Where a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    /// Plugin output from an `update` or `result` envelope
    Output,
    /// Informational notice (connected, subscribed, stopped)
    Notice,
    /// Locally generated failure report
    Diagnostic,
}

/// A single line of session output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLine {
    /// Line origin
    pub kind: LineKind,
    /// Line text
    pub text: String,
    /// Local time the line was appended
    pub received_at: DateTime<Local>,
}

impl OutputLine {
    /// Render as `[HH:MM:SS] text`.
    pub fn render(&self) -> String {
        format!("[{}] {}", self.received_at.format("%H:%M:%S"), self.text)
    }
}

/// Append-only output log.
///
/// Lines keep their arrival order; identical consecutive lines are all kept.
/// [`clear`](Self::clear) is the only way the log shrinks.
#[derive(Debug, Default)]
pub struct OutputAggregator {
    lines: Vec<OutputLine>,
    /// Position of last read
    last_read_pos: usize,
}

impl OutputAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line of the given kind.
    pub fn append(&mut self, kind: LineKind, text: impl Into<String>) {
        self.lines.push(OutputLine {
            kind,
            text: text.into(),
            received_at: Local::now(),
        });
    }

    /// Append a plugin output line.
    pub fn append_output(&mut self, text: impl Into<String>) {
        self.append(LineKind::Output, text);
    }

    /// Append an informational notice.
    pub fn append_notice(&mut self, text: impl Into<String>) {
        self.append(LineKind::Notice, text);
    }

    /// Append a diagnostic line.
    pub fn append_diagnostic(&mut self, text: impl Into<String>) {
        self.append(LineKind::Diagnostic, text);
    }

    /// All lines in arrival order.
    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    /// Text of all lines in arrival order.
    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.text.as_str()).collect()
    }

    /// Text of plugin output lines only, in arrival order.
    pub fn output_texts(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|line| line.kind == LineKind::Output)
            .map(|line| line.text.as_str())
            .collect()
    }

    /// Most recent line.
    pub fn last(&self) -> Option<&OutputLine> {
        self.lines.last()
    }

    /// Lines appended since the previous call.
    pub fn read_since_last(&mut self) -> &[OutputLine] {
        let start = self.last_read_pos;
        self.last_read_pos = self.lines.len();
        &self.lines[start..]
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether there are no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines not yet returned by [`read_since_last`](Self::read_since_last).
    pub fn unread_count(&self) -> usize {
        self.lines.len() - self.last_read_pos
    }

    /// Remove all lines.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.last_read_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregator_new() {
        let output = OutputAggregator::new();
        assert!(output.is_empty());
        assert_eq!(output.len(), 0);
        assert_eq!(output.unread_count(), 0);
    }

    #[test]
    fn test_append_preserves_order_and_duplicates() {
        let mut output = OutputAggregator::new();
        output.append_output("a");
        output.append_output("b");
        output.append_output("b");
        output.append_diagnostic("c");

        assert_eq!(output.texts(), vec!["a", "b", "b", "c"]);
        assert_eq!(output.output_texts(), vec!["a", "b", "b"]);
        assert_eq!(output.last().unwrap().kind, LineKind::Diagnostic);
    }

    #[test]
    fn test_read_since_last() {
        let mut output = OutputAggregator::new();
        output.append_output("first");

        let texts: Vec<_> = output.read_since_last().iter().map(|l| l.text.clone()).collect();
        assert_eq!(texts, vec!["first"]);
        assert_eq!(output.unread_count(), 0);

        output.append_output("second");
        output.append_notice("third");
        let texts: Vec<_> = output.read_since_last().iter().map(|l| l.text.clone()).collect();
        assert_eq!(texts, vec!["second", "third"]);

        assert!(output.read_since_last().is_empty());
    }

    #[test]
    fn test_clear() {
        let mut output = OutputAggregator::new();
        output.append_output("some data");
        output.read_since_last();
        output.clear();

        assert!(output.is_empty());
        assert_eq!(output.unread_count(), 0);

        output.append_output("fresh");
        assert_eq!(output.read_since_last().len(), 1);
    }

    #[test]
    fn test_render_has_timestamp_prefix() {
        let mut output = OutputAggregator::new();
        output.append_output("line1");
        let rendered = output.lines()[0].render();
        // "[HH:MM:SS] line1"
        assert_eq!(rendered.len(), "[00:00:00] line1".len());
        assert!(rendered.starts_with('['));
        assert!(rendered.ends_with("] line1"));
    }
}
