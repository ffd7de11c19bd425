//! Control records embedded in the container's log stream.
//!
//! The container writes newline-delimited log output. Most lines are free
//! text; some are JSON records. A record whose `msg` is
//! `scripts.run.cleanup` carries a `chainable` flag telling whether the run's
//! output can feed another run. Any line that parses as such a record is
//! accepted, wherever it appears in the stream.

use serde::Deserialize;

/// `msg` value of the end-of-run record.
pub const CLEANUP_MESSAGE: &str = "scripts.run.cleanup";

/// The fields of a JSON log record the orchestrator looks at.
#[derive(Debug, Deserialize)]
struct LogRecord {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    chainable: Option<serde_json::Value>,
}

/// Parse one log line. Returns the chainability it declares if the line is a
/// cleanup record, `None` for every other line.
pub fn parse_line(line: &str) -> Option<bool> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let record: LogRecord = serde_json::from_str(trimmed).ok()?;
    if record.msg.as_deref() != Some(CLEANUP_MESSAGE) {
        return None;
    }
    Some(matches!(record.chainable, Some(serde_json::Value::Bool(true))))
}

/// Whether the run may feed a subsequent run.
///
/// Starts at `false` and is replaced by each cleanup record in stream order,
/// so the last record before exit decides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContinuationSignal(bool);

impl ContinuationSignal {
    /// Fold one log line into the signal.
    pub fn observe(self, line: &str) -> Self {
        match parse_line(line) {
            Some(chainable) => ContinuationSignal(chainable),
            None => self,
        }
    }

    pub fn is_continuable(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_record_chainable() {
        assert_eq!(
            parse_line(r#"{"msg":"scripts.run.cleanup","chainable":true}"#),
            Some(true)
        );
        assert_eq!(
            parse_line(r#"{"level":30,"msg":"scripts.run.cleanup","chainable":false}"#),
            Some(false)
        );
    }

    #[test]
    fn test_cleanup_record_without_flag_is_not_chainable() {
        assert_eq!(parse_line(r#"{"msg":"scripts.run.cleanup"}"#), Some(false));
        assert_eq!(
            parse_line(r#"{"msg":"scripts.run.cleanup","chainable":"true"}"#),
            Some(false)
        );
    }

    #[test]
    fn test_other_lines_ignored() {
        assert_eq!(parse_line("Navigating to https://example.org"), None);
        assert_eq!(parse_line(r#"{"chainable":true}"#), None);
        assert_eq!(parse_line(r#"{"msg":"scripts.run.begin"}"#), None);
        assert_eq!(parse_line(r#"{"msg": "scripts.run.cleanup", "#), None);
        assert_eq!(parse_line("[1, 2, 3]"), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn test_signal_defaults_to_false() {
        assert!(!ContinuationSignal::default().is_continuable());
    }

    #[test]
    fn test_signal_last_record_wins() {
        let lines = [
            "starting",
            r#"{"msg":"scripts.run.cleanup","chainable":true}"#,
            "more output",
            r#"{"msg":"scripts.run.cleanup","chainable":false}"#,
            "done",
        ];
        let signal = lines
            .iter()
            .fold(ContinuationSignal::default(), |s, l| s.observe(l));
        assert!(!signal.is_continuable());

        let signal = lines[..3]
            .iter()
            .fold(ContinuationSignal::default(), |s, l| s.observe(l));
        assert!(signal.is_continuable());
    }
}
