//! Command transport seam.
//!
//! Tasks never spawn processes themselves. They hand fully composed shell
//! command lines to a [`Transport`], which runs them against one host and
//! returns the captured result.

use serde::Serialize;
use std::cell::RefCell;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }
}

pub trait Transport {
    /// Run one command line, optionally feeding `stdin`.
    fn execute(&self, command: &str, stdin: Option<&[u8]>) -> CommandOutput;

    /// Human-readable target, e.g. `deploy@10.0.0.5`.
    fn describe(&self) -> String;
}

/// A command seen by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedCommand {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
}

/// In-memory transport that records commands and answers from rules.
///
/// A rule matches when its pattern is a substring of the command line. The
/// most recently added matching rule wins; unmatched commands succeed with
/// empty output.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    label: String,
    rules: Vec<(String, CommandOutput)>,
    recorded: RefCell<Vec<RecordedCommand>>,
}

impl RecordingTransport {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Transport for `--dry-run`: remote paths never exist, everything else succeeds.
    pub fn dry_run(label: impl Into<String>) -> Self {
        Self::new(label).with_response("test -e ", CommandOutput::failed(1, ""))
    }

    pub fn with_response(mut self, pattern: impl Into<String>, output: CommandOutput) -> Self {
        self.rules.push((pattern.into(), output));
        self
    }

    pub fn with_stdout(self, pattern: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.with_response(pattern, CommandOutput::ok(stdout))
    }

    pub fn with_failure(self, pattern: impl Into<String>) -> Self {
        self.with_response(pattern, CommandOutput::failed(1, ""))
    }

    /// Command lines in issue order.
    pub fn commands(&self) -> Vec<String> {
        self.recorded
            .borrow()
            .iter()
            .map(|r| r.command.clone())
            .collect()
    }

    pub fn recorded(&self) -> Vec<RecordedCommand> {
        self.recorded.borrow().clone()
    }
}

impl Transport for RecordingTransport {
    fn execute(&self, command: &str, stdin: Option<&[u8]>) -> CommandOutput {
        self.recorded.borrow_mut().push(RecordedCommand {
            command: command.to_string(),
            stdin: stdin.map(|bytes| String::from_utf8_lossy(bytes).to_string()),
        });

        self.rules
            .iter()
            .rev()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""))
    }

    fn describe(&self) -> String {
        format!("recording:{}", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_rules_take_precedence() {
        let transport = RecordingTransport::new("web1")
            .with_stdout("cat", "first")
            .with_stdout("cat /etc", "second");

        assert_eq!(transport.execute("cat /etc/group", None).stdout, "second");
        assert_eq!(transport.execute("cat notes", None).stdout, "first");
        assert!(transport.execute("true", None).success);
    }

    #[test]
    fn records_commands_and_stdin() {
        let transport = RecordingTransport::new("web1");
        transport.execute("cat > '/tmp/x'", Some(b"payload"));

        let recorded = transport.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].stdin.as_deref(), Some("payload"));
    }

    #[test]
    fn dry_run_reports_paths_absent() {
        let transport = RecordingTransport::dry_run("web1");
        assert!(!transport.execute("test -e '/home/x'", None).success);
        assert!(transport.execute("apt-get update -y", None).success);
    }
}
