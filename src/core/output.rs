//! Public output types for task runs.
//!
//! A [`TaskReport`] is what the dispatcher hands back to the CLI: the task's
//! outcome plus every remote step it issued, in order.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Command run as the acting user.
    Run,
    /// Command run through sudo.
    Sudo,
    /// File content written to the remote host.
    Upload,
    /// Read-only probe (existence checks, queries).
    Check,
}

impl StepKind {
    pub fn is_mutation(self) -> bool {
        !matches!(self, StepKind::Check)
    }
}

/// One remote call as issued by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub kind: StepKind,
    /// The command before user/cwd wrapping.
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    pub success: bool,
    pub exit_code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    /// Nothing to do; remote state already satisfied the task.
    Skipped { reason: String },
    /// A precondition failed. Not an error: no further steps were issued.
    Conflict { reason: String },
}

impl Outcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Outcome::Conflict {
            reason: reason.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub task: String,
    pub host: String,
    pub outcome: Outcome,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl TaskReport {
    /// Steps that changed (or tried to change) remote state.
    pub fn mutations(&self) -> Vec<&StepRecord> {
        self.steps.iter().filter(|s| s.kind.is_mutation()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_with_status_tag() {
        let value = serde_json::to_value(Outcome::conflict("exists")).unwrap();
        assert_eq!(value["status"], "conflict");
        assert_eq!(value["reason"], "exists");

        let value = serde_json::to_value(Outcome::Completed).unwrap();
        assert_eq!(value["status"], "completed");
    }
}
