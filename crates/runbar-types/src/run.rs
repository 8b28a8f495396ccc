use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TaskSourceKind;

/// Identifies one execution started by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TaskHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failure,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Failure => "failure",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, RunOutcome::Success)
    }
}

/// What a backend reports when an execution ends.
///
/// `execution_reported` is false when the backend lost track of the
/// execution (its observer was dropped or it never produced an execution
/// object). `exit_code` is only present when the backend can observe it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskEnded {
    pub execution_reported: bool,
    pub exit_code: Option<i32>,
    pub output: Option<String>,
}

/// Outcome summary of the most recently finished task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub task_name: String,
    pub source_kind: TaskSourceKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub exit_code: Option<i32>,
    pub output: String,
}

impl RunRecord {
    pub fn render_summary(&self) -> String {
        let exit_code = self
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        let elapsed = self.finished_at - self.started_at;
        format!(
            "Task: {}\nSource: {}\nStarted: {}\nDuration: {:.1}s\nOutcome: {}\nExit code: {}\n\n--- Output ---\n{}\n",
            self.task_name,
            self.source_kind,
            self.started_at.to_rfc3339(),
            elapsed.num_milliseconds().max(0) as f64 / 1000.0,
            self.outcome.as_str(),
            exit_code,
            self.output
        )
    }
}
