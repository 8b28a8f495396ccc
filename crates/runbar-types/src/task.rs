use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which manifest a task was discovered in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskSourceKind {
    PackageScript,
    EditorTask,
}

impl TaskSourceKind {
    pub const ALL: [TaskSourceKind; 2] = [TaskSourceKind::PackageScript, TaskSourceKind::EditorTask];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskSourceKind::PackageScript => "package_script",
            TaskSourceKind::EditorTask => "editor_task",
        }
    }

    /// Settings key holding the selection set for this kind.
    pub fn selection_key(self) -> &'static str {
        match self {
            TaskSourceKind::PackageScript => "selectedScripts",
            TaskSourceKind::EditorTask => "selectedVSCodeTasks",
        }
    }

    /// Older settings files stored package scripts under this key.
    pub fn legacy_selection_key(self) -> Option<&'static str> {
        match self {
            TaskSourceKind::PackageScript => Some("selectedTasks"),
            TaskSourceKind::EditorTask => None,
        }
    }

    pub fn manifest_file_name(self) -> &'static str {
        match self {
            TaskSourceKind::PackageScript => "package.json",
            TaskSourceKind::EditorTask => "tasks.json",
        }
    }

    /// Singular noun used in user-facing messages.
    pub fn noun(self) -> &'static str {
        match self {
            TaskSourceKind::PackageScript => "script",
            TaskSourceKind::EditorTask => "task",
        }
    }
}

impl fmt::Display for TaskSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskSourceKind::PackageScript => "package script",
            TaskSourceKind::EditorTask => "editor task",
        };
        f.write_str(label)
    }
}

impl FromStr for TaskSourceKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "scripts" | "script" | "package" | "package_script" | "package-script" | "npm" => {
                Ok(TaskSourceKind::PackageScript)
            }
            "tasks" | "task" | "editor" | "editor_task" | "editor-task" | "vscode" => {
                Ok(TaskSourceKind::EditorTask)
            }
            other => Err(format!(
                "unknown task source `{other}`. expected one of: scripts, tasks"
            )),
        }
    }
}

/// One argument of an editor task. The editor accepts either a bare string
/// or an object carrying a quoting hint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TaskArg {
    Plain(String),
    Quoted {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quoting: Option<String>,
    },
}

impl TaskArg {
    pub fn as_str(&self) -> &str {
        match self {
            TaskArg::Plain(value) => value,
            TaskArg::Quoted { value, .. } => value,
        }
    }
}

/// A task entry exactly as it appears in `tasks.json`.
///
/// Grouping, background and presentation metadata are carried through
/// untouched; unknown fields land in `extra` so a backend interpreting the
/// raw descriptor sees everything the file declared.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawTaskDescriptor {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<TaskArg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Value>,
    #[serde(
        rename = "isBackground",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_background: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub const DEFAULT_EDITOR_TASK_KIND: &str = "shell";
pub const PACKAGE_SCRIPT_TASK_KIND: &str = "npm";

impl RawTaskDescriptor {
    /// The kind discriminator; a missing `type` is treated as a shell task.
    pub fn kind(&self) -> &str {
        non_blank(self.kind.as_deref()).unwrap_or(DEFAULT_EDITOR_TASK_KIND)
    }

    pub fn label(&self) -> Option<&str> {
        non_blank(self.label.as_deref())
    }

    pub fn script(&self) -> Option<&str> {
        non_blank(self.script.as_deref())
    }

    pub fn command(&self) -> Option<&str> {
        non_blank(self.command.as_deref())
    }

    pub fn arg_values(&self) -> Vec<String> {
        self.args.iter().map(|a| a.as_str().to_string()).collect()
    }

    pub fn is_package_script_backed(&self) -> bool {
        self.kind() == PACKAGE_SCRIPT_TASK_KIND
    }
}

/// Whitespace-only counts as missing; anything else is kept as written.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchSpec {
    ShellCommand { program: String, args: Vec<String> },
    RawDescriptor { descriptor: RawTaskDescriptor },
}

/// Uniform runnable unit regardless of which manifest it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDescriptor {
    pub name: String,
    pub source_kind: TaskSourceKind,
    pub command_summary: String,
    pub dispatch: DispatchSpec,
}

impl TaskDescriptor {
    /// Name given to the terminal session the task runs in.
    pub fn display_name(&self) -> String {
        format!("Task - {}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_descriptor_keeps_unknown_fields_and_quoted_args() {
        let raw: RawTaskDescriptor = serde_json::from_value(json!({
            "type": "shell",
            "label": "lint",
            "command": "eslint",
            "args": ["src", {"value": "a b", "quoting": "strong"}],
            "problemMatcher": ["$eslint-stylish"],
            "isBackground": false
        }))
        .expect("parse");

        assert_eq!(raw.arg_values(), vec!["src".to_string(), "a b".to_string()]);
        assert_eq!(raw.is_background, Some(false));
        assert!(raw.extra.contains_key("problemMatcher"));
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let raw = RawTaskDescriptor {
            label: Some("  ".to_string()),
            ..RawTaskDescriptor::default()
        };
        assert_eq!(raw.label(), None);
        assert_eq!(raw.kind(), DEFAULT_EDITOR_TASK_KIND);
    }

    #[test]
    fn present_fields_keep_surrounding_whitespace() {
        let raw = RawTaskDescriptor {
            label: Some(" B ".to_string()),
            command: Some("make ".to_string()),
            ..RawTaskDescriptor::default()
        };
        assert_eq!(raw.label(), Some(" B "));
        assert_eq!(raw.command(), Some("make "));
    }

    #[test]
    fn source_kind_parses_cli_aliases() {
        assert_eq!(
            "scripts".parse::<TaskSourceKind>(),
            Ok(TaskSourceKind::PackageScript)
        );
        assert_eq!(
            "VSCode".parse::<TaskSourceKind>(),
            Ok(TaskSourceKind::EditorTask)
        );
        assert!("makefile".parse::<TaskSourceKind>().is_err());
    }
}
