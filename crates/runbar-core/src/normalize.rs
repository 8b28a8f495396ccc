use std::collections::HashSet;

use runbar_types::{DispatchSpec, RawTaskDescriptor, TaskDescriptor, TaskSourceKind};

use crate::manifest::{PackageManifest, ParsedManifest, TasksManifest};

pub const DEFAULT_PACKAGE_MANAGER: &str = "npm";

/// Turns raw manifest entries into [`TaskDescriptor`]s.
///
/// Every raw shape maps to a descriptor; nothing here can fail. Names are a
/// pure function of the raw entry, which is what lets persisted selections
/// find the same task again on the next read.
#[derive(Debug, Clone)]
pub struct Normalizer {
    package_manager: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PACKAGE_MANAGER)
    }
}

impl Normalizer {
    pub fn new(package_manager: impl Into<String>) -> Self {
        let package_manager = package_manager.into();
        let package_manager = if package_manager.trim().is_empty() {
            DEFAULT_PACKAGE_MANAGER.to_string()
        } else {
            package_manager.trim().to_string()
        };
        Self { package_manager }
    }

    pub fn package_manager(&self) -> &str {
        &self.package_manager
    }

    pub fn package_run(&self, script: &str) -> DispatchSpec {
        DispatchSpec::ShellCommand {
            program: self.package_manager.clone(),
            args: vec!["run".to_string(), script.to_string()],
        }
    }

    pub fn package_run_summary(&self, script: &str) -> String {
        format!("{} run {}", self.package_manager, script)
    }

    /// The summary of a script is the command it maps to in the manifest.
    pub fn normalize_script(&self, name: &str, command: &str) -> TaskDescriptor {
        TaskDescriptor {
            name: name.to_string(),
            source_kind: TaskSourceKind::PackageScript,
            command_summary: command.to_string(),
            dispatch: self.package_run(name),
        }
    }

    pub fn normalize_editor_task(&self, raw: &RawTaskDescriptor) -> TaskDescriptor {
        let name = editor_task_name(raw);
        let (command_summary, dispatch) = match (raw.is_package_script_backed(), raw.script()) {
            (true, Some(script)) => (self.package_run_summary(script), self.package_run(script)),
            _ => match raw.command() {
                Some(command) => {
                    let args = raw.arg_values();
                    let summary = std::iter::once(command.to_string())
                        .chain(args.iter().cloned())
                        .collect::<Vec<_>>()
                        .join(" ");
                    (
                        summary,
                        DispatchSpec::ShellCommand {
                            program: command.to_string(),
                            args,
                        },
                    )
                }
                None => (
                    fallback_name(raw),
                    DispatchSpec::RawDescriptor {
                        descriptor: raw.clone(),
                    },
                ),
            },
        };
        TaskDescriptor {
            name,
            source_kind: TaskSourceKind::EditorTask,
            command_summary,
            dispatch,
        }
    }

    pub fn scripts(&self, manifest: &PackageManifest) -> Vec<TaskDescriptor> {
        manifest
            .scripts
            .iter()
            .flatten()
            .map(|(name, command)| self.normalize_script(name, command))
            .collect()
    }

    /// Later tasks whose name collides with an earlier one are dropped.
    pub fn editor_tasks(&self, manifest: &TasksManifest) -> Vec<TaskDescriptor> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(manifest.tasks.len());
        for raw in &manifest.tasks {
            let descriptor = self.normalize_editor_task(raw);
            if !seen.insert(descriptor.name.clone()) {
                tracing::warn!(
                    "duplicate editor task name `{}` ignored",
                    descriptor.name
                );
                continue;
            }
            out.push(descriptor);
        }
        out
    }

    pub fn descriptors(&self, manifest: &ParsedManifest) -> Vec<TaskDescriptor> {
        match manifest {
            ParsedManifest::Scripts(m) => self.scripts(m),
            ParsedManifest::Tasks(m) => self.editor_tasks(m),
        }
    }
}

/// Label, then `"<type>: <script>"` for package-script tasks, then the raw
/// command, then `"<type> task"`.
pub fn editor_task_name(raw: &RawTaskDescriptor) -> String {
    if let Some(label) = raw.label() {
        return label.to_string();
    }
    if raw.is_package_script_backed() {
        if let Some(script) = raw.script() {
            return format!("{}: {}", raw.kind(), script);
        }
    }
    if let Some(command) = raw.command() {
        return command.to_string();
    }
    fallback_name(raw)
}

fn fallback_name(raw: &RawTaskDescriptor) -> String {
    format!("{} task", raw.kind())
}

/// Shell-style rendering of a dispatch, used as menu detail text.
pub fn dispatch_command_line(descriptor: &TaskDescriptor) -> String {
    match &descriptor.dispatch {
        DispatchSpec::ShellCommand { program, args } => std::iter::once(program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" "),
        DispatchSpec::RawDescriptor { .. } => descriptor.command_summary.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawTaskDescriptor {
        serde_json::from_value(value).expect("raw descriptor")
    }

    #[test]
    fn name_prefers_explicit_label() {
        let task = raw(json!({"type": "npm", "label": "B", "script": "s"}));
        assert_eq!(editor_task_name(&task), "B");
        let padded = raw(json!({"type": "npm", "label": " B ", "script": "s"}));
        assert_eq!(editor_task_name(&padded), " B ");
    }

    #[test]
    fn name_synthesizes_package_script_form() {
        let task = raw(json!({"type": "npm", "script": "s"}));
        assert_eq!(editor_task_name(&task), "npm: s");
    }

    #[test]
    fn name_falls_back_to_command_then_type() {
        assert_eq!(editor_task_name(&raw(json!({"command": "echo hi"}))), "echo hi");
        assert_eq!(editor_task_name(&raw(json!({"type": "shell"}))), "shell task");
        assert_eq!(
            editor_task_name(&raw(json!({"type": "shell", "script": "s"}))),
            "shell task"
        );
    }

    #[test]
    fn package_script_task_dispatches_through_package_manager() {
        let normalizer = Normalizer::new("pnpm");
        let task = normalizer.normalize_editor_task(&raw(json!({"type": "npm", "script": "build"})));
        assert_eq!(task.command_summary, "pnpm run build");
        assert_eq!(
            task.dispatch,
            DispatchSpec::ShellCommand {
                program: "pnpm".to_string(),
                args: vec!["run".to_string(), "build".to_string()],
            }
        );
    }

    #[test]
    fn command_task_summary_joins_arguments() {
        let task = Normalizer::default().normalize_editor_task(&raw(json!({
            "type": "shell",
            "label": "lint",
            "command": "eslint",
            "args": ["src", "--fix"]
        })));
        assert_eq!(task.name, "lint");
        assert_eq!(task.command_summary, "eslint src --fix");
        assert_eq!(
            task.dispatch,
            DispatchSpec::ShellCommand {
                program: "eslint".to_string(),
                args: vec!["src".to_string(), "--fix".to_string()],
            }
        );
    }

    #[test]
    fn commandless_task_keeps_raw_descriptor() {
        let original = raw(json!({"type": "typescript", "tsconfig": "tsconfig.json"}));
        let task = Normalizer::default().normalize_editor_task(&original);
        assert_eq!(task.name, "typescript task");
        assert_eq!(task.command_summary, "typescript task");
        assert_eq!(
            task.dispatch,
            DispatchSpec::RawDescriptor {
                descriptor: original
            }
        );
    }

    #[test]
    fn normalization_is_stable_across_calls() {
        let task = raw(json!({"type": "npm", "script": "watch", "isBackground": true}));
        let normalizer = Normalizer::default();
        assert_eq!(
            normalizer.normalize_editor_task(&task),
            normalizer.normalize_editor_task(&task)
        );
    }

    #[test]
    fn duplicate_editor_task_names_keep_first() {
        let manifest: TasksManifest = serde_json::from_value(json!({
            "version": "2.0.0",
            "tasks": [
                {"label": "build", "command": "make"},
                {"label": "build", "command": "cargo build"},
                {"label": "test", "command": "make test"}
            ]
        }))
        .expect("manifest");
        let tasks = Normalizer::default().editor_tasks(&manifest);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].command_summary, "make");
    }

    #[test]
    fn scripts_map_one_to_one_with_manifest_keys() {
        let manifest: PackageManifest = serde_json::from_value(json!({
            "scripts": {"build": "tsc", "test": "mocha", "start": "node index.js"}
        }))
        .expect("manifest");
        let tasks = Normalizer::default().scripts(&manifest);
        let names = tasks.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["build", "test", "start"]);
        assert_eq!(tasks[0].command_summary, "tsc");
        assert_eq!(dispatch_command_line(&tasks[0]), "npm run build");
    }
}
