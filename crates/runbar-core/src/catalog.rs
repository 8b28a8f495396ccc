use std::path::{Path, PathBuf};
use std::sync::Arc;

use runbar_observability::{current_process, emit_event, ObservabilityEvent};
use runbar_types::{TaskDescriptor, TaskSourceKind};

use crate::config::SettingsStore;
use crate::error::{LaunchError, ManifestError, Result};
use crate::manifest::{find_manifest, load_manifest};
use crate::normalize::{Normalizer, DEFAULT_PACKAGE_MANAGER};

/// Discoverable tasks per source kind, and the subset the user chose to show.
#[derive(Clone)]
pub struct SelectionCatalog {
    root: Option<PathBuf>,
    settings: Arc<dyn SettingsStore>,
}

impl SelectionCatalog {
    pub fn new(root: Option<PathBuf>, settings: Arc<dyn SettingsStore>) -> Self {
        Self { root, settings }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn manifest_available(&self, kind: TaskSourceKind) -> bool {
        find_manifest(self.root(), kind).is_some()
    }

    pub async fn normalizer(&self) -> Normalizer {
        let manager = self
            .settings
            .get_value("packageManager")
            .await
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_PACKAGE_MANAGER.to_string());
        Normalizer::new(manager)
    }

    /// Every task currently in the manifest. An absent manifest is empty.
    pub async fn list_candidates(&self, kind: TaskSourceKind) -> Result<Vec<TaskDescriptor>> {
        match load_manifest(self.root(), kind).await {
            Ok(manifest) => Ok(self.normalizer().await.descriptors(&manifest)),
            Err(ManifestError::NotFound { .. }) => Ok(Vec::new()),
            Err(err) => {
                let detail = err.to_string();
                emit_event(
                    tracing::Level::WARN,
                    current_process(),
                    ObservabilityEvent {
                        event: "manifest.parse_failed",
                        component: "core.catalog",
                        source_kind: Some(kind.as_str()),
                        status: Some("failed"),
                        error_code: Some("MANIFEST_PARSE_ERROR"),
                        detail: Some(&detail),
                        ..ObservabilityEvent::default()
                    },
                );
                Err(err.into())
            }
        }
    }

    /// Like [`Self::list_candidates`] but a missing manifest is an error,
    /// for flows the user asked for explicitly.
    pub async fn require_candidates(&self, kind: TaskSourceKind) -> Result<Vec<TaskDescriptor>> {
        if !self.manifest_available(kind) {
            return Err(ManifestError::NotFound { kind }.into());
        }
        self.list_candidates(kind).await
    }

    pub async fn selection(&self, kind: TaskSourceKind) -> Vec<String> {
        if let Some(names) = self.settings.get_string_list(kind.selection_key()).await {
            return names;
        }
        match kind.legacy_selection_key() {
            Some(legacy) => self
                .settings
                .get_string_list(legacy)
                .await
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Selected tasks in selection order. Names that no longer resolve are
    /// skipped.
    pub async fn list_selected(&self, kind: TaskSourceKind) -> Result<Vec<TaskDescriptor>> {
        let selection = self.selection(kind).await;
        if selection.is_empty() {
            return Ok(Vec::new());
        }
        let candidates = self.list_candidates(kind).await?;
        Ok(selection
            .iter()
            .filter_map(|name| candidates.iter().find(|c| &c.name == name).cloned())
            .collect())
    }

    /// Replaces the selection set for `kind`. Returns the stored names.
    pub async fn update_selection(
        &self,
        kind: TaskSourceKind,
        chosen: Vec<String>,
    ) -> Result<Vec<String>> {
        let mut names: Vec<String> = Vec::with_capacity(chosen.len());
        for name in chosen {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        self.settings
            .set_string_list(kind.selection_key(), &names)
            .await
            .map_err(|err| LaunchError::Settings(err.to_string()))?;
        let detail = format!("count={}", names.len());
        emit_event(
            tracing::Level::INFO,
            current_process(),
            ObservabilityEvent {
                event: "selection.updated",
                component: "core.catalog",
                source_kind: Some(kind.as_str()),
                status: Some("ok"),
                detail: Some(&detail),
                ..ObservabilityEvent::default()
            },
        );
        Ok(names)
    }

    pub async fn find(&self, kind: TaskSourceKind, name: &str) -> Result<Option<TaskDescriptor>> {
        Ok(self
            .list_candidates(kind)
            .await?
            .into_iter()
            .find(|c| c.name == name))
    }
}

pub fn selection_confirmation(kind: TaskSourceKind, count: usize) -> String {
    if count == 0 {
        format!("No {}s selected", kind.noun())
    } else {
        format!("Selected {} {}(s)", count, kind.noun())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{catalog_for, write_file};
    use tempfile::TempDir;

    const SCRIPTS: &str = r#"{"scripts":{"build":"tsc","test":"mocha","start":"node index.js"}}"#;

    #[tokio::test]
    async fn candidates_match_script_keys() {
        let dir = TempDir::new().expect("tempdir");
        write_file(&dir, "package.json", SCRIPTS);
        let catalog = catalog_for(&dir).await;

        let candidates = catalog
            .list_candidates(TaskSourceKind::PackageScript)
            .await
            .expect("candidates");
        let names = candidates.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["build", "test", "start"]);

        let again = catalog
            .list_candidates(TaskSourceKind::PackageScript)
            .await
            .expect("again");
        assert_eq!(candidates, again);
    }

    #[tokio::test]
    async fn missing_manifest_lists_nothing_but_require_reports_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let catalog = catalog_for(&dir).await;
        assert!(catalog
            .list_candidates(TaskSourceKind::EditorTask)
            .await
            .expect("candidates")
            .is_empty());
        let err = catalog
            .require_candidates(TaskSourceKind::EditorTask)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn selected_follow_selection_order_and_skip_stale_names() {
        let dir = TempDir::new().expect("tempdir");
        write_file(&dir, "package.json", SCRIPTS);
        let catalog = catalog_for(&dir).await;

        let stored = catalog
            .update_selection(
                TaskSourceKind::PackageScript,
                vec![
                    "start".to_string(),
                    "gone".to_string(),
                    "build".to_string(),
                    "start".to_string(),
                ],
            )
            .await
            .expect("update");
        assert_eq!(stored, vec!["start", "gone", "build"]);

        let selected = catalog
            .list_selected(TaskSourceKind::PackageScript)
            .await
            .expect("selected");
        let names = selected.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["start", "build"]);
    }

    #[tokio::test]
    async fn update_replaces_rather_than_merges() {
        let dir = TempDir::new().expect("tempdir");
        write_file(&dir, "package.json", SCRIPTS);
        let catalog = catalog_for(&dir).await;
        catalog
            .update_selection(
                TaskSourceKind::PackageScript,
                vec!["build".to_string(), "test".to_string()],
            )
            .await
            .expect("first");
        catalog
            .update_selection(TaskSourceKind::PackageScript, Vec::new())
            .await
            .expect("clear");
        assert!(catalog
            .list_selected(TaskSourceKind::PackageScript)
            .await
            .expect("selected")
            .is_empty());
    }

    #[tokio::test]
    async fn legacy_selection_key_is_still_read() {
        let dir = TempDir::new().expect("tempdir");
        write_file(&dir, "package.json", SCRIPTS);
        write_file(&dir, ".runbar/settings.json", r#"{"selectedTasks":["test"]}"#);
        let catalog = catalog_for(&dir).await;
        assert_eq!(
            catalog.selection(TaskSourceKind::PackageScript).await,
            vec!["test".to_string()]
        );
    }

    #[tokio::test]
    async fn editor_selection_is_kept_separate() {
        let dir = TempDir::new().expect("tempdir");
        write_file(&dir, "package.json", SCRIPTS);
        write_file(
            &dir,
            ".vscode/tasks.json",
            r#"{"version":"2.0.0","tasks":[{"type":"npm","script":"build"},{"label":"lint","command":"eslint"}]}"#,
        );
        let catalog = catalog_for(&dir).await;
        catalog
            .update_selection(TaskSourceKind::EditorTask, vec!["npm: build".to_string()])
            .await
            .expect("update");

        let editor = catalog
            .list_selected(TaskSourceKind::EditorTask)
            .await
            .expect("editor");
        assert_eq!(editor.len(), 1);
        assert_eq!(editor[0].command_summary, "npm run build");
        assert!(catalog
            .list_selected(TaskSourceKind::PackageScript)
            .await
            .expect("scripts")
            .is_empty());
    }

    #[tokio::test]
    async fn parse_error_is_not_swallowed() {
        let dir = TempDir::new().expect("tempdir");
        write_file(&dir, ".vscode/tasks.json", "{ \"tasks\": [ }");
        let catalog = catalog_for(&dir).await;
        catalog
            .update_selection(TaskSourceKind::EditorTask, vec!["x".to_string()])
            .await
            .expect("update");
        let err = catalog
            .list_selected(TaskSourceKind::EditorTask)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LaunchError::Manifest(ManifestError::Parse { .. })
        ));
    }

    #[test]
    fn confirmation_reports_count_or_none() {
        assert_eq!(
            selection_confirmation(TaskSourceKind::PackageScript, 2),
            "Selected 2 script(s)"
        );
        assert_eq!(
            selection_confirmation(TaskSourceKind::EditorTask, 0),
            "No tasks selected"
        );
    }
}
