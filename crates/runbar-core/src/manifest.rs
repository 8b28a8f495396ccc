use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use runbar_types::{RawTaskDescriptor, TaskSourceKind};
use serde::Deserialize;
use tokio::fs;

use crate::error::ManifestError;
use crate::jsonc::parse_jsonc;

pub const PACKAGE_MANIFEST_PATH: &str = "package.json";
pub const EDITOR_TASKS_MANIFEST_PATH: &str = ".vscode/tasks.json";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    /// Script name to command, in file order.
    #[serde(default)]
    pub scripts: Option<IndexMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TasksManifest {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tasks: Vec<RawTaskDescriptor>,
}

#[derive(Debug, Clone)]
pub enum ParsedManifest {
    Scripts(PackageManifest),
    Tasks(TasksManifest),
}

impl ParsedManifest {
    pub fn is_empty(&self) -> bool {
        match self {
            ParsedManifest::Scripts(m) => m.scripts.as_ref().map_or(true, |s| s.is_empty()),
            ParsedManifest::Tasks(m) => m.tasks.is_empty(),
        }
    }
}

pub fn manifest_path(root: &Path, kind: TaskSourceKind) -> PathBuf {
    match kind {
        TaskSourceKind::PackageScript => root.join(PACKAGE_MANIFEST_PATH),
        TaskSourceKind::EditorTask => root.join(EDITOR_TASKS_MANIFEST_PATH),
    }
}

/// Absence is not an error: `None` when there is no workspace or no file.
pub fn find_manifest(root: Option<&Path>, kind: TaskSourceKind) -> Option<PathBuf> {
    let path = manifest_path(root?, kind);
    path.is_file().then_some(path)
}

pub async fn read_manifest(
    path: &Path,
    kind: TaskSourceKind,
) -> Result<ParsedManifest, ManifestError> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ManifestError::NotFound { kind });
        }
        Err(source) => {
            return Err(ManifestError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let parse_error = |err: serde_json::Error| ManifestError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    match kind {
        TaskSourceKind::PackageScript => serde_json::from_str::<PackageManifest>(&raw)
            .map(ParsedManifest::Scripts)
            .map_err(parse_error),
        TaskSourceKind::EditorTask => parse_jsonc::<TasksManifest>(&raw)
            .map(ParsedManifest::Tasks)
            .map_err(parse_error),
    }
}

/// Locates and reads the manifest for `kind`. Always hits the disk.
pub async fn load_manifest(
    root: Option<&Path>,
    kind: TaskSourceKind,
) -> Result<ParsedManifest, ManifestError> {
    let Some(path) = find_manifest(root, kind) else {
        return Err(ManifestError::NotFound { kind });
    };
    read_manifest(&path, kind).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) -> PathBuf {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(&path, content).expect("write");
        path
    }

    #[tokio::test]
    async fn package_scripts_keep_file_order() {
        let dir = TempDir::new().expect("tempdir");
        write(
            &dir,
            "package.json",
            r#"{"name":"test-project","scripts":{"start":"node index.js","build":"tsc","test":"mocha"}}"#,
        );

        let parsed = load_manifest(Some(dir.path()), TaskSourceKind::PackageScript)
            .await
            .expect("load");
        let ParsedManifest::Scripts(manifest) = parsed else {
            panic!("expected scripts manifest");
        };
        let scripts = manifest.scripts.expect("scripts");
        let keys = scripts.keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["start", "build", "test"]);
        assert_eq!(scripts["build"], "tsc");
    }

    #[tokio::test]
    async fn package_without_scripts_is_empty_not_error() {
        let dir = TempDir::new().expect("tempdir");
        write(&dir, "package.json", r#"{"name":"no-scripts","version":"1.0.0"}"#);
        let parsed = load_manifest(Some(dir.path()), TaskSourceKind::PackageScript)
            .await
            .expect("load");
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn invalid_package_json_is_parse_error() {
        let dir = TempDir::new().expect("tempdir");
        write(&dir, "package.json", "{ invalid json }");
        let err = load_manifest(Some(dir.path()), TaskSourceKind::PackageScript)
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
        assert!(err.to_string().contains("package.json"));
    }

    #[tokio::test]
    async fn missing_manifest_or_workspace_is_not_found() {
        let dir = TempDir::new().expect("tempdir");
        assert!(find_manifest(Some(dir.path()), TaskSourceKind::EditorTask).is_none());
        assert!(find_manifest(None, TaskSourceKind::PackageScript).is_none());
        let err = load_manifest(None, TaskSourceKind::EditorTask)
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::NotFound { .. }));
    }

    #[tokio::test]
    async fn editor_tasks_tolerate_comments() {
        let dir = TempDir::new().expect("tempdir");
        write(
            &dir,
            ".vscode/tasks.json",
            r#"{
                // See https://go.microsoft.com/fwlink/?LinkId=733558
                "version": "2.0.0",
                "tasks": [
                    /* the build */
                    { "type": "npm", "script": "build", "group": "build" },
                ]
            }"#,
        );
        let parsed = load_manifest(Some(dir.path()), TaskSourceKind::EditorTask)
            .await
            .expect("load");
        let ParsedManifest::Tasks(manifest) = parsed else {
            panic!("expected tasks manifest");
        };
        assert_eq!(manifest.version.as_deref(), Some("2.0.0"));
        assert_eq!(manifest.tasks.len(), 1);
        assert_eq!(manifest.tasks[0].script(), Some("build"));
    }

    #[tokio::test]
    async fn manifest_edits_are_seen_on_next_read() {
        let dir = TempDir::new().expect("tempdir");
        write(&dir, "package.json", r#"{"scripts":{"a":"x"}}"#);
        let first = load_manifest(Some(dir.path()), TaskSourceKind::PackageScript)
            .await
            .expect("first");
        write(&dir, "package.json", r#"{"scripts":{"a":"x","b":"y"}}"#);
        let second = load_manifest(Some(dir.path()), TaskSourceKind::PackageScript)
            .await
            .expect("second");
        let count = |m: &ParsedManifest| match m {
            ParsedManifest::Scripts(s) => s.scripts.as_ref().map_or(0, |s| s.len()),
            ParsedManifest::Tasks(t) => t.tasks.len(),
        };
        assert_eq!(count(&first), 1);
        assert_eq!(count(&second), 2);
    }
}
