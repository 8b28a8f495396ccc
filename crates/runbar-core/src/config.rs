use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::fs;
use tokio::sync::RwLock;

use crate::normalize::DEFAULT_PACKAGE_MANAGER;

pub const PROJECT_SETTINGS_PATH: &str = ".runbar/settings.json";
pub const DEFAULT_CLEANUP_DELAY_MS: u64 = 1500;

/// Durable key-value settings scoped to the current project.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_value(&self, key: &str) -> Option<Value>;
    async fn set_value(&self, key: &str, value: Value) -> anyhow::Result<()>;

    async fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
        let Some(Value::Array(items)) = self.get_value(key).await else {
            return None;
        };
        Some(
            items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    }

    async fn set_string_list(&self, key: &str, values: &[String]) -> anyhow::Result<()> {
        self.set_value(key, json!(values)).await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherSettings {
    #[serde(default = "default_package_manager")]
    pub package_manager: String,
    #[serde(default = "default_cleanup_delay_ms")]
    pub cleanup_delay_ms: u64,
    #[serde(default = "default_true")]
    pub auto_close_on_success: bool,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            package_manager: default_package_manager(),
            cleanup_delay_ms: default_cleanup_delay_ms(),
            auto_close_on_success: true,
        }
    }
}

impl LauncherSettings {
    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }
}

fn default_package_manager() -> String {
    DEFAULT_PACKAGE_MANAGER.to_string()
}

fn default_cleanup_delay_ms() -> u64 {
    DEFAULT_CLEANUP_DELAY_MS
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default)]
struct ConfigLayers {
    global: Value,
    project: Value,
    env: Value,
    cli: Value,
}

/// Layered JSON settings: global, project, environment, command line.
///
/// Writes only ever touch the project layer. Without a workspace the project
/// layer lives in memory for the lifetime of the process.
#[derive(Clone)]
pub struct ConfigStore {
    project_path: Option<PathBuf>,
    global_path: PathBuf,
    layers: Arc<RwLock<ConfigLayers>>,
}

impl ConfigStore {
    pub async fn new(
        workspace_root: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> anyhow::Result<Self> {
        let project_path = workspace_root.map(|root| root.join(PROJECT_SETTINGS_PATH));
        let global_path = resolve_global_config_path();
        Self::with_paths(project_path, global_path, cli_overrides).await
    }

    pub async fn with_paths(
        project_path: Option<PathBuf>,
        global_path: PathBuf,
        cli_overrides: Option<Value>,
    ) -> anyhow::Result<Self> {
        let global = read_json_file(&global_path).await?;
        let project = match &project_path {
            Some(path) => read_json_file(path).await?,
            None => empty_object(),
        };
        let layers = ConfigLayers {
            global,
            project,
            env: env_layer(),
            cli: cli_overrides.unwrap_or_else(empty_object),
        };
        Ok(Self {
            project_path,
            global_path,
            layers: Arc::new(RwLock::new(layers)),
        })
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }

    pub fn global_path(&self) -> &Path {
        &self.global_path
    }

    pub async fn get(&self) -> LauncherSettings {
        let merged = self.get_effective_value().await;
        serde_json::from_value(merged).unwrap_or_default()
    }

    pub async fn get_effective_value(&self) -> Value {
        let layers = self.layers.read().await.clone();
        let mut merged = empty_object();
        deep_merge(&mut merged, &layers.global);
        deep_merge(&mut merged, &layers.project);
        deep_merge(&mut merged, &layers.env);
        deep_merge(&mut merged, &layers.cli);
        merged
    }

    pub async fn get_project_value(&self) -> Value {
        self.layers.read().await.project.clone()
    }

    pub async fn patch_project(&self, patch: Value) -> anyhow::Result<Value> {
        {
            let mut layers = self.layers.write().await;
            deep_merge(&mut layers.project, &patch);
        }
        self.save_project().await?;
        Ok(self.get_effective_value().await)
    }

    async fn save_project(&self) -> anyhow::Result<()> {
        let Some(path) = &self.project_path else {
            return Ok(());
        };
        let snapshot = self.layers.read().await.project.clone();
        write_json_file(path, &snapshot).await
    }
}

#[async_trait]
impl SettingsStore for ConfigStore {
    async fn get_value(&self, key: &str) -> Option<Value> {
        self.get_effective_value()
            .await
            .get(key)
            .filter(|v| !v.is_null())
            .cloned()
    }

    async fn set_value(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut patch = Map::new();
        patch.insert(key.to_string(), value);
        self.patch_project(Value::Object(patch)).await?;
        Ok(())
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

async fn write_json_file(path: &Path, value: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(path, raw).await?;
    Ok(())
}

/// A missing or unreadable settings file starts out empty.
async fn read_json_file(path: &Path) -> anyhow::Result<Value> {
    if !path.exists() {
        return Ok(empty_object());
    }
    let raw = fs::read_to_string(path).await?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) | Err(_) => {
            tracing::warn!("ignoring malformed settings file {}", path.display());
            Ok(empty_object())
        }
    }
}

fn resolve_global_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("RUNBAR_GLOBAL_CONFIG") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("runbar").join("config.json");
    }
    PathBuf::from(".runbar/global_config.json")
}

fn env_layer() -> Value {
    let mut root = empty_object();

    if let Ok(manager) = std::env::var("RUNBAR_PACKAGE_MANAGER") {
        if !manager.trim().is_empty() {
            deep_merge(&mut root, &json!({ "packageManager": manager.trim() }));
        }
    }
    if let Ok(delay) = std::env::var("RUNBAR_CLEANUP_DELAY_MS") {
        if let Ok(ms) = delay.trim().parse::<u64>() {
            deep_merge(&mut root, &json!({ "cleanupDelayMs": ms }));
        }
    }
    if let Ok(auto_close) = std::env::var("RUNBAR_AUTO_CLOSE") {
        if let Some(v) = parse_bool_like(&auto_close) {
            deep_merge(&mut root, &json!({ "autoCloseOnSuccess": v }));
        }
    }

    root
}

fn parse_bool_like(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Objects merge key by key; arrays and scalars are replaced wholesale.
fn deep_merge(base: &mut Value, overlay: &Value) {
    if overlay.is_null() {
        return;
    }
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store_in(dir: &TempDir, cli: Option<Value>) -> ConfigStore {
        ConfigStore::with_paths(
            Some(dir.path().join(PROJECT_SETTINGS_PATH)),
            dir.path().join("global.json"),
            cli,
        )
        .await
        .expect("store")
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let mut base = json!({"selectedScripts": ["a", "b"], "nested": {"x": 1}});
        deep_merge(
            &mut base,
            &json!({"selectedScripts": [], "nested": {"y": 2}}),
        );
        assert_eq!(
            base,
            json!({"selectedScripts": [], "nested": {"x": 1, "y": 2}})
        );
    }

    #[tokio::test]
    async fn string_lists_round_trip_through_project_file() {
        let dir = TempDir::new().expect("tempdir");
        let store = store_in(&dir, None).await;
        assert_eq!(store.get_string_list("selectedScripts").await, None);

        store
            .set_string_list("selectedScripts", &["build".to_string(), "test".to_string()])
            .await
            .expect("set");

        let reopened = store_in(&dir, None).await;
        assert_eq!(
            reopened.get_string_list("selectedScripts").await,
            Some(vec!["build".to_string(), "test".to_string()])
        );
        let on_disk: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(PROJECT_SETTINGS_PATH)).expect("read"),
        )
        .expect("json");
        assert_eq!(on_disk["selectedScripts"], json!(["build", "test"]));
    }

    #[tokio::test]
    async fn project_layer_overrides_global_and_cli_overrides_both() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(
            dir.path().join("global.json"),
            r#"{"packageManager":"yarn","cleanupDelayMs":10}"#,
        )
        .expect("global");
        let store = store_in(&dir, None).await;
        store
            .set_value("packageManager", json!("pnpm"))
            .await
            .expect("set");
        let settings = store.get().await;
        assert_eq!(settings.package_manager, "pnpm");
        assert_eq!(settings.cleanup_delay_ms, 10);
        assert!(settings.auto_close_on_success);

        let with_cli = store_in(&dir, Some(json!({"packageManager": "bun"}))).await;
        assert_eq!(with_cli.get().await.package_manager, "bun");
    }

    #[tokio::test]
    async fn store_without_workspace_keeps_writes_in_memory() {
        let dir = TempDir::new().expect("tempdir");
        let store = ConfigStore::with_paths(None, dir.path().join("global.json"), None)
            .await
            .expect("store");
        store
            .set_string_list("selectedVSCodeTasks", &["lint".to_string()])
            .await
            .expect("set");
        assert_eq!(
            store.get_string_list("selectedVSCodeTasks").await,
            Some(vec!["lint".to_string()])
        );
        assert!(!dir.path().join("global.json").exists());
    }

    #[tokio::test]
    async fn malformed_project_file_starts_empty() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join(PROJECT_SETTINGS_PATH);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "not json").expect("write");
        let store = store_in(&dir, None).await;
        assert_eq!(store.get_project_value().await, json!({}));
    }
}
