use std::path::{Path, PathBuf};
use std::sync::Arc;

use runbar_core::{
    resolve_workspace_root, ConfigStore, ExecutionTracker, Launcher, PresentationSurface,
    RunSlot, SelectionCatalog, TrackerOptions,
};
use runbar_runtime::ProcessBackend;
use serde_json::Value;

/// Everything a launcher front end needs, wired once per process.
pub struct LauncherContext {
    pub root: Option<PathBuf>,
    pub settings: Arc<ConfigStore>,
    pub backend: Arc<ProcessBackend>,
    pub catalog: SelectionCatalog,
    pub tracker: ExecutionTracker,
}

impl LauncherContext {
    pub async fn load(root_flag: Option<&Path>, overrides: Option<Value>) -> anyhow::Result<Self> {
        let root = resolve_workspace_root(root_flag);
        if root.is_none() {
            tracing::warn!("no workspace resolved; selections will not be persisted");
        }
        let settings = Arc::new(ConfigStore::new(root.as_deref(), overrides).await?);
        let effective = settings.get().await;
        let backend = Arc::new(ProcessBackend::new());
        let catalog = SelectionCatalog::new(root.clone(), settings.clone());
        let tracker = ExecutionTracker::new(
            backend.clone(),
            RunSlot::new(),
            root.clone(),
            TrackerOptions::from(&effective),
        );
        Ok(Self {
            root,
            settings,
            backend,
            catalog,
            tracker,
        })
    }

    pub fn launcher(&self, surface: Arc<dyn PresentationSurface>) -> Launcher {
        Launcher::new(self.catalog.clone(), self.tracker.clone(), surface)
    }

    pub fn root_label(&self) -> String {
        self.root
            .as_ref()
            .map(|r| r.display().to_string())
            .unwrap_or_else(|| "no workspace".to_string())
    }
}
