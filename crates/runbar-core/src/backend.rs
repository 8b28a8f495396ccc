use std::path::PathBuf;

use async_trait::async_trait;
use runbar_types::{DispatchSpec, TaskEnded, TaskHandle};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub display_name: String,
    pub dispatch: DispatchSpec,
    pub cwd: PathBuf,
}

/// The facility that actually spawns and supervises commands.
///
/// Executions live in named "terminals" that stay listed until closed, so a
/// failed run can be inspected after it ends.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn run(&self, request: RunRequest) -> anyhow::Result<TaskHandle>;

    /// One-shot observer for the end of `handle`. Registering after the
    /// execution already ended still yields its result.
    async fn on_ended(&self, handle: &TaskHandle) -> anyhow::Result<oneshot::Receiver<TaskEnded>>;

    async fn list_running_displays(&self) -> Vec<String>;

    /// Returns whether a terminal with that display name existed.
    async fn close_by_display(&self, display_name: &str) -> anyhow::Result<bool>;

    /// Closes the terminal of one execution. Returns false once that
    /// terminal is gone, even when another one now carries the same name.
    async fn close_execution(&self, handle: &TaskHandle) -> anyhow::Result<bool>;
}
