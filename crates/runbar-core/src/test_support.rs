use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use runbar_types::{
    ChoiceItem, ChoiceOptions, NotifyLevel, TaskDescriptor, TaskEnded, TaskHandle,
};
use tempfile::TempDir;
use tokio::sync::oneshot;

use crate::backend::{ExecutionBackend, RunRequest};
use crate::catalog::SelectionCatalog;
use crate::config::{ConfigStore, PROJECT_SETTINGS_PATH};
use crate::normalize::Normalizer;
use crate::surface::PresentationSurface;

pub fn write_file(dir: &TempDir, rel: &str, content: &str) -> PathBuf {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(&path, content).expect("write");
    path
}

pub async fn settings_for(dir: &TempDir) -> Arc<ConfigStore> {
    Arc::new(
        ConfigStore::with_paths(
            Some(dir.path().join(PROJECT_SETTINGS_PATH)),
            dir.path().join("global.json"),
            None,
        )
        .await
        .expect("settings"),
    )
}

pub async fn catalog_for(dir: &TempDir) -> SelectionCatalog {
    SelectionCatalog::new(Some(dir.path().to_path_buf()), settings_for(dir).await)
}

pub fn script_task(name: &str) -> TaskDescriptor {
    Normalizer::default().normalize_script(name, "echo")
}

/// Backend that records requests and only completes when told to. Like a
/// terminal host it replaces a finished terminal when the same name runs
/// again.
#[derive(Default)]
pub struct RecordingBackend {
    requests: Mutex<Vec<RunRequest>>,
    observers: Mutex<HashMap<TaskHandle, oneshot::Sender<TaskEnded>>>,
    displays: Mutex<Vec<(TaskHandle, String)>>,
    finished: Mutex<HashSet<TaskHandle>>,
    closed: Mutex<Vec<String>>,
    fail_next: Mutex<Option<String>>,
}

impl RecordingBackend {
    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }

    pub fn fail_next_run(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    pub fn finish(&self, handle: &TaskHandle, ended: TaskEnded) -> bool {
        self.finished.lock().unwrap().insert(handle.clone());
        let sender = self.observers.lock().unwrap().remove(handle);
        match sender {
            Some(tx) => tx.send(ended).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl ExecutionBackend for RecordingBackend {
    async fn run(&self, request: RunRequest) -> anyhow::Result<TaskHandle> {
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            anyhow::bail!(message);
        }
        let handle = TaskHandle::new();
        let finished = self.finished.lock().unwrap();
        let mut displays = self.displays.lock().unwrap();
        displays.retain(|(h, name)| *name != request.display_name || !finished.contains(h));
        displays.push((handle.clone(), request.display_name.clone()));
        self.requests.lock().unwrap().push(request);
        Ok(handle)
    }

    async fn on_ended(&self, handle: &TaskHandle) -> anyhow::Result<oneshot::Receiver<TaskEnded>> {
        let (tx, rx) = oneshot::channel();
        self.observers.lock().unwrap().insert(handle.clone(), tx);
        Ok(rx)
    }

    async fn list_running_displays(&self) -> Vec<String> {
        self.displays
            .lock()
            .unwrap()
            .iter()
            .map(|(_, name)| name.clone())
            .collect()
    }

    async fn close_by_display(&self, display_name: &str) -> anyhow::Result<bool> {
        let handle = self
            .displays
            .lock()
            .unwrap()
            .iter()
            .find(|(_, name)| name == display_name)
            .map(|(h, _)| h.clone());
        match handle {
            Some(handle) => self.close_execution(&handle).await,
            None => Ok(false),
        }
    }

    async fn close_execution(&self, handle: &TaskHandle) -> anyhow::Result<bool> {
        let mut displays = self.displays.lock().unwrap();
        let Some(pos) = displays.iter().position(|(h, _)| h == handle) else {
            return Ok(false);
        };
        let (_, name) = displays.remove(pos);
        self.closed.lock().unwrap().push(name);
        Ok(true)
    }
}

/// Surface that answers pick lists from a queue and records everything shown.
#[derive(Default)]
pub struct ScriptedSurface {
    answers: Mutex<VecDeque<Option<Vec<usize>>>>,
    shown: Mutex<Vec<(Vec<ChoiceItem>, ChoiceOptions)>>,
    notices: Mutex<Vec<(NotifyLevel, String)>>,
    texts: Mutex<Vec<(String, String)>>,
}

impl ScriptedSurface {
    pub fn answer(&self, choice: Option<Vec<usize>>) {
        self.answers.lock().unwrap().push_back(choice);
    }

    pub fn shown(&self) -> Vec<(Vec<ChoiceItem>, ChoiceOptions)> {
        self.shown.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<(NotifyLevel, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<(String, String)> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PresentationSurface for ScriptedSurface {
    async fn show_choice(
        &self,
        items: Vec<ChoiceItem>,
        options: ChoiceOptions,
    ) -> anyhow::Result<Option<Vec<usize>>> {
        self.shown.lock().unwrap().push((items, options));
        Ok(self.answers.lock().unwrap().pop_front().flatten())
    }

    async fn notify(&self, message: &str, level: NotifyLevel) {
        self.notices
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }

    async fn show_read_only_text(&self, content: &str, title: &str) {
        self.texts
            .lock()
            .unwrap()
            .push((title.to_string(), content.to_string()));
    }
}
