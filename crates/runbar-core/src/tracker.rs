use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use runbar_observability::{current_process, emit_event, ObservabilityEvent};
use runbar_types::{RunOutcome, RunRecord, TaskDescriptor, TaskEnded, TaskHandle};
use tokio::sync::{broadcast, oneshot, RwLock};

use crate::backend::{ExecutionBackend, RunRequest};
use crate::config::{LauncherSettings, DEFAULT_CLEANUP_DELAY_MS};
use crate::error::{LaunchError, Result};
use crate::event_bus::{RunBus, RunEvent};

/// Single-slot holder for the most recent [`RunRecord`].
#[derive(Clone, Default)]
pub struct RunSlot {
    inner: Arc<RwLock<Option<RunRecord>>>,
}

impl RunSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<RunRecord> {
        self.inner.read().await.clone()
    }

    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    pub async fn store(&self, record: RunRecord) {
        *self.inner.write().await = Some(record);
    }
}

#[derive(Debug, Clone)]
pub struct TrackerOptions {
    pub cleanup_delay: Duration,
    pub auto_close_on_success: bool,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            cleanup_delay: Duration::from_millis(DEFAULT_CLEANUP_DELAY_MS),
            auto_close_on_success: true,
        }
    }
}

impl From<&LauncherSettings> for TrackerOptions {
    fn from(settings: &LauncherSettings) -> Self {
        Self {
            cleanup_delay: settings.cleanup_delay(),
            auto_close_on_success: settings.auto_close_on_success,
        }
    }
}

/// Dispatches tasks to the backend and records how the latest one ended.
///
/// Concurrent dispatches are allowed. Each dispatch empties the slot right
/// away; whichever execution completes last owns it afterwards.
#[derive(Clone)]
pub struct ExecutionTracker {
    backend: Arc<dyn ExecutionBackend>,
    slot: RunSlot,
    bus: RunBus,
    root: Option<PathBuf>,
    options: TrackerOptions,
    in_flight: Arc<AtomicUsize>,
}

impl ExecutionTracker {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        slot: RunSlot,
        root: Option<PathBuf>,
        options: TrackerOptions,
    ) -> Self {
        Self {
            backend,
            slot,
            bus: RunBus::new(),
            root,
            options,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.bus.subscribe()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn last_run_record(&self) -> Option<RunRecord> {
        self.slot.get().await
    }

    pub async fn dispatch(&self, descriptor: &TaskDescriptor) -> Result<TaskHandle> {
        let Some(root) = self.root.clone() else {
            self.emit_failed(descriptor, "NO_WORKSPACE", "no workspace folder");
            return Err(LaunchError::NoWorkspace);
        };
        self.slot.clear().await;

        let started_at = Utc::now();
        let request = RunRequest {
            display_name: descriptor.display_name(),
            dispatch: descriptor.dispatch.clone(),
            cwd: root,
        };
        let started = match self.backend.run(request).await {
            Ok(handle) => match self.backend.on_ended(&handle).await {
                Ok(ended) => Ok((handle, ended)),
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };
        let (handle, ended) = match started {
            Ok(started) => started,
            Err(err) => {
                let message = err.to_string();
                self.record_backend_failure(descriptor, started_at, &message)
                    .await;
                return Err(LaunchError::Backend {
                    task: descriptor.name.clone(),
                    message,
                });
            }
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        emit_event(
            tracing::Level::INFO,
            current_process(),
            ObservabilityEvent {
                event: "task.dispatch.started",
                component: "core.tracker",
                task_name: Some(&descriptor.name),
                source_kind: Some(descriptor.source_kind.as_str()),
                handle: Some(handle.as_str()),
                status: Some("running"),
                ..ObservabilityEvent::default()
            },
        );
        self.bus.publish(RunEvent::Started {
            handle: handle.clone(),
            task_name: descriptor.name.clone(),
            source_kind: descriptor.source_kind,
        });

        let tracker = self.clone();
        let descriptor = descriptor.clone();
        let watched = handle.clone();
        tokio::spawn(async move {
            tracker
                .watch_completion(watched, descriptor, started_at, ended)
                .await;
        });
        Ok(handle)
    }

    async fn watch_completion(
        self,
        handle: TaskHandle,
        descriptor: TaskDescriptor,
        started_at: DateTime<Utc>,
        ended: oneshot::Receiver<TaskEnded>,
    ) {
        // a dropped observer means the backend lost the execution
        let report = ended.await.unwrap_or_default();
        let record = build_record(&descriptor, started_at, report);
        self.slot.store(record.clone()).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let exit_code = record.exit_code.map(|c| c.to_string());
        emit_event(
            if record.outcome.is_success() {
                tracing::Level::INFO
            } else {
                tracing::Level::WARN
            },
            current_process(),
            ObservabilityEvent {
                event: "task.run.completed",
                component: "core.tracker",
                task_name: Some(&record.task_name),
                source_kind: Some(record.source_kind.as_str()),
                handle: Some(handle.as_str()),
                status: Some(record.outcome.as_str()),
                detail: exit_code.as_deref(),
                ..ObservabilityEvent::default()
            },
        );
        let success = record.outcome.is_success();
        self.bus.publish(RunEvent::Completed {
            handle: handle.clone(),
            record,
        });

        if success && self.options.auto_close_on_success {
            tokio::time::sleep(self.options.cleanup_delay).await;
            self.close_terminal(&handle, &descriptor.display_name()).await;
        }
    }

    /// A re-run of the same task may own a terminal with this name by now;
    /// only the terminal of `handle` is closed.
    async fn close_terminal(&self, handle: &TaskHandle, display_name: &str) {
        let running = self.backend.list_running_displays().await;
        if !running.iter().any(|name| name == display_name) {
            return;
        }
        match self.backend.close_execution(handle).await {
            Ok(true) => {
                emit_event(
                    tracing::Level::INFO,
                    current_process(),
                    ObservabilityEvent {
                        event: "task.terminal.closed",
                        component: "core.tracker",
                        handle: Some(handle.as_str()),
                        detail: Some(display_name),
                        status: Some("ok"),
                        ..ObservabilityEvent::default()
                    },
                );
                self.bus.publish(RunEvent::TerminalClosed {
                    display_name: display_name.to_string(),
                });
            }
            Ok(false) => {}
            Err(err) => tracing::debug!("closing terminal `{}` failed: {}", display_name, err),
        }
    }

    async fn record_backend_failure(
        &self,
        descriptor: &TaskDescriptor,
        started_at: DateTime<Utc>,
        message: &str,
    ) {
        self.emit_failed(descriptor, "BACKEND_ERROR", message);
        self.slot
            .store(RunRecord {
                task_name: descriptor.name.clone(),
                source_kind: descriptor.source_kind,
                started_at,
                finished_at: Utc::now(),
                outcome: RunOutcome::Failure,
                exit_code: None,
                output: format!("Error: {message}"),
            })
            .await;
        self.bus.publish(RunEvent::DispatchFailed {
            task_name: descriptor.name.clone(),
            message: message.to_string(),
        });
    }

    fn emit_failed(&self, descriptor: &TaskDescriptor, code: &str, detail: &str) {
        emit_event(
            tracing::Level::ERROR,
            current_process(),
            ObservabilityEvent {
                event: "task.dispatch.failed",
                component: "core.tracker",
                task_name: Some(&descriptor.name),
                source_kind: Some(descriptor.source_kind.as_str()),
                status: Some("failed"),
                error_code: Some(code),
                detail: Some(detail),
                ..ObservabilityEvent::default()
            },
        );
    }
}

/// A real exit code decides when the backend has one. Otherwise an
/// execution the backend reported on counts as a success.
pub fn approximate_outcome(report: &TaskEnded) -> RunOutcome {
    match report.exit_code {
        Some(0) => RunOutcome::Success,
        Some(_) => RunOutcome::Failure,
        None if report.execution_reported => RunOutcome::Success,
        None => RunOutcome::Failure,
    }
}

fn build_record(
    descriptor: &TaskDescriptor,
    started_at: DateTime<Utc>,
    report: TaskEnded,
) -> RunRecord {
    let outcome = approximate_outcome(&report);
    let output = match report.output {
        Some(output) if !output.trim().is_empty() => output,
        _ => placeholder_output(outcome),
    };
    RunRecord {
        task_name: descriptor.name.clone(),
        source_kind: descriptor.source_kind,
        started_at,
        finished_at: Utc::now(),
        outcome,
        exit_code: report.exit_code,
        output,
    }
}

fn placeholder_output(outcome: RunOutcome) -> String {
    match outcome {
        RunOutcome::Success => "Task completed. Output is available in its terminal.".to_string(),
        RunOutcome::Failure => {
            "Task failed. Check its terminal for the full output.".to_string()
        }
    }
}
