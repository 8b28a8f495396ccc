//! The single user-facing decision tree: build the menu, present it, route
//! the choice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use runbar_types::{
    ChoiceItem, ChoiceOptions, NotifyLevel, RunRecord, TaskDescriptor, TaskHandle,
    TaskSourceKind,
};

use crate::catalog::{selection_confirmation, SelectionCatalog};
use crate::error::LaunchError;
use crate::manifest::EDITOR_TASKS_MANIFEST_PATH;
use crate::normalize::dispatch_command_line;
use crate::surface::PresentationSurface;
use crate::tracker::ExecutionTracker;

pub const MENU_PLACEHOLDER: &str = "Choose an action";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Idle,
    AwaitingChoice,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuAction {
    Run(TaskDescriptor),
    Configure {
        kind: TaskSourceKind,
        available: bool,
    },
    ShowLastResult,
    Separator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuEntry {
    pub item: ChoiceItem,
    pub action: MenuAction,
}

/// What a round of [`Launcher::show_menu`] ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuOutcome {
    Dismissed,
    /// Another menu was already open.
    Busy,
    Dispatched(TaskHandle),
    DispatchFailed,
    Configured(TaskSourceKind),
    ShowedLastResult,
    Ignored,
}

#[derive(Clone)]
pub struct Launcher {
    catalog: SelectionCatalog,
    tracker: ExecutionTracker,
    surface: Arc<dyn PresentationSurface>,
    menu_open: Arc<AtomicBool>,
}

impl Launcher {
    pub fn new(
        catalog: SelectionCatalog,
        tracker: ExecutionTracker,
        surface: Arc<dyn PresentationSurface>,
    ) -> Self {
        Self {
            catalog,
            tracker,
            surface,
            menu_open: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn catalog(&self) -> &SelectionCatalog {
        &self.catalog
    }

    pub fn tracker(&self) -> &ExecutionTracker {
        &self.tracker
    }

    pub fn menu_state(&self) -> MenuState {
        if self.menu_open.load(Ordering::SeqCst) {
            MenuState::AwaitingChoice
        } else {
            MenuState::Idle
        }
    }

    /// Selected tasks of both kinds, then the configure entries, then the
    /// last result when there is one.
    pub async fn build_menu(&self) -> Vec<MenuEntry> {
        let mut entries = Vec::new();
        let mut broken = Vec::new();
        let mut selected_counts = [0usize; 2];

        for (idx, kind) in TaskSourceKind::ALL.into_iter().enumerate() {
            match self.catalog.list_selected(kind).await {
                Ok(selected) => {
                    selected_counts[idx] = selected.len();
                    entries.extend(selected.into_iter().map(runnable_entry));
                }
                Err(err) => {
                    self.surface
                        .notify(&err.to_string(), NotifyLevel::Error)
                        .await;
                    broken.push(kind);
                }
            }
        }
        if !entries.is_empty() {
            entries.push(separator_entry());
        }

        for (idx, kind) in TaskSourceKind::ALL.into_iter().enumerate() {
            let found = self.catalog.manifest_available(kind);
            let available = found && !broken.contains(&kind);
            entries.push(configure_entry(kind, available, found, selected_counts[idx]));
        }

        if let Some(record) = self.tracker.last_run_record().await {
            entries.push(separator_entry());
            entries.push(last_result_entry(&record));
        }
        entries
    }

    pub async fn show_menu(&self) -> MenuOutcome {
        if self
            .menu_open
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return MenuOutcome::Busy;
        }
        let choice = self.await_menu_choice().await;
        self.menu_open.store(false, Ordering::SeqCst);

        match choice {
            Some(action) => self.route(action).await,
            None => MenuOutcome::Dismissed,
        }
    }

    async fn await_menu_choice(&self) -> Option<MenuAction> {
        let entries = self.build_menu().await;
        let items = entries.iter().map(|e| e.item.clone()).collect::<Vec<_>>();
        let options = ChoiceOptions {
            placeholder: MENU_PLACEHOLDER.to_string(),
            multi_select: false,
        };
        let chosen = match self.surface.show_choice(items, options).await {
            Ok(chosen) => chosen?,
            Err(err) => {
                self.surface
                    .notify(&format!("Failed to show menu: {err}"), NotifyLevel::Error)
                    .await;
                return None;
            }
        };
        let index = *chosen.first()?;
        entries.into_iter().nth(index).map(|e| e.action)
    }

    async fn route(&self, action: MenuAction) -> MenuOutcome {
        match action {
            MenuAction::Run(descriptor) => match self.run_task(&descriptor).await {
                Some(handle) => MenuOutcome::Dispatched(handle),
                None => MenuOutcome::DispatchFailed,
            },
            MenuAction::Configure {
                kind,
                available: true,
            } => {
                self.configure(kind).await;
                MenuOutcome::Configured(kind)
            }
            MenuAction::Configure {
                available: false, ..
            }
            | MenuAction::Separator => MenuOutcome::Ignored,
            MenuAction::ShowLastResult => {
                self.show_last_result().await;
                MenuOutcome::ShowedLastResult
            }
        }
    }

    /// Dispatches `descriptor`, reporting any failure to the user.
    pub async fn run_task(&self, descriptor: &TaskDescriptor) -> Option<TaskHandle> {
        match self.tracker.dispatch(descriptor).await {
            Ok(handle) => Some(handle),
            Err(err) => {
                self.surface
                    .notify(&err.to_string(), NotifyLevel::Error)
                    .await;
                None
            }
        }
    }

    /// Resolves `name` against every discoverable task (selected or not),
    /// package scripts first unless `kind` narrows the search.
    pub async fn find_task(
        &self,
        kind: Option<TaskSourceKind>,
        name: &str,
    ) -> Result<Option<TaskDescriptor>, LaunchError> {
        let kinds = match kind {
            Some(kind) => vec![kind],
            None => TaskSourceKind::ALL.to_vec(),
        };
        for kind in kinds {
            if let Some(found) = self.catalog.find(kind, name).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    pub async fn run_by_name(&self, kind: Option<TaskSourceKind>, name: &str) -> Option<TaskHandle> {
        match self.find_task(kind, name).await {
            Ok(Some(descriptor)) => self.run_task(&descriptor).await,
            Ok(None) => {
                self.surface
                    .notify(&format!("Task `{name}` not found"), NotifyLevel::Error)
                    .await;
                None
            }
            Err(err) => {
                self.surface
                    .notify(&err.to_string(), NotifyLevel::Error)
                    .await;
                None
            }
        }
    }

    /// Interactive selection flow for one source kind. Returns whether the
    /// selection set was written.
    pub async fn configure(&self, kind: TaskSourceKind) -> bool {
        let candidates = match self.catalog.require_candidates(kind).await {
            Ok(candidates) => candidates,
            Err(err) => {
                self.surface
                    .notify(&err.to_string(), NotifyLevel::Error)
                    .await;
                return false;
            }
        };
        if candidates.is_empty() {
            self.surface
                .notify(
                    &format!("No {}s found in {}", kind.noun(), kind.manifest_file_name()),
                    NotifyLevel::Info,
                )
                .await;
            return false;
        }

        let current = self.catalog.selection(kind).await;
        let items = candidates
            .iter()
            .map(|c| {
                ChoiceItem::new(c.name.clone())
                    .description(c.command_summary.clone())
                    .picked(current.contains(&c.name))
            })
            .collect::<Vec<_>>();
        let options = ChoiceOptions {
            placeholder: format!("Select {}s to show in the dropdown menu", kind.noun()),
            multi_select: true,
        };
        let chosen = match self.surface.show_choice(items, options).await {
            Ok(Some(chosen)) => chosen,
            Ok(None) => return false,
            Err(err) => {
                self.surface
                    .notify(&format!("Failed to show picker: {err}"), NotifyLevel::Error)
                    .await;
                return false;
            }
        };
        let names = chosen
            .into_iter()
            .filter_map(|i| candidates.get(i).map(|c| c.name.clone()))
            .collect::<Vec<_>>();
        self.update_selection(kind, names).await
    }

    /// Replaces the selection set and confirms the result to the user.
    pub async fn update_selection(&self, kind: TaskSourceKind, names: Vec<String>) -> bool {
        match self.catalog.update_selection(kind, names).await {
            Ok(stored) => {
                self.surface
                    .notify(
                        &selection_confirmation(kind, stored.len()),
                        NotifyLevel::Info,
                    )
                    .await;
                true
            }
            Err(err) => {
                self.surface
                    .notify(&err.to_string(), NotifyLevel::Error)
                    .await;
                false
            }
        }
    }

    pub async fn show_last_result(&self) {
        match self.tracker.last_run_record().await {
            Some(record) => {
                let title = format!("Last result: {}", record.task_name);
                self.surface
                    .show_read_only_text(&record.render_summary(), &title)
                    .await;
            }
            None => {
                self.surface
                    .notify("No task has finished yet", NotifyLevel::Info)
                    .await;
            }
        }
    }
}

fn runnable_entry(descriptor: TaskDescriptor) -> MenuEntry {
    let description = match descriptor.source_kind {
        TaskSourceKind::PackageScript => "Run npm script",
        TaskSourceKind::EditorTask => "Run task",
    };
    let item = ChoiceItem::new(descriptor.name.clone())
        .description(description)
        .detail(dispatch_command_line(&descriptor));
    MenuEntry {
        item,
        action: MenuAction::Run(descriptor),
    }
}

fn separator_entry() -> MenuEntry {
    MenuEntry {
        item: ChoiceItem::separator(),
        action: MenuAction::Separator,
    }
}

fn configure_entry(
    kind: TaskSourceKind,
    available: bool,
    found: bool,
    selected: usize,
) -> MenuEntry {
    let verb = if selected > 0 { "Selected" } else { "Select" };
    let (label, source) = match kind {
        TaskSourceKind::PackageScript => (format!("{verb} package scripts"), "package.json"),
        TaskSourceKind::EditorTask => (format!("{verb} editor tasks"), EDITOR_TASKS_MANIFEST_PATH),
    };
    let description = if available {
        format!("Configure which {}s to show", kind.noun())
    } else if found {
        format!("Unavailable: {source} has errors")
    } else {
        format!("Unavailable: no {source} found")
    };
    let item = ChoiceItem::new(label)
        .description(description)
        .detail(format!("Choose from {source}"));
    MenuEntry {
        item,
        action: MenuAction::Configure { kind, available },
    }
}

fn last_result_entry(record: &RunRecord) -> MenuEntry {
    let status = if record.outcome.is_success() {
        "succeeded"
    } else {
        "failed"
    };
    let item = ChoiceItem::new(format!("Show last result: {} ({status})", record.task_name))
        .description(record.outcome.as_str())
        .detail(format!("Started {}", record.started_at.to_rfc3339()));
    MenuEntry {
        item,
        action: MenuAction::ShowLastResult,
    }
}
