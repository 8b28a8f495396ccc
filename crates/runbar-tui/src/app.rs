use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use runbar_core::{ExecutionBackend, Launcher, MenuOutcome, MenuState, RunEvent};
use runbar_runtime::{ProcessBackend, SessionSnapshot};
use runbar_types::{ChoiceItem, ChoiceOptions, NotifyLevel, RunRecord};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::surface::UiRequest;

const TOAST_TTL: Duration = Duration::from_secs(4);
const MAX_TOASTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    OpenMenu,
    ShowLastResult,
    NextSession,
    PreviousSession,
    ViewSession,
    CloseSession,
    PickerUp,
    PickerDown,
    PickerToggle,
    PickerConfirm,
    PickerCancel,
    ScrollUp,
    ScrollDown,
    CloseViewer,
}

/// An open pick list. The launcher task is parked on `reply` until the user
/// confirms or dismisses.
pub struct PickerState {
    pub items: Vec<ChoiceItem>,
    pub options: ChoiceOptions,
    pub cursor: usize,
    pub checked: Vec<bool>,
    reply: Option<oneshot::Sender<Option<Vec<usize>>>>,
}

impl PickerState {
    pub fn new(
        items: Vec<ChoiceItem>,
        options: ChoiceOptions,
        reply: oneshot::Sender<Option<Vec<usize>>>,
    ) -> Self {
        let checked = items.iter().map(|i| i.picked).collect();
        let cursor = items.iter().position(|i| !i.is_separator()).unwrap_or(0);
        Self {
            items,
            options,
            cursor,
            checked,
            reply: Some(reply),
        }
    }

    fn selectable(&self, idx: usize) -> bool {
        self.items.get(idx).is_some_and(|i| !i.is_separator())
    }

    pub fn move_down(&mut self) {
        if let Some(next) = (self.cursor + 1..self.items.len()).find(|i| self.selectable(*i)) {
            self.cursor = next;
        }
    }

    pub fn move_up(&mut self) {
        if let Some(prev) = (0..self.cursor).rev().find(|i| self.selectable(*i)) {
            self.cursor = prev;
        }
    }

    pub fn toggle(&mut self) {
        if self.options.multi_select && self.selectable(self.cursor) {
            self.checked[self.cursor] = !self.checked[self.cursor];
        }
    }

    pub fn selection(&self) -> Option<Vec<usize>> {
        if self.options.multi_select {
            Some(
                self.checked
                    .iter()
                    .enumerate()
                    .filter(|(idx, on)| **on && self.selectable(*idx))
                    .map(|(idx, _)| idx)
                    .collect(),
            )
        } else if self.selectable(self.cursor) {
            Some(vec![self.cursor])
        } else {
            None
        }
    }

    fn finish(&mut self, answer: Option<Vec<usize>>) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(answer);
        }
    }
}

impl Drop for PickerState {
    fn drop(&mut self) {
        self.finish(None);
    }
}

pub struct ViewerState {
    pub title: String,
    pub content: String,
    pub scroll: u16,
}

impl ViewerState {
    fn max_scroll(&self) -> u16 {
        let lines = self.content.lines().count().saturating_sub(1);
        u16::try_from(lines).unwrap_or(u16::MAX)
    }
}

pub enum AppState {
    Launcher,
    Picker(PickerState),
    Viewer(ViewerState),
}

pub struct Toast {
    pub message: String,
    pub level: NotifyLevel,
    pub shown_at: Instant,
}

pub struct App {
    pub state: AppState,
    pub should_quit: bool,
    pub tick_count: usize,
    pub root_label: String,
    pub sessions: Vec<SessionSnapshot>,
    pub selected_session_index: usize,
    pub toasts: Vec<Toast>,
    pub last_record: Option<RunRecord>,
    launcher: Launcher,
    backend: Arc<ProcessBackend>,
    requests: mpsc::UnboundedReceiver<UiRequest>,
    events: broadcast::Receiver<RunEvent>,
    pending: VecDeque<UiRequest>,
}

impl App {
    pub fn new(
        launcher: Launcher,
        backend: Arc<ProcessBackend>,
        requests: mpsc::UnboundedReceiver<UiRequest>,
        root_label: String,
    ) -> Self {
        let events = launcher.tracker().subscribe();
        Self {
            state: AppState::Launcher,
            should_quit: false,
            tick_count: 0,
            root_label,
            sessions: Vec::new(),
            selected_session_index: 0,
            toasts: Vec::new(),
            last_record: None,
            launcher,
            backend,
            requests,
            events,
            pending: VecDeque::new(),
        }
    }

    pub fn handle_key_event(&self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }
        key_to_action(&self.state, key)
    }

    pub async fn update(&mut self, action: Action) -> anyhow::Result<()> {
        match action {
            Action::Quit => {
                self.state = AppState::Launcher;
                self.should_quit = true;
            }
            Action::OpenMenu if self.launcher.menu_state() == MenuState::AwaitingChoice => {
                tracing::debug!("menu already open");
            }
            Action::OpenMenu => {
                let launcher = self.launcher.clone();
                tokio::spawn(async move {
                    let outcome = launcher.show_menu().await;
                    if outcome == MenuOutcome::Busy {
                        tracing::debug!("menu already open");
                    }
                });
            }
            Action::ShowLastResult => {
                let launcher = self.launcher.clone();
                tokio::spawn(async move { launcher.show_last_result().await });
            }
            Action::NextSession => {
                if self.selected_session_index + 1 < self.sessions.len() {
                    self.selected_session_index += 1;
                }
            }
            Action::PreviousSession => {
                self.selected_session_index = self.selected_session_index.saturating_sub(1);
            }
            Action::ViewSession => {
                if let Some(session) = self.sessions.get(self.selected_session_index) {
                    let content = if session.output.is_empty() {
                        "(no output yet)".to_string()
                    } else {
                        session.output.clone()
                    };
                    self.state = AppState::Viewer(ViewerState {
                        title: format!("{} | {}", session.display_name, session.command_line),
                        content,
                        scroll: 0,
                    });
                }
            }
            Action::CloseSession => {
                if let Some(session) = self.sessions.get(self.selected_session_index) {
                    let name = session.display_name.clone();
                    if self.backend.close_by_display(&name).await? {
                        self.push_toast(format!("Closed {name}"), NotifyLevel::Info);
                    }
                    self.refresh_sessions().await;
                }
            }
            Action::PickerUp | Action::PickerDown | Action::PickerToggle => {
                if let AppState::Picker(picker) = &mut self.state {
                    match action {
                        Action::PickerUp => picker.move_up(),
                        Action::PickerDown => picker.move_down(),
                        _ => picker.toggle(),
                    }
                }
            }
            Action::PickerConfirm | Action::PickerCancel => {
                let previous = std::mem::replace(&mut self.state, AppState::Launcher);
                if let AppState::Picker(mut picker) = previous {
                    let answer = match action {
                        Action::PickerConfirm => picker.selection(),
                        _ => None,
                    };
                    picker.finish(answer);
                }
                self.pump_pending();
            }
            Action::ScrollUp => {
                if let AppState::Viewer(viewer) = &mut self.state {
                    viewer.scroll = viewer.scroll.saturating_sub(1);
                }
            }
            Action::ScrollDown => {
                if let AppState::Viewer(viewer) = &mut self.state {
                    viewer.scroll = viewer.scroll.saturating_add(1).min(viewer.max_scroll());
                }
            }
            Action::CloseViewer => {
                self.state = AppState::Launcher;
                self.pump_pending();
            }
        }
        Ok(())
    }

    /// Dispatches whose completion has not been reported yet.
    pub fn running_count(&self) -> usize {
        self.launcher.tracker().in_flight()
    }

    /// Pulls whatever the launcher asked to show since the last frame.
    pub fn drain_requests(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            self.handle_request(request);
        }
    }

    pub async fn tick(&mut self) {
        self.tick_count += 1;
        self.drain_run_events();
        self.refresh_sessions().await;
        self.toasts.retain(|t| t.shown_at.elapsed() < TOAST_TTL);
    }

    pub async fn shutdown(&mut self) {
        self.state = AppState::Launcher;
        self.pending.clear();
        self.backend.shutdown().await;
    }

    fn handle_request(&mut self, request: UiRequest) {
        if let UiRequest::Notify { message, level } = request {
            self.push_toast(message, level);
            return;
        }
        if matches!(self.state, AppState::Launcher) {
            self.open(request);
        } else {
            self.pending.push_back(request);
        }
    }

    fn pump_pending(&mut self) {
        while matches!(self.state, AppState::Launcher) {
            let Some(request) = self.pending.pop_front() else {
                break;
            };
            self.open(request);
        }
    }

    fn open(&mut self, request: UiRequest) {
        match request {
            UiRequest::Choice {
                items,
                options,
                reply,
            } => self.state = AppState::Picker(PickerState::new(items, options, reply)),
            UiRequest::Text { title, content } => {
                self.state = AppState::Viewer(ViewerState {
                    title,
                    content,
                    scroll: 0,
                })
            }
            UiRequest::Notify { message, level } => self.push_toast(message, level),
        }
    }

    fn push_toast(&mut self, message: String, level: NotifyLevel) {
        self.toasts.push(Toast {
            message,
            level,
            shown_at: Instant::now(),
        });
        if self.toasts.len() > MAX_TOASTS {
            let excess = self.toasts.len() - MAX_TOASTS;
            self.toasts.drain(..excess);
        }
    }

    fn drain_run_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(RunEvent::Started { task_name, .. }) => {
                    self.last_record = None;
                    self.push_toast(format!("Running {task_name}"), NotifyLevel::Info);
                }
                Ok(RunEvent::Completed { record, .. }) => {
                    let (message, level) = completion_toast(&record);
                    self.push_toast(message, level);
                    self.last_record = Some(record);
                }
                Ok(RunEvent::DispatchFailed { .. } | RunEvent::TerminalClosed { .. }) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!("ui lagged behind {} run events", skipped);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    async fn refresh_sessions(&mut self) {
        self.sessions = self.backend.sessions().await;
        if self.selected_session_index >= self.sessions.len() {
            self.selected_session_index = self.sessions.len().saturating_sub(1);
        }
    }
}

fn completion_toast(record: &RunRecord) -> (String, NotifyLevel) {
    if record.outcome.is_success() {
        (format!("{} succeeded", record.task_name), NotifyLevel::Info)
    } else {
        let message = match record.exit_code {
            Some(code) => format!("{} failed (exit {code})", record.task_name),
            None => format!("{} failed", record.task_name),
        };
        (message, NotifyLevel::Error)
    }
}

pub fn key_to_action(state: &AppState, key: KeyEvent) -> Option<Action> {
    match state {
        AppState::Launcher => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
            KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('m') => Some(Action::OpenMenu),
            KeyCode::Char('l') => Some(Action::ShowLastResult),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::NextSession),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::PreviousSession),
            KeyCode::Char('o') => Some(Action::ViewSession),
            KeyCode::Char('x') => Some(Action::CloseSession),
            _ => None,
        },
        AppState::Picker(_) => match key.code {
            KeyCode::Esc => Some(Action::PickerCancel),
            KeyCode::Enter => Some(Action::PickerConfirm),
            KeyCode::Char(' ') => Some(Action::PickerToggle),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::PickerDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::PickerUp),
            _ => None,
        },
        AppState::Viewer(_) => match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter => Some(Action::CloseViewer),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::ScrollDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::ScrollUp),
            _ => None,
        },
    }
}
