use runbar_types::{RunRecord, TaskHandle, TaskSourceKind};
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub enum RunEvent {
    Started {
        handle: TaskHandle,
        task_name: String,
        source_kind: TaskSourceKind,
    },
    Completed {
        handle: TaskHandle,
        record: RunRecord,
    },
    DispatchFailed {
        task_name: String,
        message: String,
    },
    TerminalClosed {
        display_name: String,
    },
}

#[derive(Clone)]
pub struct RunBus {
    tx: broadcast::Sender<RunEvent>,
}

impl RunBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for RunBus {
    fn default() -> Self {
        Self::new()
    }
}
