use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use runbar_core::{ExecutionBackend, RunRequest};
use runbar_types::{
    DispatchSpec, HostRuntimeContext, RawTaskDescriptor, ShellFamily, TaskEnded, TaskHandle,
};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::{oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const OUTPUT_SOFT_LIMIT: usize = 200_000;
const OUTPUT_KEEP: usize = 100_000;
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs dispatches as child processes of the host shell. Each execution is a
/// named session that stays listed after it ends until it is closed.
#[derive(Clone)]
pub struct ProcessBackend {
    sessions: Arc<RwLock<HashMap<TaskHandle, ProcessSession>>>,
    host: HostRuntimeContext,
}

#[derive(Clone)]
struct ProcessSession {
    handle: TaskHandle,
    display_name: String,
    command_line: String,
    started_at: DateTime<Utc>,
    output: Arc<RwLock<String>>,
    ended: watch::Receiver<Option<TaskEnded>>,
    cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub handle: TaskHandle,
    pub display_name: String,
    pub command_line: String,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub exit_code: Option<i32>,
    pub output: String,
}

impl ProcessBackend {
    pub fn new() -> Self {
        Self::with_host(HostRuntimeContext::detect())
    }

    pub fn with_host(host: HostRuntimeContext) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            host,
        }
    }

    /// Sessions in start order.
    pub async fn sessions(&self) -> Vec<SessionSnapshot> {
        let sessions = self
            .sessions
            .read()
            .await
            .values()
            .cloned()
            .collect::<Vec<_>>();
        let mut out = Vec::with_capacity(sessions.len());
        for session in sessions {
            out.push(session.snapshot().await);
        }
        out.sort_by_key(|s| s.started_at);
        out
    }

    pub async fn snapshot(&self, handle: &TaskHandle) -> Option<SessionSnapshot> {
        let session = self.sessions.read().await.get(handle).cloned()?;
        Some(session.snapshot().await)
    }

    /// Output after byte `offset`, the new offset and whether the execution
    /// is still running.
    pub async fn read_since(&self, handle: &TaskHandle, offset: usize) -> Option<(String, usize, bool)> {
        let snapshot = self.snapshot(handle).await?;
        let bytes = snapshot.output.as_bytes();
        let safe_offset = offset.min(bytes.len());
        let tail = String::from_utf8_lossy(&bytes[safe_offset..]).to_string();
        Some((tail, bytes.len(), snapshot.status == SessionStatus::Running))
    }

    /// Cancels every running child and forgets all sessions.
    pub async fn shutdown(&self) {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values() {
            session.cancel.cancel();
        }
        sessions.clear();
    }

    /// A finished session with the same display name is replaced, the way a
    /// reused terminal would be.
    async fn drop_finished_with_display(&self, display_name: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.display_name != display_name || s.ended.borrow().is_none());
    }
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSession {
    async fn snapshot(&self) -> SessionSnapshot {
        let ended = self.ended.borrow().clone();
        let (status, exit_code) = match ended {
            None => (SessionStatus::Running, None),
            Some(ended) if ended.exit_code == Some(0) => (SessionStatus::Succeeded, Some(0)),
            Some(ended) => (SessionStatus::Failed, ended.exit_code),
        };
        SessionSnapshot {
            handle: self.handle.clone(),
            display_name: self.display_name.clone(),
            command_line: self.command_line.clone(),
            started_at: self.started_at,
            status,
            exit_code,
            output: self.output.read().await.clone(),
        }
    }
}

#[async_trait]
impl ExecutionBackend for ProcessBackend {
    async fn run(&self, request: RunRequest) -> anyhow::Result<TaskHandle> {
        let command_line = command_line(&request.dispatch, self.host.shell_family)?;
        let (program, args) = self.host.shell_invocation(&command_line);
        let mut child = Command::new(program)
            .args(args)
            .current_dir(&request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("stdout unavailable"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("stderr unavailable"))?;

        self.drop_finished_with_display(&request.display_name).await;

        let handle = TaskHandle::new();
        let output = Arc::new(RwLock::new(String::new()));
        let readers = [
            tokio::spawn(read_stream(output.clone(), stdout)),
            tokio::spawn(read_stream(output.clone(), stderr)),
        ];
        let (ended_tx, ended_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let waiter_cancel = cancel.clone();
        let waiter_output = output.clone();
        let display_name = request.display_name.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status.ok(),
                _ = waiter_cancel.cancelled() => {
                    let _ = child.kill().await;
                    None
                }
            };
            drain_readers(readers, status.is_some()).await;
            let exit_code = status.and_then(|s| s.code());
            tracing::debug!("`{}` exited with {:?}", display_name, exit_code);
            let ended = TaskEnded {
                execution_reported: status.is_some(),
                exit_code,
                output: Some(waiter_output.read().await.clone()),
            };
            let _ = ended_tx.send(Some(ended));
        });

        self.sessions.write().await.insert(
            handle.clone(),
            ProcessSession {
                handle: handle.clone(),
                display_name: request.display_name,
                command_line,
                started_at: Utc::now(),
                output,
                ended: ended_rx,
                cancel,
            },
        );
        Ok(handle)
    }

    async fn on_ended(&self, handle: &TaskHandle) -> anyhow::Result<oneshot::Receiver<TaskEnded>> {
        let mut ended = self
            .sessions
            .read()
            .await
            .get(handle)
            .map(|s| s.ended.clone())
            .ok_or_else(|| anyhow::anyhow!("unknown execution {handle}"))?;
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let report = match ended.wait_for(Option::is_some).await {
                Ok(value) => value.clone(),
                Err(_) => None,
            };
            if let Some(report) = report {
                let _ = tx.send(report);
            }
        });
        Ok(rx)
    }

    async fn list_running_displays(&self) -> Vec<String> {
        let mut sessions = self
            .sessions
            .read()
            .await
            .values()
            .map(|s| (s.started_at, s.display_name.clone()))
            .collect::<Vec<_>>();
        sessions.sort();
        sessions.into_iter().map(|(_, name)| name).collect()
    }

    async fn close_by_display(&self, display_name: &str) -> anyhow::Result<bool> {
        let handle = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.display_name == display_name)
            .min_by_key(|s| s.started_at)
            .map(|s| s.handle.clone());
        match handle {
            Some(handle) => self.close_execution(&handle).await,
            None => Ok(false),
        }
    }

    async fn close_execution(&self, handle: &TaskHandle) -> anyhow::Result<bool> {
        let Some(session) = self.sessions.write().await.remove(handle) else {
            return Ok(false);
        };
        session.cancel.cancel();
        Ok(true)
    }
}

/// Shell line for a dispatch. The program is passed through verbatim so
/// editor tasks can use shell syntax; arguments are quoted for `shell`.
pub fn command_line(dispatch: &DispatchSpec, shell: ShellFamily) -> anyhow::Result<String> {
    match dispatch {
        DispatchSpec::ShellCommand { program, args } if args.is_empty() => Ok(program.clone()),
        DispatchSpec::ShellCommand { program, args } => {
            Ok(format!("{} {}", program, join_args(shell, args)))
        }
        DispatchSpec::RawDescriptor { descriptor } => raw_command_line(descriptor, shell),
    }
}

fn join_args<I, S>(shell: ShellFamily, args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    match shell {
        ShellFamily::Posix => shell_words::join(args),
        ShellFamily::Cmd => args
            .into_iter()
            .map(|arg| cmd_quote(arg.as_ref()))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// `cmd` has no single quotes. Metacharacters are literal inside double
/// quotes and an embedded quote is doubled.
fn cmd_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && !arg.chars().any(|c| {
            c.is_whitespace() || matches!(c, '"' | '&' | '|' | '<' | '>' | '^' | '(' | ')')
        });
    if plain {
        arg.to_string()
    } else {
        format!("\"{}\"", arg.replace('"', "\"\""))
    }
}

fn raw_command_line(raw: &RawTaskDescriptor, shell: ShellFamily) -> anyhow::Result<String> {
    match raw.kind() {
        "typescript" => {
            let tsconfig = raw
                .extra
                .get("tsconfig")
                .and_then(|v| v.as_str())
                .unwrap_or("tsconfig.json");
            let mut parts = vec!["tsc", "-p", tsconfig];
            if raw.extra.get("option").and_then(|v| v.as_str()) == Some("watch") {
                parts.push("--watch");
            }
            Ok(join_args(shell, parts))
        }
        other => anyhow::bail!("tasks of type `{other}` cannot run outside the editor"),
    }
}

async fn drain_readers(readers: [JoinHandle<()>; 2], exited: bool) {
    for reader in readers {
        if !exited {
            reader.abort();
            continue;
        }
        // grandchildren can keep the pipes open past the shell's exit
        let abort = reader.abort_handle();
        if tokio::time::timeout(READER_DRAIN_TIMEOUT, reader).await.is_err() {
            abort.abort();
        }
    }
}

async fn read_stream(
    output: Arc<RwLock<String>>,
    mut stream: impl tokio::io::AsyncRead + Unpin + Send + 'static,
) {
    let mut buf = vec![0_u8; 4096];
    loop {
        let read = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        let chunk = String::from_utf8_lossy(&buf[..read]).to_string();
        let mut out = output.write().await;
        out.push_str(&chunk);
        if out.len() > OUTPUT_SOFT_LIMIT {
            let mut cut = out.len().saturating_sub(OUTPUT_KEEP);
            while !out.is_char_boundary(cut) {
                cut += 1;
            }
            let tail = out.split_off(cut);
            *out = tail;
        }
    }
}
