use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use runbar_core::{dispatch_command_line, manifest_path, RunEvent, SelectionCatalog};
use runbar_runtime::ProcessBackend;
use runbar_types::{RunRecord, TaskDescriptor, TaskHandle, TaskSourceKind};
use tokio::sync::broadcast::error::RecvError;

use crate::console::ConsoleSurface;
use crate::context::LauncherContext;

const OUTPUT_POLL: Duration = Duration::from_millis(100);

pub async fn list(ctx: &LauncherContext, kind: Option<TaskSourceKind>) -> anyhow::Result<ExitCode> {
    let kinds = kind.map(|k| vec![k]).unwrap_or_else(|| TaskSourceKind::ALL.to_vec());
    let mut failed = false;
    for kind in kinds {
        println!("{}", source_heading(&ctx.catalog, kind));
        match ctx.catalog.list_candidates(kind).await {
            Ok(candidates) => {
                let selected = ctx.catalog.selection(kind).await;
                for line in format_candidates(&candidates, &selected) {
                    println!("{line}");
                }
            }
            Err(err) => {
                eprintln!("error: {err}");
                failed = true;
            }
        }
    }
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

pub async fn select(
    ctx: &LauncherContext,
    kind: TaskSourceKind,
    names: Vec<String>,
    clear: bool,
) -> anyhow::Result<ExitCode> {
    let launcher = ctx.launcher(Arc::new(ConsoleSurface));
    if clear {
        return Ok(exit_for(launcher.update_selection(kind, Vec::new()).await));
    }
    if names.is_empty() {
        launcher.configure(kind).await;
        return Ok(ExitCode::SUCCESS);
    }
    match ctx.catalog.require_candidates(kind).await {
        Ok(candidates) => {
            for name in &names {
                if !candidates.iter().any(|c| &c.name == name) {
                    eprintln!(
                        "warning: `{name}` is not a {} in {}",
                        kind.noun(),
                        kind.manifest_file_name()
                    );
                }
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(exit_for(launcher.update_selection(kind, names).await))
}

/// Dispatches `name`, streams its output and exits with its status.
pub async fn run(
    ctx: &LauncherContext,
    kind: Option<TaskSourceKind>,
    name: &str,
) -> anyhow::Result<ExitCode> {
    let launcher = ctx.launcher(Arc::new(ConsoleSurface));
    let mut events = ctx.tracker.subscribe();
    let Some(handle) = launcher.run_by_name(kind, name).await else {
        return Ok(ExitCode::FAILURE);
    };

    let mut offset = 0;
    let mut poll = tokio::time::interval(OUTPUT_POLL);
    let record = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(RunEvent::Completed { handle: done, record }) if done == handle => break Some(record),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break None,
            },
            _ = poll.tick() => {
                offset = print_output_since(&ctx.backend, &handle, offset).await;
            }
        }
    };
    print_output_since(&ctx.backend, &handle, offset).await;
    ctx.backend.shutdown().await;

    Ok(match record {
        Some(record) => {
            let status = if record.outcome.is_success() {
                "succeeded"
            } else {
                "failed"
            };
            eprintln!("{} {status}", record.task_name);
            exit_code_for(&record)
        }
        None => ExitCode::FAILURE,
    })
}

pub async fn status(ctx: &LauncherContext) -> anyhow::Result<ExitCode> {
    let settings = ctx.settings.get().await;
    println!("workspace: {}", ctx.root_label());
    match ctx.settings.project_path() {
        Some(path) => println!("project settings: {}", path.display()),
        None => println!("project settings: (not persisted)"),
    }
    println!("global settings: {}", ctx.settings.global_path().display());
    println!("package manager: {}", settings.package_manager);
    println!("cleanup delay: {} ms", settings.cleanup_delay_ms);
    println!("auto close on success: {}", settings.auto_close_on_success);
    for kind in TaskSourceKind::ALL {
        println!();
        println!("{}", source_heading(&ctx.catalog, kind));
        let selected = ctx.catalog.selection(kind).await;
        if selected.is_empty() {
            println!("  selected: (none)");
        } else {
            println!("  selected: {}", selected.join(", "));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn source_heading(catalog: &SelectionCatalog, kind: TaskSourceKind) -> String {
    let location = match catalog.root() {
        Some(root) => manifest_path(root, kind).display().to_string(),
        None => kind.manifest_file_name().to_string(),
    };
    let availability = if catalog.manifest_available(kind) {
        ""
    } else {
        " (not found)"
    };
    format!("{kind}s: {location}{availability}")
}

/// One line per candidate; selected ones are starred.
fn format_candidates(candidates: &[TaskDescriptor], selected: &[String]) -> Vec<String> {
    if candidates.is_empty() {
        return vec!["  (none)".to_string()];
    }
    let width = candidates.iter().map(|c| c.name.len()).max().unwrap_or(0);
    candidates
        .iter()
        .map(|c| {
            let mark = if selected.contains(&c.name) { '*' } else { ' ' };
            format!(
                "  {mark} {:<width$}  {}",
                c.name,
                dispatch_command_line(c),
                width = width
            )
        })
        .collect()
}

fn exit_for(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn exit_code_for(record: &RunRecord) -> ExitCode {
    match record.exit_code {
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => exit_for(record.outcome.is_success()),
    }
}

async fn print_output_since(backend: &ProcessBackend, handle: &TaskHandle, offset: usize) -> usize {
    let Some((tail, next, _)) = backend.read_since(handle, offset).await else {
        return offset;
    };
    if !tail.is_empty() {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(tail.as_bytes());
        let _ = stdout.flush();
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use runbar_core::Normalizer;

    #[test]
    fn candidates_are_aligned_and_starred() {
        let normalizer = Normalizer::new("pnpm");
        let candidates = vec![
            normalizer.normalize_script("build", "tsc"),
            normalizer.normalize_script("test:unit", "mocha"),
        ];
        let lines = format_candidates(&candidates, &["test:unit".to_string()]);
        assert_eq!(
            lines,
            vec![
                "    build      pnpm run build".to_string(),
                "  * test:unit  pnpm run test:unit".to_string(),
            ]
        );
        assert_eq!(format_candidates(&[], &[]), vec!["  (none)".to_string()]);
    }

    #[tokio::test]
    async fn heading_reports_missing_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("package.json"), "{}").expect("write");
        let settings = Arc::new(
            runbar_core::ConfigStore::with_paths(None, dir.path().join("global.json"), None)
                .await
                .expect("settings"),
        );
        let catalog = SelectionCatalog::new(Some(dir.path().to_path_buf()), settings);
        assert!(source_heading(&catalog, TaskSourceKind::PackageScript)
            .starts_with("package scripts: "));
        assert!(source_heading(&catalog, TaskSourceKind::EditorTask).ends_with("(not found)"));
    }
}
