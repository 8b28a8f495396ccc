use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use runbar_core::resolve_shared_paths;
use runbar_observability::{
    canonical_logs_dir_from_root, emit_event, init_process_logging, ObservabilityEvent,
    ProcessKind,
};
use std::time::{Duration, Instant};

mod app;
mod cli;
mod commands;
mod console;
mod context;
mod surface;
mod ui;

use app::App;
use cli::{Cli, Command};
use context::LauncherContext;
use surface::TerminalSurface;

const LOG_RETENTION_DAYS: u64 = 14;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let command = cli.command();
    let interactive = command == Command::Menu;
    let process = if interactive {
        ProcessKind::Tui
    } else {
        ProcessKind::Cli
    };

    // Shared logs live under the data dir; fall back to a temp dir when it
    // cannot be resolved.
    let logs_dir = resolve_shared_paths()
        .map(|p| canonical_logs_dir_from_root(&p.canonical_root))
        .unwrap_or_else(|_| canonical_logs_dir_from_root(&std::env::temp_dir().join("runbar")));
    let (log_guard, log_info) = init_process_logging(
        process,
        &logs_dir,
        LOG_RETENTION_DAYS,
        cli.verbose && !interactive,
    )?;
    emit_event(
        tracing::Level::INFO,
        process,
        ObservabilityEvent {
            event: "logging.initialized",
            component: "tui.main",
            status: Some("ok"),
            detail: Some("runbar jsonl logging initialized"),
            ..ObservabilityEvent::default()
        },
    );
    tracing::info!("runbar logging initialized: {:?}", log_info);

    let ctx = LauncherContext::load(cli.root.as_deref(), cli.settings_overrides()).await?;
    let code = match command {
        Command::Menu => {
            run_interactive(&ctx).await?;
            ExitCode::SUCCESS
        }
        Command::List { kind } => commands::list(&ctx, kind).await?,
        Command::Select { kind, names, clear } => commands::select(&ctx, kind, names, clear).await?,
        Command::Run { name, kind } => commands::run(&ctx, kind, &name).await?,
        Command::Status => commands::status(&ctx).await?,
    };
    drop(log_guard);
    Ok(code)
}

async fn run_interactive(ctx: &LauncherContext) -> anyhow::Result<()> {
    let (surface, requests) = TerminalSurface::channel();
    let launcher = ctx.launcher(Arc::new(surface));
    let mut app = App::new(launcher, ctx.backend.clone(), requests, ctx.root_label());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.shutdown().await;
    if let Err(err) = &res {
        tracing::error!("launcher loop failed: {:?}", err);
    }
    res
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> anyhow::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();
    app.tick().await;

    loop {
        app.drain_requests();
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0))
            .min(Duration::from_millis(50));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = app.handle_key_event(key) {
                        app.update(action).await?;
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick().await;
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
