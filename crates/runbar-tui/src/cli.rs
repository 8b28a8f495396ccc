use std::path::PathBuf;

use clap::{Parser, Subcommand};
use runbar_types::TaskSourceKind;
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "runbar")]
#[command(about = "Pick and run package scripts and editor tasks from the terminal")]
pub struct Cli {
    /// Workspace root. Defaults to RUNBAR_WORKSPACE, then the current directory.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
    /// Program used for `<manager> run <script>`.
    #[arg(long, global = true)]
    pub package_manager: Option<String>,
    /// Mirror logs to stderr (ignored by the interactive launcher).
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Interactive launcher (default).
    Menu,
    /// List discoverable tasks; selected ones are starred.
    List {
        #[arg(long)]
        kind: Option<TaskSourceKind>,
    },
    /// Replace the selection for one source. Without names, pick interactively.
    Select {
        #[arg(long)]
        kind: TaskSourceKind,
        names: Vec<String>,
        /// Clear the selection instead.
        #[arg(long, default_value_t = false, conflicts_with = "names")]
        clear: bool,
    },
    /// Run a task by name and exit with its status.
    Run {
        name: String,
        #[arg(long)]
        kind: Option<TaskSourceKind>,
    },
    /// Show the resolved workspace, settings and selections.
    Status,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Menu)
    }

    /// Highest-precedence settings layer built from flags.
    pub fn settings_overrides(&self) -> Option<Value> {
        let manager = self
            .package_manager
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())?;
        Some(json!({ "packageManager": manager }))
    }
}
