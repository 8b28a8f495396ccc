use std::path::PathBuf;

use runbar_types::TaskSourceKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("No {} found in workspace", kind.manifest_file_name())]
    NotFound { kind: TaskSourceKind },

    #[error("Error reading {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("No workspace folder found")]
    NoWorkspace,

    #[error("Failed to run task `{task}`: {message}")]
    Backend { task: String, message: String },

    #[error("Failed to update settings: {0}")]
    Settings(String),
}

impl LaunchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LaunchError::Manifest(ManifestError::NotFound { .. }))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            LaunchError::Manifest(ManifestError::NotFound { .. }) => "MANIFEST_NOT_FOUND",
            LaunchError::Manifest(ManifestError::Parse { .. }) => "MANIFEST_PARSE_ERROR",
            LaunchError::Manifest(ManifestError::Io { .. }) => "MANIFEST_IO_ERROR",
            LaunchError::NoWorkspace => "NO_WORKSPACE",
            LaunchError::Backend { .. } => "BACKEND_ERROR",
            LaunchError::Settings(_) => "SETTINGS_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;
