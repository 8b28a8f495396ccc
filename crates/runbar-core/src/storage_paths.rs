use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedPaths {
    pub canonical_root: PathBuf,
    pub logs_dir: PathBuf,
}

pub fn resolve_shared_paths() -> anyhow::Result<SharedPaths> {
    let base = dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to resolve data dir"))?;
    let canonical_root = base.join("runbar");
    Ok(SharedPaths {
        logs_dir: canonical_root.join("logs"),
        canonical_root,
    })
}

/// `--root`, then `RUNBAR_WORKSPACE`, then the current directory. Anything
/// that is not an existing directory means no workspace is open.
pub fn resolve_workspace_root(flag: Option<&Path>) -> Option<PathBuf> {
    let candidate = match flag {
        Some(path) => path.to_path_buf(),
        None => match std::env::var("RUNBAR_WORKSPACE") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
            _ => std::env::current_dir().ok()?,
        },
    };
    let absolute = if candidate.is_absolute() {
        candidate
    } else {
        std::env::current_dir().ok()?.join(candidate)
    };
    if !absolute.is_dir() {
        return None;
    }
    Some(absolute.canonicalize().unwrap_or(absolute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_must_be_a_directory() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let file = dir.path().join("package.json");
        std::fs::write(&file, "{}").expect("write");

        assert!(resolve_workspace_root(Some(dir.path())).is_some());
        assert!(resolve_workspace_root(Some(&file)).is_none());
        assert!(resolve_workspace_root(Some(&dir.path().join("missing"))).is_none());
    }
}
