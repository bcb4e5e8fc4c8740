use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Resolve the workspace data directory path based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. `SIM_WORKSPACE_PATH` environment variable (with tilde expansion)
/// 3. System data directory (recommended default)
/// 4. `~/.sim-orchestrator` (fallback for systems without a standard data directory)
pub fn resolve_workspace_path(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("SIM_WORKSPACE_PATH") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("sim-orchestrator"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".sim-orchestrator"));
    }

    Err(Error::Config(
        "could not determine workspace path: no HOME directory or system data directory found"
            .to_string(),
    ))
}

/// Expand a leading `~/` in `path` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

/// Normalize a path for comparison (resolve to absolute, canonicalize if possible).
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

/// Check if two paths are equivalent after normalization.
pub fn paths_equal(path1: &Path, path2: &Path) -> bool {
    normalize_path(path1) == normalize_path(path2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn explicit_path_wins_over_env_and_expands_tilde() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("SIM_WORKSPACE_PATH", "/env/workspace");
        }
        let resolved = resolve_workspace_path(Some("/explicit/workspace")).unwrap();
        assert_eq!(resolved, PathBuf::from("/explicit/workspace"));
        unsafe {
            std::env::remove_var("SIM_WORKSPACE_PATH");
        }
    }

    #[test]
    fn env_var_used_when_no_explicit_path() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("SIM_WORKSPACE_PATH", "/env/workspace");
        }
        let resolved = resolve_workspace_path(None).unwrap();
        assert_eq!(resolved, PathBuf::from("/env/workspace"));
        unsafe {
            std::env::remove_var("SIM_WORKSPACE_PATH");
        }
    }

    #[test]
    fn paths_equal_after_normalization() {
        let cwd = std::env::current_dir().unwrap();
        assert!(paths_equal(&cwd, Path::new(".")));
    }
}
