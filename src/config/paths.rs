//! Project-root relative locations and `.env` loading.

use std::env;
use std::path::{Path, PathBuf};

use crate::logging::{API_CALLS, ERROR_ICON, SUCCESS_ICON};

/// Environment variable that overrides the project root.
pub const ROOT_ENV_VAR: &str = "LLM_BRIDGE_ROOT";

/// Project root: `LLM_BRIDGE_ROOT` if set, the current directory otherwise.
pub fn project_root() -> PathBuf {
    env::var_os(ROOT_ENV_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `<root>/.env`
pub fn env_file(root: &Path) -> PathBuf {
    root.join(".env")
}

/// `<root>/logs`
pub fn logs_dir(root: &Path) -> PathBuf {
    root.join("logs")
}

/// Load `<root>/.env`, overriding variables already set in the process.
///
/// Returns the loaded path. A missing or unreadable file is logged and ignored.
pub fn load_dotenv(root: &Path) -> Option<PathBuf> {
    let path = env_file(root);
    if !path.exists() {
        tracing::warn!(target: API_CALLS, "{} Env file not found: {}", ERROR_ICON, path.display());
        return None;
    }

    match dotenvy::from_path_override(&path) {
        Ok(()) => {
            tracing::info!(target: API_CALLS, "{} Loaded env file: {}", SUCCESS_ICON, path.display());
            Some(path)
        }
        Err(e) => {
            tracing::warn!(
                target: API_CALLS,
                "{} Failed to load env file {}: {}",
                ERROR_ICON,
                path.display(),
                e
            );
            None
        }
    }
}
