//! Configuration loading and resolution.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the memory file.
pub const MEMORY_FILE_ENV: &str = "AX_MEMORY_FILE";

/// Environment variable naming the experience log.
pub const EXPERIENCE_LOG_ENV: &str = "AX_EXPERIENCE_LOG";

/// Memory file looked for in the working directory.
pub const LOCAL_MEMORY_FILE: &str = "ax_memory.json";

/// Per-attempt timeout applied when none is configured.
pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolve the memory file path.
///
/// Explicit path, then `AX_MEMORY_FILE`, then `./ax_memory.json` if it
/// exists, then `~/.ax/memory.json`.
pub fn resolve_memory_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var(MEMORY_FILE_ENV) {
        if !env_path.trim().is_empty() {
            return PathBuf::from(env_path);
        }
    }

    let local = PathBuf::from(LOCAL_MEMORY_FILE);
    if local.exists() {
        return local;
    }

    resolve_default_memory_path()
}

fn resolve_default_memory_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ax")
        .join("memory.json")
}

/// Resolve the experience log path. No log unless one is asked for.
pub fn resolve_experience_log_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    std::env::var(EXPERIENCE_LOG_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        assert_eq!(
            resolve_memory_path(Some("/tmp/custom.json")),
            PathBuf::from("/tmp/custom.json")
        );
        assert_eq!(
            resolve_experience_log_path(Some("exp.jsonl")),
            Some(PathBuf::from("exp.jsonl"))
        );
    }

    #[test]
    fn test_default_path_is_under_home() {
        let path = resolve_default_memory_path();
        assert!(path.ends_with(".ax/memory.json"));
    }
}
