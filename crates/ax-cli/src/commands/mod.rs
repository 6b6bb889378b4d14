//! Subcommand implementations. Each writes its report to the given writer.

pub mod decide;
pub mod run;
pub mod stats;
pub mod validate;

use std::path::PathBuf;

use ax_engine::{resolve_experience_log_path, resolve_memory_path};

/// File locations shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Paths {
    pub memory: PathBuf,
    pub experience_log: Option<PathBuf>,
}

impl Paths {
    pub fn resolve(memory: Option<&str>, experience_log: Option<&str>) -> Self {
        Self {
            memory: resolve_memory_path(memory),
            experience_log: resolve_experience_log_path(experience_log),
        }
    }
}

pub(crate) fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}
