//! Append-only JSONL log of every extraction attempt.
//!
//! Rotates to `.1`, `.2`, ... once the file passes its size limit.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::types::{AxResult, OutcomeRecord};

/// Size at which the log rotates (10 MB).
const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated files kept.
const MAX_ROTATIONS: u32 = 3;

pub struct ExperienceLog {
    file: File,
    path: PathBuf,
    current_size: u64,
    max_size: u64,
}

impl ExperienceLog {
    /// Open or create the log file, creating parent directories.
    pub fn open(path: &Path) -> AxResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            current_size,
            max_size: DEFAULT_MAX_SIZE,
        })
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Append one record as a JSON line.
    pub fn log(&mut self, record: &OutcomeRecord) -> AxResult<()> {
        if self.current_size >= self.max_size {
            self.rotate()?;
        }

        let line = serde_json::to_string(record)?;
        writeln!(self.file, "{line}")?;
        self.current_size += line.len() as u64 + 1;
        Ok(())
    }

    /// experience.jsonl → experience.jsonl.1, .1 → .2, oldest dropped.
    fn rotate(&mut self) -> AxResult<()> {
        self.file.flush()?;

        let oldest = rotation_path(&self.path, MAX_ROTATIONS);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }
        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            if from.exists() {
                std::fs::rename(&from, rotation_path(&self.path, i + 1))?;
            }
        }
        std::fs::rename(&self.path, rotation_path(&self.path, 1))?;

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.current_size = 0;
        tracing::debug!("Rotated experience log {}", self.path.display());
        Ok(())
    }
}

fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("experience.jsonl");
    base.with_file_name(format!("{name}.{index}"))
}
