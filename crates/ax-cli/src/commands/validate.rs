//! `ax validate`: strict load of the memory file.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use ax_engine::{MemoryStore, MemorySummary};

/// Load `path` strictly and describe it. A missing file is valid (empty).
pub fn validate(path: &Path, out: &mut impl Write) -> Result<MemorySummary> {
    let memory = MemoryStore::load(path)?;
    let summary = memory.summary();

    writeln!(out, "Valid memory file: {}", path.display())?;
    writeln!(out, "  URLs: {}", summary.urls)?;
    writeln!(out, "  Categories: {}", summary.categories)?;
    writeln!(out, "  Domains: {}", summary.domains)?;
    Ok(summary)
}
