//! Building the URL work list from arguments and website files.

use std::path::Path;

use anyhow::{Context, Result};
use ax_engine::{RunConfig, Target};

/// Flags applied to every URL in a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetFlags {
    pub expect_form: bool,
    pub prefer_speed: bool,
    pub fill_forms: bool,
    /// Derive flags from each URL's text instead.
    pub infer_flags: bool,
}

impl TargetFlags {
    pub fn config_for(&self, url: &str) -> RunConfig {
        if self.infer_flags {
            return RunConfig::infer_from_url(url);
        }
        RunConfig::default()
            .with_expect_form(self.expect_form)
            .with_prefer_speed(self.prefer_speed)
            .with_fill_forms(self.fill_forms)
    }
}

/// One parsed line of a website file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteLine {
    pub url: String,
    pub true_category: Option<String>,
}

/// Parse a website list: one URL per line, optionally followed by its true
/// category. Blank lines and `#` comments are skipped.
pub fn parse_websites(text: &str) -> Vec<WebsiteLine> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.split(|c: char| c.is_whitespace() || c == ',');
            let url = parts.next()?.trim();
            let true_category = parts
                .map(str::trim)
                .find(|p| !p.is_empty())
                .map(str::to_lowercase);
            Some(WebsiteLine {
                url: url.to_string(),
                true_category,
            })
        })
        .collect()
}

pub fn read_websites(path: &Path) -> Result<Vec<WebsiteLine>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read website list {}", path.display()))?;
    Ok(parse_websites(&text))
}

/// Command-line URLs first, then file entries.
pub fn collect_targets(urls: &[String], file: Option<&Path>, flags: TargetFlags) -> Result<Vec<Target>> {
    let mut lines: Vec<WebsiteLine> = urls
        .iter()
        .map(|url| WebsiteLine {
            url: url.trim().to_string(),
            true_category: None,
        })
        .filter(|line| !line.url.is_empty())
        .collect();

    if let Some(path) = file {
        lines.extend(read_websites(path)?);
    }

    Ok(lines
        .into_iter()
        .map(|line| {
            let mut config = flags.config_for(&line.url);
            config.true_category = line.true_category;
            Target::new(line.url, config)
        })
        .collect())
}
