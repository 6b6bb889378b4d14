//! `ax stats`: what the memory file knows.

use std::io::Write;

use anyhow::Result;
use serde_json::json;

use ax_engine::{rank_methods, MemoryStore};

pub fn stats(memory: &MemoryStore, category: Option<&str>, json: bool, out: &mut impl Write) -> Result<()> {
    match category {
        Some(category) => category_table(memory, category, json, out),
        None => overview(memory, json, out),
    }
}

fn overview(memory: &MemoryStore, json: bool, out: &mut impl Write) -> Result<()> {
    let summary = memory.summary();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        return Ok(());
    }

    writeln!(out, "Memory file: {}", summary.path)?;
    writeln!(out, "  URLs:       {}", summary.urls)?;
    writeln!(out, "  Categories: {}", summary.categories)?;
    writeln!(out, "  Domains:    {}", summary.domains)?;
    for (method, stats) in &summary.methods {
        writeln!(
            out,
            "  {:<7} attempts={} successes={} success_rate={:.2} avg_time={:.2}s",
            method.as_str(),
            stats.count,
            stats.success_count,
            stats.success_rate(),
            stats.avg_time()
        )?;
    }
    Ok(())
}

fn category_table(memory: &MemoryStore, category: &str, json: bool, out: &mut impl Write) -> Result<()> {
    let scores = memory.get_category_stats(category);
    let counters = memory.category_method_stats(category);
    let ranking = rank_methods(&scores);
    let best = memory.get_best_method_for_category(category);
    let observed = memory.has_category_data(category);

    if json {
        let rows: Vec<_> = ranking
            .iter()
            .map(|method| {
                let score = scores[method];
                json!({
                    "method": method,
                    "success_rate": score.success_rate,
                    "friction": score.friction,
                    "count": counters.get(method).map_or(0, |s| s.count),
                })
            })
            .collect();
        let document = json!({
            "category": category,
            "observed": observed,
            "best_method": best,
            "methods": rows,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&document)?)?;
        return Ok(());
    }

    let note = if observed { "" } else { " (no data, defaults)" };
    writeln!(out, "Category {category}{note}: best method {best}")?;
    for method in &ranking {
        let score = scores[method];
        let count = counters.get(method).map_or(0, |s| s.count);
        writeln!(
            out,
            "  {:<7} success_rate={:.2} friction={:.2} attempts={count}",
            method.as_str(),
            score.success_rate,
            score.friction
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ax_engine::{Method, OutcomeRecord};

    fn memory(dir: &tempfile::TempDir) -> MemoryStore {
        let mut memory = MemoryStore::new(dir.path().join("m.json"));
        let record = OutcomeRecord::new("https://shop.example/1", Method::Dom, true, 1.0)
            .with_category(Some("ecommerce".into()));
        memory.log(&record).unwrap();
        memory
    }

    #[test]
    fn test_overview_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        stats(&memory(&dir), None, false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("URLs:       1"));
        assert!(text.contains("dom     attempts=1 successes=1"));
    }

    #[test]
    fn test_unseen_category_shows_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        stats(&memory(&dir), Some("wiki"), false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Category wiki (no data, defaults): best method api"));
    }

    #[test]
    fn test_category_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        stats(&memory(&dir), Some("ecommerce"), true, &mut out).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["best_method"], "dom");
        assert_eq!(doc["methods"][0]["method"], "dom");
        assert_eq!(doc["methods"][0]["count"], 1);
        assert_eq!(doc["observed"], true);
    }
}
