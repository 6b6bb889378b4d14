//! `ax decide`: show which method would be tried first, without running it.
//!
//! Not read-only: a domain category guessed here is saved to the memory file.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use ax_engine::{Decision, KeywordCategorizer, MemoryStore, PolicyEngine, RunConfig};

/// A classification made here is remembered for the domain, like during a run.
pub async fn decide(
    memory: MemoryStore,
    url: &str,
    config: &RunConfig,
    json: bool,
    out: &mut impl Write,
) -> Result<Decision> {
    let policy = PolicyEngine::new(memory.into_shared())
        .with_categorizer(Arc::new(KeywordCategorizer::new()));
    let decision = policy.decide_with_source(url, config).await;

    if json {
        let document = json!({
            "url": url,
            "method": decision.method,
            "source": decision.source,
            "memory_hit": decision.is_memory_hit(),
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&document)?)?;
    } else {
        writeln!(out, "{url}: {} (from {})", decision.method, decision.source)?;
    }
    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ax_engine::{Method, MethodSource, OutcomeRecord};

    #[tokio::test]
    async fn test_decide_reports_memory_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory = MemoryStore::new(dir.path().join("m.json"));
        memory
            .log(&OutcomeRecord::new("https://seen.example/a", Method::Browser, true, 3.0))
            .unwrap();

        let mut out = Vec::new();
        let decision = decide(memory, "https://seen.example/a", &RunConfig::default(), false, &mut out)
            .await
            .unwrap();
        assert_eq!(decision.source, MethodSource::Memory);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "https://seen.example/a: browser (from memory)\n"
        );
    }

    #[tokio::test]
    async fn test_decide_json() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryStore::new(dir.path().join("m.json"));
        let config = RunConfig::default().with_prefer_speed(true);

        let mut out = Vec::new();
        decide(memory, "https://new.example", &config, true, &mut out).await.unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["method"], "api");
        assert_eq!(doc["source"], "heuristic");
        assert_eq!(doc["memory_hit"], false);
    }

    #[tokio::test]
    async fn test_decide_saves_guessed_domain_category() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        let memory = MemoryStore::new(&path);

        let mut out = Vec::new();
        decide(memory, "https://jobs.example.com/openings", &RunConfig::default(), false, &mut out)
            .await
            .unwrap();

        let reloaded = MemoryStore::load(&path).unwrap();
        assert_eq!(reloaded.get_category_by_domain("jobs.example.com"), Some("jobs"));
        assert!(!reloaded.has_category_data("jobs"));
    }
}
