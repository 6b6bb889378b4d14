//! Persistent outcome memory indexed by URL, domain, and content category.
//!
//! Loaded once at startup, written through on every mutation. There is no
//! locking across processes: one writer per memory file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::stats::{default_scores, rank_methods, MethodScore, MethodStats, DEFAULT_METHOD};
use crate::storage::{MemoryData, MemoryReader, MemoryWriter, UrlEntry};
use crate::types::{AxResult, Method, OutcomeRecord};
use crate::urls::{domain_of, normalize_url};

/// Memory store shared between the policy engine and the executor.
pub type SharedMemory = Arc<Mutex<MemoryStore>>;

/// Outcome memory backed by a JSON file.
#[derive(Debug)]
pub struct MemoryStore {
    data: MemoryData,
    path: PathBuf,
    /// False when an unreadable file could not be moved aside; saving
    /// would overwrite it.
    persist: bool,
}

/// Counts shown by `ax stats`.
#[derive(Debug, Clone, Serialize)]
pub struct MemorySummary {
    pub path: String,
    pub urls: usize,
    pub categories: usize,
    pub domains: usize,
    pub methods: BTreeMap<Method, MethodStats>,
}

impl MemoryStore {
    /// Empty store that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            data: MemoryData::default(),
            path: path.into(),
            persist: true,
        }
    }

    /// Load the store at `path`; a missing file is an empty store.
    ///
    /// # Errors
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> AxResult<Self> {
        let path = path.into();
        if !path.exists() {
            tracing::info!("Creating new memory file: {}", path.display());
            return Ok(Self::new(path));
        }

        let data = MemoryReader::read_from_file(&path)?;
        tracing::info!(
            "Loaded memory file {} ({} urls, {} categories)",
            path.display(),
            data.urls.len(),
            data.categories.len()
        );
        Ok(Self {
            data,
            path,
            persist: true,
        })
    }

    /// Like [`MemoryStore::load`], but an unreadable file yields an empty
    /// store and a warning so the run can continue.
    ///
    /// The unreadable file is renamed to `<name>.corrupt-<timestamp>` before
    /// anything is written. If that rename fails the store stays in memory
    /// only and never touches the file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(path.clone()) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    "Memory file {} unreadable ({e}); starting with empty memory",
                    path.display()
                );
                let mut store = Self::new(path);
                store.quarantine_unreadable_file();
                store
            }
        }
    }

    fn quarantine_unreadable_file(&mut self) {
        if !self.path.exists() {
            return;
        }
        let aside = corrupt_path(&self.path);
        match std::fs::rename(&self.path, &aside) {
            Ok(()) => {
                tracing::warn!(
                    "Moved unreadable memory file to {}",
                    aside.display()
                );
            }
            Err(e) => {
                tracing::warn!(
                    "Could not move unreadable memory file {} aside ({e}); memory will not be saved",
                    self.path.display()
                );
                self.persist = false;
            }
        }
    }

    pub fn into_shared(self) -> SharedMemory {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &MemoryData {
        &self.data
    }

    /// Exact, case-insensitive lookup of a URL.
    pub fn get(&self, url: &str) -> Option<&UrlEntry> {
        self.data.urls.get(&normalize_url(url))
    }

    /// Best method that has succeeded at least once for this exact URL.
    pub fn best_method_for_url(&self, url: &str) -> Option<Method> {
        let entry = self.get(url)?;
        let scores: BTreeMap<Method, MethodScore> = entry
            .methods
            .iter()
            .filter(|(_, stats)| stats.success_count > 0)
            .map(|(method, stats)| (*method, stats.score()))
            .collect();
        rank_methods(&scores).first().copied()
    }

    /// Category previously associated with the domain. Accepts a bare
    /// domain or a full URL.
    pub fn get_category_by_domain(&self, domain: &str) -> Option<&str> {
        self.data
            .domains
            .get(&domain_of(domain))
            .map(String::as_str)
    }

    pub fn has_category_data(&self, category: &str) -> bool {
        self.data
            .categories
            .get(&normalize_category_key(category))
            .is_some_and(|methods| methods.values().any(|stats| stats.count > 0))
    }

    /// Per-method scores for a category.
    ///
    /// Unseen categories get the fixed default table; methods a seen
    /// category has no data for keep their default row.
    pub fn get_category_stats(&self, category: &str) -> BTreeMap<Method, MethodScore> {
        let mut scores = default_scores();
        if let Some(methods) = self.data.categories.get(&normalize_category_key(category)) {
            for (method, stats) in methods {
                if stats.count > 0 {
                    scores.insert(*method, stats.score());
                }
            }
        }
        scores
    }

    /// Raw counters for a category, empty when unseen.
    pub fn category_method_stats(&self, category: &str) -> BTreeMap<Method, MethodStats> {
        self.data
            .categories
            .get(&normalize_category_key(category))
            .cloned()
            .unwrap_or_default()
    }

    /// Highest-ranked method for the category; [`DEFAULT_METHOD`] when
    /// nothing is known.
    pub fn get_best_method_for_category(&self, category: &str) -> Method {
        rank_methods(&self.get_category_stats(category))
            .first()
            .copied()
            .unwrap_or(DEFAULT_METHOD)
    }

    /// Best method for the category only if it has recorded outcomes.
    pub fn best_observed_method_for_category(&self, category: &str) -> Option<Method> {
        self.has_category_data(category)
            .then(|| self.get_best_method_for_category(category))
    }

    /// Record an attempt and persist.
    ///
    /// URL-level stats are always updated. Category stats and the
    /// domain association are only touched when the record has a category.
    /// The in-memory update survives a failed write.
    pub fn log(&mut self, record: &OutcomeRecord) -> AxResult<()> {
        let key = normalize_url(&record.url);
        self.data.extra.remove(&key);
        let entry = self
            .data
            .urls
            .entry(key.clone())
            .or_insert_with(|| UrlEntry {
                method: record.method,
                result: record.clone(),
                methods: BTreeMap::new(),
            });
        entry.method = record.method;
        entry.result = record.clone();
        entry
            .methods
            .entry(record.method)
            .or_default()
            .record(record.success, record.elapsed_time, record.friction);

        if let Some(category) = record.category.as_deref().map(normalize_category_key) {
            if !category.is_empty() {
                self.data
                    .categories
                    .entry(category.clone())
                    .or_default()
                    .entry(record.method)
                    .or_default()
                    .record(record.success, record.elapsed_time, record.friction);
                self.data.domains.insert(domain_of(&key), category);
            }
        }

        tracing::debug!(
            "Logged {} attempt on {key} (success: {})",
            record.method,
            record.success
        );
        self.save()
    }

    /// Associate a domain with a category and persist if it changed.
    pub fn associate_domain(&mut self, domain: &str, category: &str) -> AxResult<()> {
        let domain = domain_of(domain);
        let category = normalize_category_key(category);
        if domain.is_empty() || category.is_empty() {
            return Ok(());
        }
        if self.data.domains.get(&domain) == Some(&category) {
            return Ok(());
        }
        self.data.domains.insert(domain, category);
        self.save()
    }

    /// Write the whole document to disk. A no-op for a store that is not
    /// persistent.
    pub fn save(&self) -> AxResult<()> {
        if !self.persist {
            tracing::debug!("Memory not persisted: {}", self.path.display());
            return Ok(());
        }
        MemoryWriter::write_to_file(&self.data, &self.path)?;
        tracing::debug!("Saved memory file: {}", self.path.display());
        Ok(())
    }

    pub fn summary(&self) -> MemorySummary {
        let mut methods: BTreeMap<Method, MethodStats> = BTreeMap::new();
        for entry in self.data.urls.values() {
            for (method, stats) in &entry.methods {
                let total = methods.entry(*method).or_default();
                total.count += stats.count;
                total.success_count += stats.success_count;
                total.total_time += stats.total_time;
                total.total_friction += stats.total_friction;
            }
        }

        MemorySummary {
            path: self.path.display().to_string(),
            urls: self.data.urls.len(),
            categories: self.data.categories.len(),
            domains: self.data.domains.len(),
            methods,
        }
    }
}

fn normalize_category_key(category: &str) -> String {
    category.trim().to_lowercase()
}

fn corrupt_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("ax_memory.json");
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    path.with_file_name(format!("{name}.corrupt-{stamp}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(dir: &tempfile::TempDir) -> MemoryStore {
        MemoryStore::new(dir.path().join("memory.json"))
    }

    fn record(url: &str, method: Method, success: bool, category: Option<&str>) -> OutcomeRecord {
        OutcomeRecord::new(url, method, success, 0.5).with_category(category.map(String::from))
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = temp_store(&dir);
        store
            .log(&record("https://Example.com/X", Method::Dom, true, None))
            .unwrap();

        let entry = store.get("HTTPS://EXAMPLE.COM/x").unwrap();
        assert_eq!(entry.method, Method::Dom);
        assert_eq!(entry.stats(Method::Dom).unwrap().success_count, 1);
    }

    #[test]
    fn test_unseen_lookups_degrade_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);

        assert!(store.get("https://nowhere.example").is_none());
        assert!(store.get_category_by_domain("nowhere.example").is_none());
        assert_eq!(store.get_category_stats("sports"), default_scores());
        assert_eq!(store.get_best_method_for_category("sports"), DEFAULT_METHOD);
        assert!(store.best_observed_method_for_category("sports").is_none());
        assert!(store.best_method_for_url("https://nowhere.example").is_none());
    }

    #[test]
    fn test_default_table_is_stable_until_logged() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = temp_store(&dir);

        let first = serde_json::to_string(&store.get_category_stats("jobs")).unwrap();
        let second = serde_json::to_string(&store.get_category_stats("jobs")).unwrap();
        assert_eq!(first, second);

        store
            .log(&record("https://jobs.example/1", Method::Api, true, Some("jobs")))
            .unwrap();
        let third = serde_json::to_string(&store.get_category_stats("jobs")).unwrap();
        assert_ne!(first, third);
    }

    #[test]
    fn test_failure_without_category_leaves_category_index_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = temp_store(&dir);
        store
            .log(&record("https://example.com/x", Method::Api, false, None))
            .unwrap();

        let entry = store.get("https://example.com/x").unwrap();
        assert_eq!(entry.stats(Method::Api).unwrap().count, 1);
        assert_eq!(entry.stats(Method::Api).unwrap().success_count, 0);
        assert!(store.data().categories.is_empty());
        assert!(store.data().domains.is_empty());
    }

    #[test]
    fn test_category_log_associates_domain() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = temp_store(&dir);
        store
            .log(&record("https://jobs.example.com/a", Method::Dom, true, Some("Jobs")))
            .unwrap();

        assert_eq!(store.get_category_by_domain("jobs.example.com"), Some("jobs"));
        assert_eq!(
            store.get_category_by_domain("https://jobs.example.com/other"),
            Some("jobs")
        );
        assert_eq!(store.best_observed_method_for_category("JOBS"), Some(Method::Dom));
    }

    #[test]
    fn test_best_method_for_category_prefers_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = temp_store(&dir);
        for success in [true, true, true, false] {
            store
                .log(&record("https://a.example/1", Method::Browser, success, Some("media")))
                .unwrap();
        }
        store
            .log(&record("https://a.example/2", Method::Api, false, Some("media")))
            .unwrap();

        assert_eq!(store.get_best_method_for_category("media"), Method::Browser);
    }

    #[test]
    fn test_best_method_for_url_requires_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = temp_store(&dir);
        store
            .log(&record("https://example.com/x", Method::Api, false, None))
            .unwrap();
        assert!(store.best_method_for_url("https://example.com/x").is_none());

        store
            .log(&record("https://example.com/x", Method::Dom, true, None))
            .unwrap();
        assert_eq!(
            store.best_method_for_url("https://example.com/x"),
            Some(Method::Dom)
        );
    }

    #[test]
    fn test_success_rate_never_drops_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = temp_store(&dir);
        let url = "https://example.com/monotonic";
        store.log(&record(url, Method::Dom, false, None)).unwrap();

        let mut previous = store.get(url).unwrap().stats(Method::Dom).unwrap().success_rate();
        for _ in 0..5 {
            store.log(&record(url, Method::Dom, true, None)).unwrap();
            let current = store.get(url).unwrap().stats(Method::Dom).unwrap().success_rate();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_log_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        {
            let mut store = MemoryStore::new(&path);
            store
                .log(&record("https://example.com/x", Method::Dom, true, Some("news")))
                .unwrap();
        }

        let reloaded = MemoryStore::load(&path).unwrap();
        assert_eq!(reloaded.get("https://example.com/x").unwrap().method, Method::Dom);
        assert_eq!(reloaded.get_category_by_domain("example.com"), Some("news"));
    }

    #[test]
    fn test_open_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(MemoryStore::load(&path).is_err());
        let store = MemoryStore::open(&path);
        assert!(store.data().urls.is_empty());
        assert!(store.persist);
    }

    #[test]
    fn test_open_moves_corrupt_file_aside_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let original = r#"{"_categories": {}, "https://old.example/a": {"method": "dom"},}"#;
        std::fs::write(&path, original).unwrap();

        let mut store = MemoryStore::open(&path);
        store
            .log(&record("https://new.example/b", Method::Api, true, None))
            .unwrap();

        let kept: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().contains("memory.json.corrupt-"))
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(std::fs::read_to_string(&kept[0]).unwrap(), original);

        let reloaded = MemoryStore::load(&path).unwrap();
        assert!(reloaded.get("https://new.example/b").is_some());
    }

    #[test]
    fn test_unparsed_entries_survive_later_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(
            &path,
            r#"{"_categories": {}, "https://legacy.example/x": {"method": "dom", "result": {"success": true, "data": "page"}}}"#,
        )
        .unwrap();

        let mut store = MemoryStore::load(&path).unwrap();
        assert!(store.get("https://legacy.example/x").is_none());
        store
            .log(&record("https://new.example/y", Method::Api, true, None))
            .unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["https://legacy.example/x"]["result"]["data"], "page");
        assert_eq!(doc["https://new.example/y"]["method"], "api");
    }

    #[test]
    fn test_store_that_cannot_persist_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut store = MemoryStore::new(&path);
        store.persist = false;
        store
            .log(&record("https://example.com/x", Method::Dom, true, None))
            .unwrap();

        assert!(store.get("https://example.com/x").is_some());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_failed_write_keeps_in_memory_update() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let mut store = MemoryStore::new(blocker.join("memory.json"));

        let result = store.log(&record("https://example.com/x", Method::Api, true, None));
        assert!(result.is_err());
        assert!(store.get("https://example.com/x").is_some());
    }

    #[test]
    fn test_associate_domain() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = temp_store(&dir);
        store.associate_domain("https://wiki.example/page", "wiki").unwrap();
        assert_eq!(store.get_category_by_domain("wiki.example"), Some("wiki"));
        assert!(!store.has_category_data("wiki"));
    }

    #[test]
    fn test_summary_totals() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = temp_store(&dir);
        store.log(&record("https://a.example", Method::Api, false, None)).unwrap();
        store.log(&record("https://a.example", Method::Dom, true, Some("news"))).unwrap();
        store.log(&record("https://b.example", Method::Dom, true, Some("news"))).unwrap();

        let summary = store.summary();
        assert_eq!(summary.urls, 2);
        assert_eq!(summary.categories, 1);
        assert_eq!(summary.domains, 2);
        assert_eq!(summary.methods[&Method::Dom].success_count, 2);
        assert_eq!(summary.methods[&Method::Api].count, 1);
    }
}
