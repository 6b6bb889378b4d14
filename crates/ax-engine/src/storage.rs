//! JSON document reader/writer for outcome memory.
//!
//! The document is a single object. Two reserved keys hold the indexes:
//! `_categories` (category → method → stats) and `_domains`
//! (domain → category). Every other top-level key is a URL entry.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::stats::MethodStats;
use crate::types::{AxError, AxResult, Method, OutcomeRecord};
use crate::urls::normalize_url;

/// Reserved key for the category index.
pub const CATEGORY_INDEX_KEY: &str = "_categories";

/// Reserved key for the domain → category index.
pub const DOMAIN_INDEX_KEY: &str = "_domains";

/// Everything remembered about one URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UrlEntry {
    /// Method of the latest attempt.
    pub method: Method,
    /// The latest attempt.
    pub result: OutcomeRecord,
    /// Cumulative stats per method for this URL.
    #[serde(default)]
    pub methods: BTreeMap<Method, MethodStats>,
}

impl UrlEntry {
    pub fn stats(&self, method: Method) -> Option<&MethodStats> {
        self.methods.get(&method)
    }
}

/// The in-memory shape of the persisted document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryData {
    pub urls: BTreeMap<String, UrlEntry>,
    pub categories: BTreeMap<String, BTreeMap<Method, MethodStats>>,
    pub domains: BTreeMap<String, String>,
    /// URL keys whose entries did not parse, kept verbatim so a write
    /// puts them back.
    pub extra: BTreeMap<String, Value>,
}

/// Writer for memory documents.
pub struct MemoryWriter;

/// Reader for memory documents.
pub struct MemoryReader;

impl MemoryWriter {
    /// Replace the file at `path` with the full document.
    ///
    /// Writes to a sibling temp file first, then renames over the target.
    pub fn write_to_file(data: &MemoryData, path: &Path) -> AxResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = temp_path(path);
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            Self::write_to(data, &mut writer)?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Write the document to any writer, pretty-printed.
    pub fn write_to<W: Write>(data: &MemoryData, writer: &mut W) -> AxResult<()> {
        let document = to_document(data)?;
        serde_json::to_writer_pretty(&mut *writer, &Value::Object(document))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl MemoryReader {
    pub fn read_from_file(path: &Path) -> AxResult<MemoryData> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }

    /// Parse a document. Malformed URL entries are set aside in
    /// [`MemoryData::extra`] with a warning; malformed indexes are an error.
    pub fn read_from<R: Read>(reader: R) -> AxResult<MemoryData> {
        let document: Value = serde_json::from_reader(reader)?;
        let Value::Object(map) = document else {
            return Err(AxError::Storage(
                "memory document must be a JSON object".to_string(),
            ));
        };

        let mut data = MemoryData::default();
        for (key, value) in map {
            match key.as_str() {
                CATEGORY_INDEX_KEY => {
                    data.categories = serde_json::from_value(value)
                        .map_err(|e| AxError::Storage(format!("Invalid category index: {e}")))?;
                }
                DOMAIN_INDEX_KEY => {
                    data.domains = serde_json::from_value(value)
                        .map_err(|e| AxError::Storage(format!("Invalid domain index: {e}")))?;
                }
                _ => match serde_json::from_value::<UrlEntry>(value.clone()) {
                    Ok(entry) => {
                        data.urls.insert(normalize_url(&key), entry);
                    }
                    Err(e) => {
                        tracing::warn!("Skipping malformed memory entry {key}: {e}");
                        data.extra.insert(key, value);
                    }
                },
            }
        }

        Ok(data)
    }
}

fn to_document(data: &MemoryData) -> AxResult<Map<String, Value>> {
    let mut document = Map::new();
    document.insert(
        CATEGORY_INDEX_KEY.to_string(),
        serde_json::to_value(&data.categories)?,
    );
    document.insert(
        DOMAIN_INDEX_KEY.to_string(),
        serde_json::to_value(&data.domains)?,
    );
    for (key, value) in &data.extra {
        document.insert(key.clone(), value.clone());
    }
    for (url, entry) in &data.urls {
        document.insert(url.clone(), serde_json::to_value(entry)?);
    }
    Ok(document)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("ax_memory.json");
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_data() -> MemoryData {
        let mut data = MemoryData::default();
        let record = OutcomeRecord::new("https://example.com/x", Method::Dom, true, 1.25)
            .with_category(Some("news".to_string()));

        let mut stats = MethodStats::default();
        stats.record(true, 1.25, 0.5);

        data.urls.insert(
            record.url.clone(),
            UrlEntry {
                method: Method::Dom,
                result: record,
                methods: BTreeMap::from([(Method::Dom, stats)]),
            },
        );
        data.categories
            .insert("news".to_string(), BTreeMap::from([(Method::Dom, stats)]));
        data.domains
            .insert("example.com".to_string(), "news".to_string());
        data
    }

    #[test]
    fn test_roundtrip_preserves_indexes() {
        let data = sample_data();
        let mut buf = Vec::new();
        MemoryWriter::write_to(&data, &mut buf).unwrap();

        let loaded = MemoryReader::read_from(&buf[..]).unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_layout_uses_reserved_keys() {
        let mut buf = Vec::new();
        MemoryWriter::write_to(&sample_data(), &mut buf).unwrap();
        let doc: Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(doc["_domains"]["example.com"], "news");
        assert_eq!(doc["_categories"]["news"]["dom"]["success_count"], 1);
        assert_eq!(doc["https://example.com/x"]["method"], "dom");
        assert_eq!(doc["https://example.com/x"]["result"]["success"], true);
    }

    #[test]
    fn test_non_object_document_rejected() {
        let result = MemoryReader::read_from(&b"[1, 2, 3]"[..]);
        assert!(matches!(result, Err(AxError::Storage(_))));
    }

    #[test]
    fn test_malformed_url_entry_skipped() {
        let doc = json!({
            "_categories": {},
            "https://broken.example": { "method": "telnet" },
        });
        let loaded = MemoryReader::read_from(doc.to_string().as_bytes()).unwrap();
        assert!(loaded.urls.is_empty());
        assert_eq!(loaded.extra["https://broken.example"], json!({ "method": "telnet" }));

        let mut buf = Vec::new();
        MemoryWriter::write_to(&loaded, &mut buf).unwrap();
        let written: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(written["https://broken.example"]["method"], "telnet");

        let reloaded = MemoryReader::read_from(&buf[..]).unwrap();
        assert_eq!(reloaded, loaded);
    }

    #[test]
    fn test_missing_indexes_default_empty() {
        let loaded = MemoryReader::read_from(&b"{}"[..]).unwrap();
        assert_eq!(loaded, MemoryData::default());
    }

    #[test]
    fn test_file_roundtrip_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("memory.json");

        MemoryWriter::write_to_file(&sample_data(), &path).unwrap();
        let loaded = MemoryReader::read_from_file(&path).unwrap();
        assert_eq!(loaded.urls.len(), 1);
        assert!(!temp_path(&path).exists());
    }
}
