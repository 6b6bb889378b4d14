//! `api` method: look for machine-readable JSON instead of a page.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;

use ax_engine::{Content, Outcome, RunConfig, Strategy};

use super::http_client::HttpClient;

/// Well-known API roots probed on the URL's origin.
pub const PROBE_PATHS: &[&str] = &["/api", "/v1", "/graphql", "/wp-json", "/data", "/w/api.php"];

/// Probes in flight at once.
const PROBE_CONCURRENCY: usize = 3;

pub struct ApiStrategy {
    http: HttpClient,
}

impl ApiStrategy {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// The URL itself answers with JSON.
    async fn direct(&self, url: &str) -> Option<Value> {
        match self.http.get(url).await {
            Ok(resp) if resp.is_success() => parse_json(&resp.body),
            Ok(resp) => {
                tracing::debug!("Direct API request to {url} returned {}", resp.status);
                None
            }
            Err(e) => {
                tracing::debug!("Direct API request to {url} failed: {e}");
                None
            }
        }
    }

    /// First probe path, in listed order, that answers with JSON.
    async fn probe(&self, url: &str) -> Option<(String, Value)> {
        let candidates = probe_urls(url, PROBE_PATHS);
        if candidates.is_empty() {
            return None;
        }

        let results: Vec<Option<(String, Value)>> = stream::iter(candidates)
            .map(|candidate| async move {
                let resp = self.http.get(&candidate).await.ok()?;
                if !resp.is_success() {
                    return None;
                }
                parse_json(&resp.body).map(|value| (candidate, value))
            })
            .buffered(PROBE_CONCURRENCY)
            .collect()
            .await;

        results.into_iter().flatten().next()
    }
}

#[async_trait]
impl Strategy for ApiStrategy {
    async fn attempt(&self, url: &str, _config: &RunConfig) -> Result<Outcome> {
        if let Some(value) = self.direct(url).await {
            tracing::info!("Direct API success: {url}");
            return Ok(Outcome::success(Content::Json(value)));
        }

        match self.probe(url).await {
            Some((endpoint, value)) => {
                tracing::info!("Found API endpoint {endpoint} for {url}");
                Ok(Outcome::success(Content::Json(value)))
            }
            None => Ok(Outcome::failure("no JSON API found")),
        }
    }
}

/// Non-empty JSON document, or `None`.
fn parse_json(body: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    match &value {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        _ => Some(value),
    }
}

/// Probe URLs on the origin of `url`. Empty when `url` does not parse.
fn probe_urls(url: &str, paths: &[&str]) -> Vec<String> {
    let Ok(base) = reqwest::Url::parse(url.trim()) else {
        return Vec::new();
    };
    paths
        .iter()
        .filter_map(|path| base.join(path).ok())
        .map(|u| u.to_string())
        .filter(|candidate| candidate.as_str() != url.trim())
        .collect()
}
