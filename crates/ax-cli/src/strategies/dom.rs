//! `dom` method: fetch the static HTML and keep its visible text.

use anyhow::Result;
use async_trait::async_trait;
use scraper::{Html, Selector};

use ax_engine::{Content, Outcome, RunConfig, Strategy};

use super::http_client::HttpClient;

/// Elements whose text is never shown to a reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

pub struct DomStrategy {
    http: HttpClient,
}

impl DomStrategy {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Strategy for DomStrategy {
    async fn attempt(&self, url: &str, _config: &RunConfig) -> Result<Outcome> {
        let resp = match self.http.get(url).await {
            Ok(resp) => resp,
            Err(e) => return Ok(Outcome::failure(format!("request failed: {e}"))),
        };
        if !resp.is_success() {
            return Ok(Outcome::failure(format!("HTTP {}", resp.status)));
        }

        let text = visible_text(&resp.body);
        tracing::debug!(
            "Scraped {} chars of text from {} ({})",
            text.len(),
            resp.final_url,
            resp.content_type.as_deref().unwrap_or("no content type")
        );
        Ok(Outcome::success(Content::Text(text)))
    }
}

/// Whitespace-collapsed text of the `<body>` (or whole document), skipping
/// scripts, styles and other hidden elements.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}
