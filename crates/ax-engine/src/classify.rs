//! Content categorization and summarization interfaces.
//!
//! Both are optional collaborators. The engine treats them as slow and
//! fallible and never lets their errors change a decision or an outcome.

use anyhow::Result;
use async_trait::async_trait;

/// Closed category vocabulary.
pub const CATEGORIES: [&str; 8] = [
    "jobs",
    "news",
    "ecommerce",
    "academic",
    "media",
    "api",
    "wiki",
    "general",
];

/// Category used when classification fails or is inconclusive.
pub const DEFAULT_CATEGORY: &str = "general";

/// Only this much input is looked at.
const MAX_INPUT_CHARS: usize = 3000;

/// Assigns a coarse category label to page content.
#[async_trait]
pub trait Categorizer: Send + Sync {
    async fn categorize(&self, content: &str) -> Result<String>;
}

/// Produces a short human-readable digest of extracted content.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, content: &str) -> Result<String>;
}

/// Map any label onto [`CATEGORIES`], defaulting to [`DEFAULT_CATEGORY`].
pub fn normalize_category(label: &str) -> String {
    let cleaned = label
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if CATEGORIES.contains(&cleaned.as_str()) {
        cleaned
    } else {
        DEFAULT_CATEGORY.to_string()
    }
}

/// Keyword table: category and the whole-word tokens that vote for it.
const RULES: &[(&str, &[&str])] = &[
    (
        "jobs",
        &[
            "job", "jobs", "career", "careers", "hiring", "vacancy", "vacancies", "recruiting",
            "resume", "salary", "internship",
        ],
    ),
    (
        "news",
        &[
            "news", "breaking", "headline", "headlines", "reporter", "editorial", "journalism",
            "press",
        ],
    ),
    (
        "ecommerce",
        &[
            "shop", "cart", "checkout", "price", "buy", "product", "products", "store",
            "shipping", "deals",
        ],
    ),
    (
        "academic",
        &[
            "university", "research", "journal", "paper", "arxiv", "abstract", "citation",
            "scholar", "edu", "thesis",
        ],
    ),
    (
        "media",
        &[
            "video", "videos", "watch", "stream", "music", "podcast", "youtube", "gallery",
            "photo", "photos",
        ],
    ),
    ("api", &["api", "json", "endpoint", "graphql", "swagger", "openapi", "rest"]),
    ("wiki", &["wiki", "wikipedia", "encyclopedia", "wikis"]),
];

/// Keyword-scoring categorizer. Works on page text or on a bare domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordCategorizer;

impl KeywordCategorizer {
    pub fn new() -> Self {
        Self
    }

    /// Highest-scoring category; ties go to the earlier rule.
    pub fn classify(&self, content: &str) -> &'static str {
        let lowered = content
            .chars()
            .take(MAX_INPUT_CHARS)
            .collect::<String>()
            .to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let mut best: (&'static str, usize) = (DEFAULT_CATEGORY, 0);
        for &(category, keywords) in RULES {
            let score = tokens.iter().filter(|t| keywords.contains(*t)).count();
            if score > best.1 {
                best = (category, score);
            }
        }
        best.0
    }
}

#[async_trait]
impl Categorizer for KeywordCategorizer {
    async fn categorize(&self, content: &str) -> Result<String> {
        Ok(self.classify(content).to_string())
    }
}

/// Summarizer that keeps the leading excerpt of the content.
#[derive(Debug, Clone)]
pub struct LeadSummarizer {
    max_chars: usize,
}

impl Default for LeadSummarizer {
    fn default() -> Self {
        Self { max_chars: 280 }
    }
}

impl LeadSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn excerpt(&self, content: &str) -> String {
        let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= self.max_chars {
            return collapsed;
        }
        let mut excerpt: String = collapsed.chars().take(self.max_chars).collect();
        excerpt.push_str("...");
        excerpt
    }
}

#[async_trait]
impl Summarizer for LeadSummarizer {
    async fn summarize(&self, content: &str) -> Result<String> {
        Ok(self.excerpt(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category(" Jobs. "), "jobs");
        assert_eq!(normalize_category("\"NEWS\""), "news");
        assert_eq!(normalize_category("other"), DEFAULT_CATEGORY);
        assert_eq!(normalize_category(""), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_classify_domains() {
        let categorizer = KeywordCategorizer::new();
        assert_eq!(categorizer.classify("<html><body>jobs.example.com</body></html>"), "jobs");
        assert_eq!(categorizer.classify("<html><body>en.wikipedia.org</body></html>"), "wiki");
        assert_eq!(categorizer.classify("arxiv.org"), "academic");
        assert_eq!(categorizer.classify("example.com"), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_classify_text_picks_highest_score() {
        let categorizer = KeywordCategorizer::new();
        let text = "Add to cart. Free shipping on every product. Checkout now. Breaking news!";
        assert_eq!(categorizer.classify(text), "ecommerce");
    }

    #[test]
    fn test_classify_ignores_substrings() {
        let categorizer = KeywordCategorizer::new();
        assert_eq!(categorizer.classify("rapid therapist"), DEFAULT_CATEGORY);
    }

    #[tokio::test]
    async fn test_categorizer_trait_returns_vocabulary_label() {
        let categorizer = KeywordCategorizer::new();
        let label = categorizer.categorize("watch the latest video").await.unwrap();
        assert!(CATEGORIES.contains(&label.as_str()));
        assert_eq!(label, "media");
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let summarizer = LeadSummarizer::new(5);
        assert_eq!(summarizer.excerpt("héllo wörld"), "héllo...");
        assert_eq!(summarizer.excerpt("  a \n b  "), "a b");
    }
}
