//! Core data types for extraction attempts, outcomes, and run configuration.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::urls::normalize_url;

/// An extraction strategy the engine can choose between.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Api,
    Dom,
    Browser,
}

impl Method {
    /// Fixed fallback order, cheapest first.
    pub const ALL: [Method; 3] = [Method::Api, Method::Dom, Method::Browser];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Dom => "dom",
            Self::Browser => "browser",
        }
    }

    /// Case-insensitive parse of a method name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "api" => Some(Self::Api),
            "dom" => Some(Self::Dom),
            "browser" => Some(Self::Browser),
            _ => None,
        }
    }

    /// Baseline friction assigned to an attempt with this method.
    pub fn baseline_friction(self, success: bool) -> f64 {
        match (self, success) {
            (Self::Api, true) => 0.2,
            (Self::Api, false) => 1.0,
            (Self::Dom, true) => 0.5,
            (Self::Dom, false) => 1.5,
            (Self::Browser, true) => 1.0,
            (Self::Browser, false) => 2.0,
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = AxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| AxError::UnknownMethod(s.to_string()))
    }
}

/// Content produced by a successful strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Json(Value),
}

impl Content {
    /// True when there is nothing usable in the content.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Json(value) => match value {
                Value::Null => true,
                Value::String(s) => s.trim().is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                Value::Bool(_) | Value::Number(_) => false,
            },
        }
    }

    /// Plain-text rendering, used for categorization and summaries.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
        }
    }
}

/// Result of a single strategy attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Content),
    Failure(String),
}

impl Outcome {
    /// Wrap content as a success; empty content is a failure.
    pub fn success(content: Content) -> Self {
        if content.is_empty() {
            Self::Failure("empty content".to_string())
        } else {
            Self::Success(content)
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn content(&self) -> Option<&Content> {
        match self {
            Self::Success(content) => Some(content),
            Self::Failure(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(reason) => Some(reason),
        }
    }

    pub fn into_content(self) -> Option<Content> {
        match self {
            Self::Success(content) => Some(content),
            Self::Failure(_) => None,
        }
    }
}

/// One completed (url, method) execution attempt.
///
/// Written for failures as well as successes so memory keeps negative
/// evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeRecord {
    pub url: String,
    pub method: Method,
    pub success: bool,
    pub elapsed_time: f64,
    pub friction: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl OutcomeRecord {
    /// Build a record with the method's baseline friction.
    pub fn new(url: &str, method: Method, success: bool, elapsed_time: f64) -> Self {
        Self {
            url: normalize_url(url),
            method,
            success,
            elapsed_time,
            friction: method.baseline_friction(success),
            category: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }
}

/// Which policy step produced a method decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MethodSource {
    /// Exact URL previously succeeded.
    Memory,
    /// Domain already associated with a category that has history.
    Category,
    /// Category inferred by the categorizer.
    Classifier,
    /// Static flags from the run configuration.
    Heuristic,
}

impl MethodSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Category => "category",
            Self::Classifier => "classifier",
            Self::Heuristic => "heuristic",
        }
    }
}

impl Display for MethodSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A policy decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct Decision {
    pub method: Method,
    pub source: MethodSource,
}

impl Decision {
    pub fn new(method: Method, source: MethodSource) -> Self {
        Self { method, source }
    }

    /// Stored history decided the method without calling the categorizer.
    pub fn is_memory_hit(&self) -> bool {
        matches!(self.source, MethodSource::Memory | MethodSource::Category)
    }
}

/// Per-URL options recognised by the engine. Every field defaults safely.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub expect_form: bool,
    pub prefer_speed: bool,
    pub fill_forms: bool,
    /// Ground-truth category, only used for reporting.
    pub true_category: Option<String>,
    /// Set by the orchestrator; informational.
    pub memory_hit: bool,
    /// Set by the orchestrator; informational.
    pub method_source: Option<MethodSource>,
}

impl RunConfig {
    /// Derive flags from the URL text: form pages want a browser, captcha
    /// pages should not be rushed.
    pub fn infer_from_url(url: &str) -> Self {
        let lowered = url.to_lowercase();
        Self {
            expect_form: lowered.contains("form"),
            prefer_speed: !lowered.contains("captcha"),
            fill_forms: true,
            ..Self::default()
        }
    }

    pub fn with_expect_form(mut self, expect_form: bool) -> Self {
        self.expect_form = expect_form;
        self
    }

    pub fn with_prefer_speed(mut self, prefer_speed: bool) -> Self {
        self.prefer_speed = prefer_speed;
        self
    }

    pub fn with_fill_forms(mut self, fill_forms: bool) -> Self {
        self.fill_forms = fill_forms;
        self
    }

    pub fn with_true_category(mut self, category: impl Into<String>) -> Self {
        self.true_category = Some(category.into());
        self
    }
}

/// Compact view of one attempt in a fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptSummary {
    pub method: Method,
    pub success: bool,
    pub elapsed_time: f64,
    pub friction: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the caller gets back for one URL. Never an error.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub data: Option<Content>,
    pub friction: f64,
    /// Seconds spent in the final attempt.
    pub time: f64,
    pub final_method: Method,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub attempts: Vec<AttemptSummary>,
    pub memory_hit: bool,
    pub method_source: Option<MethodSource>,
}

impl ExecutionResult {
    /// Wall-clock seconds across every attempt in the chain.
    pub fn total_time(&self) -> f64 {
        self.attempts.iter().map(|a| a.elapsed_time).sum()
    }

    pub fn attempted_methods(&self) -> Vec<Method> {
        self.attempts.iter().map(|a| a.method).collect()
    }
}

/// Errors that can occur in the engine.
#[derive(thiserror::Error, Debug)]
pub enum AxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Strategy error: {0}")]
    Strategy(String),
}

/// Convenience result type.
pub type AxResult<T> = Result<T, AxError>;
