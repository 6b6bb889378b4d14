//! Runs a method against a URL, records the outcome, and walks the
//! fallback chain until something works or every method has been tried.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::classify::{normalize_category, Categorizer, Summarizer, DEFAULT_CATEGORY};
use crate::experience::ExperienceLog;
use crate::memory::SharedMemory;
use crate::policy::PolicyEngine;
use crate::strategy::StrategyRegistry;
use crate::types::{
    AttemptSummary, Content, ExecutionResult, Method, Outcome, OutcomeRecord, RunConfig,
};

/// Executes strategies and feeds their outcomes back into memory.
pub struct TaskExecutor {
    registry: StrategyRegistry,
    memory: SharedMemory,
    policy: Arc<PolicyEngine>,
    categorizer: Option<Arc<dyn Categorizer>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    experience: Option<Arc<Mutex<ExperienceLog>>>,
}

/// A finished attempt before it is folded into the caller's result.
struct Attempt {
    record: OutcomeRecord,
    outcome: Outcome,
    summary: Option<String>,
}

impl Attempt {
    fn summary_row(&self) -> AttemptSummary {
        AttemptSummary {
            method: self.record.method,
            success: self.record.success,
            elapsed_time: self.record.elapsed_time,
            friction: self.record.friction,
            error: self.outcome.reason().map(String::from),
        }
    }

    fn into_result(self, attempts: Vec<AttemptSummary>, config: &RunConfig) -> ExecutionResult {
        ExecutionResult {
            success: self.record.success,
            data: self.outcome.into_content(),
            friction: self.record.friction,
            time: self.record.elapsed_time,
            final_method: self.record.method,
            category: self.record.category,
            summary: self.summary,
            attempts,
            memory_hit: config.memory_hit,
            method_source: config.method_source,
        }
    }
}

impl TaskExecutor {
    pub fn new(registry: StrategyRegistry, memory: SharedMemory, policy: Arc<PolicyEngine>) -> Self {
        Self {
            registry,
            memory,
            policy,
            categorizer: None,
            summarizer: None,
            experience: None,
        }
    }

    pub fn with_categorizer(mut self, categorizer: Arc<dyn Categorizer>) -> Self {
        self.categorizer = Some(categorizer);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_experience_log(mut self, log: ExperienceLog) -> Self {
        self.experience = Some(Arc::new(Mutex::new(log)));
        self
    }

    /// Run `method`, falling back through untried methods on failure.
    pub async fn run(&self, method: Method, url: &str, config: &RunConfig) -> ExecutionResult {
        self.run_with_tried(method, url, config, BTreeSet::new()).await
    }

    /// Like [`TaskExecutor::run`] with methods already ruled out.
    ///
    /// `method` itself is always attempted. Each method runs at most once,
    /// so the chain is at most three attempts long.
    pub async fn run_with_tried(
        &self,
        method: Method,
        url: &str,
        config: &RunConfig,
        mut tried: BTreeSet<Method>,
    ) -> ExecutionResult {
        let mut method = method;
        let mut attempts = Vec::new();

        loop {
            tried.insert(method);
            let attempt = self.attempt(method, url, config).await;
            attempts.push(attempt.summary_row());

            if attempt.record.success {
                tracing::info!(
                    "{} succeeded on {url} in {:.2}s (friction {})",
                    method,
                    attempt.record.elapsed_time,
                    attempt.record.friction
                );
                return attempt.into_result(attempts, config);
            }

            let fallbacks = self
                .policy
                .rank_fallbacks(url, attempt.record.category.as_deref(), &tried)
                .await;

            match fallbacks.first() {
                Some(&next) => {
                    tracing::info!("{method} failed on {url}; falling back to {next}");
                    method = next;
                }
                None => {
                    tracing::warn!("All methods exhausted for {url}; last tried {method}");
                    return attempt.into_result(attempts, config);
                }
            }
        }
    }

    /// One attempt: dispatch, time, classify, record.
    async fn attempt(&self, method: Method, url: &str, config: &RunConfig) -> Attempt {
        tracing::debug!("Attempting {method} on {url} (fill_forms: {})", config.fill_forms);

        let started = Instant::now();
        let outcome = match self.registry.dispatch(method, url, config).await {
            Ok(Outcome::Success(content)) => Outcome::success(content),
            Ok(failure) => failure,
            Err(e) => {
                tracing::warn!("Method {method} failed on {url}: {e:#}");
                Outcome::failure(e.to_string())
            }
        };
        let elapsed = started.elapsed().as_secs_f64();

        let (category, summary) = match outcome.content() {
            Some(content) => (self.categorize(content).await, self.summarize(content).await),
            None => (None, None),
        };

        let record =
            OutcomeRecord::new(url, method, outcome.is_success(), elapsed).with_category(category);
        self.record(&record).await;

        Attempt {
            record,
            outcome,
            summary,
        }
    }

    async fn categorize(&self, content: &Content) -> Option<String> {
        let categorizer = self.categorizer.as_ref()?;
        match categorizer.categorize(&content.as_text()).await {
            Ok(label) => Some(normalize_category(&label)),
            Err(e) => {
                tracing::warn!("Categorization failed, using {DEFAULT_CATEGORY}: {e}");
                Some(DEFAULT_CATEGORY.to_string())
            }
        }
    }

    async fn summarize(&self, content: &Content) -> Option<String> {
        let summarizer = self.summarizer.as_ref()?;
        match summarizer.summarize(&content.as_text()).await {
            Ok(summary) => {
                tracing::debug!("Summary: {summary}");
                Some(summary)
            }
            Err(e) => {
                tracing::warn!("Summarization failed: {e}");
                None
            }
        }
    }

    /// Write the record to memory and the experience log. Failures here are
    /// warnings; the in-memory state stays updated.
    async fn record(&self, record: &OutcomeRecord) {
        if let Err(e) = self.memory.lock().await.log(record) {
            tracing::warn!("Failed to persist outcome for {}: {e}", record.url);
        }

        if let Some(experience) = &self.experience {
            if let Err(e) = experience.lock().await.log(record) {
                tracing::warn!("Failed to append experience log: {e}");
            }
        }
    }
}
