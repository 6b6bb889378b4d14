//! Method selection.
//!
//! Cheapest evidence first: exact URL history, then the domain's category
//! history, then a categorizer call, then static flags.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::classify::{normalize_category, Categorizer};
use crate::memory::SharedMemory;
use crate::stats::rank_methods;
use crate::types::{Decision, Method, MethodSource, RunConfig};
use crate::urls::domain_of;

/// Picks the method to try for a URL and ranks fallbacks.
pub struct PolicyEngine {
    memory: SharedMemory,
    categorizer: Option<Arc<dyn Categorizer>>,
}

impl PolicyEngine {
    pub fn new(memory: SharedMemory) -> Self {
        Self {
            memory,
            categorizer: None,
        }
    }

    pub fn with_categorizer(mut self, categorizer: Arc<dyn Categorizer>) -> Self {
        self.categorizer = Some(categorizer);
        self
    }

    /// The method to try first. Never fails.
    pub async fn decide(&self, url: &str, config: &RunConfig) -> Method {
        self.decide_with_source(url, config).await.method
    }

    /// Like [`PolicyEngine::decide`], also reporting which step decided.
    pub async fn decide_with_source(&self, url: &str, config: &RunConfig) -> Decision {
        let domain = domain_of(url);

        {
            let memory = self.memory.lock().await;

            if let Some(method) = memory.best_method_for_url(url) {
                tracing::info!("Reusing previously successful method {method} for {url}");
                return Decision::new(method, MethodSource::Memory);
            }

            if let Some(category) = memory.get_category_by_domain(&domain) {
                if let Some(method) = memory.best_observed_method_for_category(category) {
                    tracing::info!("Domain {domain} is {category}; using best method {method}");
                    return Decision::new(method, MethodSource::Category);
                }
                tracing::debug!("Category {category} has no history yet for {domain}");
                return heuristic_decision(config);
            }
        }

        if let Some(category) = self.classify_domain(&domain).await {
            let mut memory = self.memory.lock().await;
            if let Err(e) = memory.associate_domain(&domain, &category) {
                tracing::warn!("Failed to persist domain category for {domain}: {e}");
            }
            if let Some(method) = memory.best_observed_method_for_category(&category) {
                tracing::info!("Classified {domain} as {category}; using best method {method}");
                return Decision::new(method, MethodSource::Classifier);
            }
            tracing::debug!("Classified {domain} as {category}, no history for it yet");
        }

        heuristic_decision(config)
    }

    /// Untried methods in the order they should be attempted.
    ///
    /// Ranked by the category's stats when a category is given or the
    /// URL's domain has one; otherwise the fixed method order.
    pub async fn rank_fallbacks(
        &self,
        url: &str,
        category: Option<&str>,
        tried: &BTreeSet<Method>,
    ) -> Vec<Method> {
        let ranked = {
            let memory = self.memory.lock().await;
            let category = category
                .map(str::to_string)
                .or_else(|| memory.get_category_by_domain(url).map(str::to_string));
            match category {
                Some(category) => rank_methods(&memory.get_category_stats(&category)),
                None => Method::ALL.to_vec(),
            }
        };

        ranked
            .into_iter()
            .filter(|method| !tried.contains(method))
            .collect()
    }

    /// Ask the categorizer about a domain it has never seen.
    ///
    /// The domain is wrapped in minimal markup because that is all there is
    /// before anything has been fetched.
    async fn classify_domain(&self, domain: &str) -> Option<String> {
        let categorizer = self.categorizer.as_ref()?;
        if domain.is_empty() {
            return None;
        }

        let placeholder = format!("<html><body>{domain}</body></html>");
        match categorizer.categorize(&placeholder).await {
            Ok(label) => Some(normalize_category(&label)),
            Err(e) => {
                tracing::warn!("Categorizer failed for {domain}, using heuristics: {e}");
                None
            }
        }
    }
}

/// Static fallback when memory has nothing to say.
pub fn heuristic_method(config: &RunConfig) -> Method {
    if config.expect_form {
        Method::Browser
    } else if config.prefer_speed {
        Method::Api
    } else {
        Method::Dom
    }
}

fn heuristic_decision(config: &RunConfig) -> Decision {
    Decision::new(heuristic_method(config), MethodSource::Heuristic)
}
