//! Strategy registration and dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{AxError, Method, Outcome, RunConfig};

/// One way of extracting content from a URL.
///
/// Expected failures should come back as [`Outcome::Failure`]. Returning an
/// error is still handled (it counts as a failed attempt) but gets logged
/// as a warning.
#[async_trait]
pub trait Strategy: Send + Sync {
    async fn attempt(&self, url: &str, config: &RunConfig) -> Result<Outcome>;
}

/// Maps each [`Method`] to the strategy that implements it.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<Method, Arc<dyn Strategy>>,
    timeout: Option<Duration>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every attempt; an elapsed attempt is a failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_strategy(mut self, method: Method, strategy: Arc<dyn Strategy>) -> Self {
        self.register(method, strategy);
        self
    }

    pub fn register(&mut self, method: Method, strategy: Arc<dyn Strategy>) {
        if self.strategies.insert(method, strategy).is_some() {
            tracing::debug!("Replaced strategy for {method}");
        }
    }

    pub fn get(&self, method: Method) -> Option<Arc<dyn Strategy>> {
        self.strategies.get(&method).cloned()
    }

    /// Registered methods in the fixed method order.
    pub fn methods(&self) -> Vec<Method> {
        Method::ALL
            .into_iter()
            .filter(|m| self.strategies.contains_key(m))
            .collect()
    }

    /// Run the strategy registered for `method`.
    ///
    /// # Errors
    /// Missing registrations, timeouts, and strategy errors.
    pub async fn dispatch(&self, method: Method, url: &str, config: &RunConfig) -> Result<Outcome> {
        let strategy = self
            .get(method)
            .ok_or_else(|| AxError::Strategy(format!("No strategy registered for {method}")))?;

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, strategy.attempt(url, config))
                .await
                .map_err(|_| {
                    AxError::Strategy(format!(
                        "{method} timed out after {:.1}s",
                        limit.as_secs_f64()
                    ))
                })?,
            None => strategy.attempt(url, config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Content;

    struct Fixed(Outcome);

    #[async_trait]
    impl Strategy for Fixed {
        async fn attempt(&self, _url: &str, _config: &RunConfig) -> Result<Outcome> {
            Ok(self.0.clone())
        }
    }

    struct Slow;

    #[async_trait]
    impl Strategy for Slow {
        async fn attempt(&self, _url: &str, _config: &RunConfig) -> Result<Outcome> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Outcome::success(Content::Text("late".into())))
        }
    }

    #[tokio::test]
    async fn test_dispatch_registered_strategy() {
        let registry = StrategyRegistry::new().with_strategy(
            Method::Dom,
            Arc::new(Fixed(Outcome::success(Content::Text("page".into())))),
        );
        let outcome = registry
            .dispatch(Method::Dom, "https://example.com", &RunConfig::default())
            .await
            .unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_dispatch_missing_strategy_is_error() {
        let registry = StrategyRegistry::new();
        let result = registry
            .dispatch(Method::Browser, "https://example.com", &RunConfig::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_timeout_elapses() {
        let registry = StrategyRegistry::new()
            .with_timeout(Duration::from_millis(20))
            .with_strategy(Method::Api, Arc::new(Slow));
        let err = registry
            .dispatch(Method::Api, "https://example.com", &RunConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_methods_in_fixed_order() {
        let registry = StrategyRegistry::new()
            .with_strategy(Method::Browser, Arc::new(Fixed(Outcome::failure("x"))))
            .with_strategy(Method::Api, Arc::new(Fixed(Outcome::failure("x"))));
        assert_eq!(registry.methods(), vec![Method::Api, Method::Browser]);
    }
}
