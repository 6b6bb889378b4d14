//! The end-to-end pipeline: decide, execute with fallback, learn.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::classify::{Categorizer, Summarizer};
use crate::config::DEFAULT_STRATEGY_TIMEOUT;
use crate::executor::TaskExecutor;
use crate::experience::ExperienceLog;
use crate::memory::{MemoryStore, SharedMemory};
use crate::policy::PolicyEngine;
use crate::report::{ReportRow, RunReport};
use crate::strategy::StrategyRegistry;
use crate::types::{AxResult, ExecutionResult, RunConfig};

/// Process-wide knobs.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Upper bound on a single strategy attempt. `None` disables it.
    pub strategy_timeout: Option<Duration>,
    pub summarize: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            strategy_timeout: Some(DEFAULT_STRATEGY_TIMEOUT),
            summarize: true,
        }
    }
}

/// A URL to process together with its options.
#[derive(Debug, Clone)]
pub struct Target {
    pub url: String,
    pub config: RunConfig,
}

impl Target {
    pub fn new(url: impl Into<String>, config: RunConfig) -> Self {
        Self {
            url: url.into(),
            config,
        }
    }
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    memory: MemoryStore,
    registry: StrategyRegistry,
    categorizer: Option<Arc<dyn Categorizer>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    experience: Option<ExperienceLog>,
    settings: AgentSettings,
}

impl AgentBuilder {
    pub fn new(memory: MemoryStore) -> Self {
        Self {
            memory,
            registry: StrategyRegistry::new(),
            categorizer: None,
            summarizer: None,
            experience: None,
            settings: AgentSettings::default(),
        }
    }

    pub fn registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn categorizer(mut self, categorizer: Arc<dyn Categorizer>) -> Self {
        self.categorizer = Some(categorizer);
        self
    }

    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Append every attempt to a JSONL log at `path`.
    pub fn experience_log(mut self, path: &Path) -> AxResult<Self> {
        self.experience = Some(ExperienceLog::open(path)?);
        Ok(self)
    }

    pub fn settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Agent {
        let memory = self.memory.into_shared();

        let mut policy = PolicyEngine::new(memory.clone());
        if let Some(categorizer) = &self.categorizer {
            policy = policy.with_categorizer(categorizer.clone());
        }
        let policy = Arc::new(policy);

        let registry = match self.settings.strategy_timeout {
            Some(timeout) => self.registry.with_timeout(timeout),
            None => self.registry,
        };

        let mut executor = TaskExecutor::new(registry, memory.clone(), policy.clone());
        if let Some(categorizer) = self.categorizer {
            executor = executor.with_categorizer(categorizer);
        }
        if self.settings.summarize {
            if let Some(summarizer) = self.summarizer {
                executor = executor.with_summarizer(summarizer);
            }
        }
        if let Some(log) = self.experience {
            executor = executor.with_experience_log(log);
        }

        Agent {
            memory,
            policy,
            executor,
        }
    }
}

/// Decides, executes, and remembers. URLs are processed one at a time.
pub struct Agent {
    memory: SharedMemory,
    policy: Arc<PolicyEngine>,
    executor: TaskExecutor,
}

impl Agent {
    pub fn builder(memory: MemoryStore) -> AgentBuilder {
        AgentBuilder::new(memory)
    }

    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    /// Process one URL. Always returns a result; failures are in it.
    pub async fn process(&self, url: &str, config: &RunConfig) -> ExecutionResult {
        let decision = self.policy.decide_with_source(url, config).await;
        tracing::info!(
            "Processing {url} with {} (source: {})",
            decision.method,
            decision.source
        );

        let mut config = config.clone();
        config.memory_hit = decision.is_memory_hit();
        config.method_source = Some(decision.source);

        self.executor.run(decision.method, url, &config).await
    }

    /// Process every target in order and collect a report.
    pub async fn process_all(&self, targets: &[Target]) -> RunReport {
        let mut report = RunReport::new();
        for target in targets {
            let result = self.process(&target.url, &target.config).await;
            if !result.success {
                tracing::warn!("No method succeeded for {}", target.url);
            }
            report.push(ReportRow::new(&target.url, &target.config, &result));
        }
        report
    }
}
