//! AX engine: picks an extraction method per URL from remembered outcomes,
//! falls back through the others on failure, and learns from every attempt.

pub mod agent;
pub mod classify;
pub mod config;
pub mod executor;
pub mod experience;
pub mod memory;
pub mod policy;
pub mod report;
pub mod stats;
pub mod storage;
pub mod strategy;
pub mod types;
pub mod urls;

pub use agent::{Agent, AgentBuilder, AgentSettings, Target};
pub use classify::{
    normalize_category, Categorizer, KeywordCategorizer, LeadSummarizer, Summarizer, CATEGORIES,
    DEFAULT_CATEGORY,
};
pub use config::{resolve_experience_log_path, resolve_memory_path};
pub use executor::TaskExecutor;
pub use experience::ExperienceLog;
pub use memory::{MemoryStore, MemorySummary, SharedMemory};
pub use policy::{heuristic_method, PolicyEngine};
pub use report::{ReportRow, ReportSummary, RunReport};
pub use stats::{rank_methods, MethodScore, MethodStats, DEFAULT_METHOD};
pub use storage::{MemoryReader, MemoryWriter};
pub use strategy::{Strategy, StrategyRegistry};
pub use types::*;
pub use urls::{domain_of, normalize_url};
