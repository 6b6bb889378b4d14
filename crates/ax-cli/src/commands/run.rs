//! `ax run`: process URLs and print a report.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::json;

use ax_engine::{
    Agent, AgentSettings, ExecutionResult, KeywordCategorizer, LeadSummarizer, MemoryStore,
    ReportRow, RunReport, Target,
};

use super::{percent, Paths};
use crate::strategies::default_registry;

pub struct RunOptions {
    pub targets: Vec<Target>,
    pub summarize: bool,
    pub strategy_timeout: Duration,
    pub http_timeout: Duration,
    pub json: bool,
}

pub async fn run(paths: &Paths, options: RunOptions, out: &mut impl Write) -> Result<RunReport> {
    if options.targets.is_empty() {
        bail!("no URLs given; pass URLs or --file");
    }

    let (registry, browser) = default_registry(options.http_timeout);
    let mut builder = Agent::builder(MemoryStore::open(&paths.memory))
        .registry(registry)
        .categorizer(Arc::new(KeywordCategorizer::new()))
        .summarizer(Arc::new(LeadSummarizer::default()))
        .settings(AgentSettings {
            strategy_timeout: Some(options.strategy_timeout),
            summarize: options.summarize,
        });
    if let Some(log_path) = &paths.experience_log {
        builder = builder
            .experience_log(log_path)
            .with_context(|| format!("failed to open experience log {}", log_path.display()))?;
    }
    let agent = builder.build();

    let report = run_targets(&agent, &options.targets, options.json, out).await;
    browser.shutdown().await;
    report
}

/// Process targets one at a time, printing as results arrive.
pub async fn run_targets(
    agent: &Agent,
    targets: &[Target],
    json: bool,
    out: &mut impl Write,
) -> Result<RunReport> {
    let mut report = RunReport::new();
    let mut results = Vec::new();

    for target in targets {
        let result = agent.process(&target.url, &target.config).await;
        if json {
            results.push(json!({ "url": target.url, "result": result }));
        } else {
            write_result_line(out, &target.url, &result)?;
        }
        report.push(ReportRow::new(&target.url, &target.config, &result));
    }

    if json {
        let document = json!({ "results": results, "summary": report.summary() });
        writeln!(out, "{}", serde_json::to_string_pretty(&document)?)?;
    } else {
        write_summary(out, &report)?;
    }
    Ok(report)
}

fn write_result_line(out: &mut impl Write, url: &str, result: &ExecutionResult) -> Result<()> {
    let status = if result.success { "ok" } else { "FAIL" };
    let source = result
        .method_source
        .map(|s| s.as_str())
        .unwrap_or("-");
    writeln!(
        out,
        "{status:<4} {:<7} {url}  time={:.2}s friction={:.1} source={source} category={}",
        result.final_method.as_str(),
        result.time,
        result.friction,
        result.category.as_deref().unwrap_or("-"),
    )?;
    if let Some(summary) = &result.summary {
        writeln!(out, "     {summary}")?;
    }
    Ok(())
}

fn write_summary(out: &mut impl Write, report: &RunReport) -> Result<()> {
    let summary = report.summary();
    writeln!(out)?;
    writeln!(
        out,
        "Processed {} URLs: {} succeeded ({})",
        summary.total,
        summary.succeeded,
        percent(summary.success_rate)
    )?;
    writeln!(out, "  Memory hits:      {}", percent(summary.memory_hit_rate))?;
    writeln!(out, "  Average time:     {:.2}s", summary.average_time)?;
    writeln!(out, "  Average friction: {:.2}", summary.average_friction)?;
    if let Some(accuracy) = summary.category_accuracy {
        writeln!(out, "  Category accuracy: {}", percent(accuracy))?;
    }
    let usage: Vec<String> = summary
        .method_usage
        .iter()
        .map(|(method, n)| format!("{method}={n}"))
        .collect();
    writeln!(out, "  Method usage:     {}", usage.join(" "))?;
    Ok(())
}
