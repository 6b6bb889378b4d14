//! Aggregate metrics over a batch of runs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{ExecutionResult, Method, MethodSource, RunConfig};
use crate::urls::normalize_url;

/// One processed URL.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub url: String,
    pub final_method: Method,
    pub success: bool,
    pub time: f64,
    pub friction: f64,
    pub memory_hit: bool,
    pub method_source: Option<MethodSource>,
    pub category: Option<String>,
    pub true_category: Option<String>,
    pub attempts: usize,
}

impl ReportRow {
    pub fn new(url: &str, config: &RunConfig, result: &ExecutionResult) -> Self {
        Self {
            url: normalize_url(url),
            final_method: result.final_method,
            success: result.success,
            time: result.time,
            friction: result.friction,
            memory_hit: result.memory_hit,
            method_source: result.method_source,
            category: result.category.clone(),
            true_category: config.true_category.clone(),
            attempts: result.attempts.len(),
        }
    }
}

/// Headline numbers for a batch.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportSummary {
    pub total: usize,
    pub succeeded: usize,
    pub success_rate: f64,
    pub memory_hit_rate: f64,
    pub average_time: f64,
    pub average_friction: f64,
    /// `None` when no row carries a true category.
    pub category_accuracy: Option<f64>,
    pub method_usage: BTreeMap<Method, usize>,
    pub method_latency: BTreeMap<Method, f64>,
}

/// Rows for every URL processed in a batch, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub rows: Vec<ReportRow>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ReportRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn success_rate(&self) -> f64 {
        self.fraction(|row| row.success)
    }

    pub fn memory_hit_rate(&self) -> f64 {
        self.fraction(|row| row.memory_hit)
    }

    pub fn average_time(&self) -> f64 {
        mean(self.rows.iter().map(|row| row.time))
    }

    pub fn average_friction(&self) -> f64 {
        mean(self.rows.iter().map(|row| row.friction))
    }

    /// How often each method was the final one.
    pub fn method_usage(&self) -> BTreeMap<Method, usize> {
        let mut usage = BTreeMap::new();
        for row in &self.rows {
            *usage.entry(row.final_method).or_insert(0) += 1;
        }
        usage
    }

    /// Mean final-attempt time per method.
    pub fn method_latency(&self) -> BTreeMap<Method, f64> {
        let mut totals: BTreeMap<Method, (f64, usize)> = BTreeMap::new();
        for row in &self.rows {
            let total = totals.entry(row.final_method).or_insert((0.0, 0));
            total.0 += row.time;
            total.1 += 1;
        }
        totals
            .into_iter()
            .map(|(method, (time, n))| (method, time / n as f64))
            .collect()
    }

    /// Share of rows with a true category whose predicted category matches.
    pub fn category_accuracy(&self) -> Option<f64> {
        let labelled: Vec<&ReportRow> = self
            .rows
            .iter()
            .filter(|row| row.true_category.is_some())
            .collect();
        if labelled.is_empty() {
            return None;
        }

        let correct = labelled
            .iter()
            .filter(|row| {
                match (&row.category, &row.true_category) {
                    (Some(predicted), Some(truth)) => {
                        predicted.trim().eq_ignore_ascii_case(truth.trim())
                    }
                    _ => false,
                }
            })
            .count();
        Some(correct as f64 / labelled.len() as f64)
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            total: self.rows.len(),
            succeeded: self.rows.iter().filter(|row| row.success).count(),
            success_rate: self.success_rate(),
            memory_hit_rate: self.memory_hit_rate(),
            average_time: self.average_time(),
            average_friction: self.average_friction(),
            category_accuracy: self.category_accuracy(),
            method_usage: self.method_usage(),
            method_latency: self.method_latency(),
        }
    }

    fn fraction(&self, predicate: impl Fn(&ReportRow) -> bool) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.rows.iter().filter(|&row| predicate(row)).count() as f64 / self.rows.len() as f64
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
