//! Cumulative per-method statistics and method ranking.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Method;

/// Method returned when there is no evidence at all.
pub const DEFAULT_METHOD: Method = Method::Api;

/// Cumulative counters for one (key, method) pair. Only ever grows.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MethodStats {
    pub count: u64,
    pub success_count: u64,
    pub total_time: f64,
    pub total_friction: f64,
}

impl MethodStats {
    pub fn record(&mut self, success: bool, elapsed_time: f64, friction: f64) {
        self.count += 1;
        if success {
            self.success_count += 1;
        }
        self.total_time += elapsed_time.max(0.0);
        self.total_friction += friction;
    }

    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.count as f64
    }

    pub fn avg_friction(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total_friction / self.count as f64
    }

    pub fn avg_time(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total_time / self.count as f64
    }

    pub fn score(&self) -> MethodScore {
        MethodScore {
            success_rate: self.success_rate(),
            friction: self.avg_friction(),
        }
    }
}

/// The two numbers ranking looks at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MethodScore {
    pub success_rate: f64,
    pub friction: f64,
}

/// Table used for any category without recorded outcomes.
pub fn default_scores() -> BTreeMap<Method, MethodScore> {
    Method::ALL
        .into_iter()
        .map(|method| {
            let friction = match method {
                Method::Api => 1.0,
                Method::Dom => 1.5,
                Method::Browser => 2.0,
            };
            (
                method,
                MethodScore {
                    success_rate: 0.0,
                    friction,
                },
            )
        })
        .collect()
}

/// Order methods by success rate (desc), then friction (asc), then the
/// fixed method order so the result is always total.
pub fn rank_methods(scores: &BTreeMap<Method, MethodScore>) -> Vec<Method> {
    let mut ranked: Vec<(Method, MethodScore)> = scores.iter().map(|(m, s)| (*m, *s)).collect();
    ranked.sort_by(|(method_a, a), (method_b, b)| {
        b.success_rate
            .partial_cmp(&a.success_rate)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.friction.partial_cmp(&b.friction).unwrap_or(Ordering::Equal))
            .then_with(|| method_a.cmp(method_b))
    });
    ranked.into_iter().map(|(method, _)| method).collect()
}
