//! Right-sizing and idle-namespace detection from a live cost snapshot.
//!
//! Request data is rarely available from metrics-server alone, so when it is
//! missing a namespace is assumed to request twice what it uses. Savings are
//! priced with the same rates the cost model uses.

use std::cmp::Ordering;

use costkube_core::cost::HOURS_PER_MONTH;
use costkube_core::model::cost::{CostedSample, PricingConfig};
use costkube_core::quantity::{format_cpu, format_memory};
use serde::{Deserialize, Serialize};
use tracing::debug;

const BYTES_PER_GIB: f64 = 1_073_741_824.0;
const MIN_CPU_MCORES: f64 = 100.0;
const MIN_MEMORY_BYTES: f64 = 128.0 * 1_048_576.0;
const IDLE_CPU_MCORES: f64 = 50.0;
const IDLE_MEMORY_BYTES: f64 = 50.0 * 1_048_576.0;
const IDLE_SAVINGS_SHARE: f64 = 0.95;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Thresholds {
    pub cpu_low: f64,
    pub cpu_high: f64,
    pub memory_low: f64,
    pub memory_high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_low: 0.2,
            cpu_high: 0.8,
            memory_low: 0.3,
            memory_high: 0.85,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RequestedResources {
    pub cpu_mcores: f64,
    pub memory_bytes: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationKind {
    CpuOverprovisioned,
    CpuUnderprovisioned,
    MemoryOverprovisioned,
    MemoryUnderprovisioned,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub severity: Severity,
    pub current_usage: f64,
    pub requested: f64,
    pub recommended: f64,
    /// Percent of the request in use.
    pub utilization: f64,
    pub savings: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamespaceAnalysis {
    pub namespace: String,
    pub recommendations: Vec<Recommendation>,
    pub potential_monthly_savings: f64,
    pub high_severity_count: usize,
    pub medium_severity_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdleResource {
    pub namespace: String,
    pub severity: Severity,
    pub cpu_mcores: f64,
    pub memory_bytes: f64,
    pub monthly_cost: f64,
    pub potential_savings: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSummary {
    pub total_namespaces_analyzed: usize,
    pub namespaces_with_recommendations: usize,
    pub idle_resources: Vec<IdleResource>,
    pub right_sizing_recommendations: Vec<NamespaceAnalysis>,
    pub total_potential_monthly_savings: f64,
    pub high_priority_count: usize,
    pub medium_priority_count: usize,
}

#[derive(Debug, Clone)]
pub struct Recommender {
    pricing: PricingConfig,
    thresholds: Thresholds,
}

impl Recommender {
    pub fn new(pricing: PricingConfig) -> Self {
        Self {
            pricing,
            thresholds: Thresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn analyze_namespace(
        &self,
        sample: &CostedSample,
        requested: Option<RequestedResources>,
    ) -> NamespaceAnalysis {
        let usage = &sample.usage;
        let requested = requested.unwrap_or(RequestedResources {
            cpu_mcores: usage.cpu_mcores * 2.0,
            memory_bytes: usage.memory_bytes * 2.0,
        });

        let mut recommendations = Vec::new();
        recommendations.extend(self.check_cpu(usage.cpu_mcores, requested.cpu_mcores));
        recommendations.extend(self.check_memory(usage.memory_bytes, requested.memory_bytes));

        let potential_monthly_savings = recommendations.iter().map(|r| r.savings).sum();
        let high_severity_count = recommendations
            .iter()
            .filter(|r| r.severity == Severity::High)
            .count();
        NamespaceAnalysis {
            namespace: sample.namespace().to_string(),
            medium_severity_count: recommendations.len() - high_severity_count,
            high_severity_count,
            potential_monthly_savings,
            recommendations,
        }
    }

    fn check_cpu(&self, used: f64, requested: f64) -> Option<Recommendation> {
        let utilization = used / requested.max(1.0);
        if utilization < self.thresholds.cpu_low {
            let recommended = (used * 1.3).max(MIN_CPU_MCORES);
            let savings = ((requested - recommended) / 1000.0
                * self.pricing.cpu_per_core_hour
                * HOURS_PER_MONTH)
                .max(0.0);
            Some(Recommendation {
                kind: RecommendationKind::CpuOverprovisioned,
                severity: Severity::Medium,
                current_usage: used,
                requested,
                recommended,
                utilization: utilization * 100.0,
                savings,
                message: format!(
                    "CPU usage is only {:.1}% of request. Consider reducing the CPU request from {} to {}.",
                    utilization * 100.0,
                    format_cpu(requested),
                    format_cpu(recommended)
                ),
            })
        } else if utilization > self.thresholds.cpu_high {
            let recommended = used * 1.5;
            Some(Recommendation {
                kind: RecommendationKind::CpuUnderprovisioned,
                severity: Severity::High,
                current_usage: used,
                requested,
                recommended,
                utilization: utilization * 100.0,
                savings: 0.0,
                message: format!(
                    "CPU usage is {:.1}% of request and risks throttling. Consider raising the CPU request from {} to {}.",
                    utilization * 100.0,
                    format_cpu(requested),
                    format_cpu(recommended)
                ),
            })
        } else {
            None
        }
    }

    fn check_memory(&self, used: f64, requested: f64) -> Option<Recommendation> {
        let utilization = used / requested.max(1.0);
        if utilization < self.thresholds.memory_low {
            let recommended = (used * 1.3).max(MIN_MEMORY_BYTES);
            let savings = ((requested - recommended) / BYTES_PER_GIB
                * self.pricing.mem_per_gb_hour
                * HOURS_PER_MONTH)
                .max(0.0);
            Some(Recommendation {
                kind: RecommendationKind::MemoryOverprovisioned,
                severity: Severity::Medium,
                current_usage: used,
                requested,
                recommended,
                utilization: utilization * 100.0,
                savings,
                message: format!(
                    "Memory usage is only {:.1}% of request. Consider reducing the memory request from {} to {}.",
                    utilization * 100.0,
                    format_memory(requested),
                    format_memory(recommended)
                ),
            })
        } else if utilization > self.thresholds.memory_high {
            let recommended = used * 1.3;
            Some(Recommendation {
                kind: RecommendationKind::MemoryUnderprovisioned,
                severity: Severity::High,
                current_usage: used,
                requested,
                recommended,
                utilization: utilization * 100.0,
                savings: 0.0,
                message: format!(
                    "Memory usage is {:.1}% of request and risks OOM kills. Consider raising the memory request from {} to {}.",
                    utilization * 100.0,
                    format_memory(requested),
                    format_memory(recommended)
                ),
            })
        } else {
            None
        }
    }

    /// A namespace using under 50m CPU and 50Mi memory is treated as idle.
    pub fn detect_idle(&self, sample: &CostedSample) -> Option<IdleResource> {
        let usage = &sample.usage;
        if usage.cpu_mcores >= IDLE_CPU_MCORES || usage.memory_bytes >= IDLE_MEMORY_BYTES {
            return None;
        }
        Some(IdleResource {
            namespace: sample.namespace().to_string(),
            severity: Severity::High,
            cpu_mcores: usage.cpu_mcores,
            memory_bytes: usage.memory_bytes,
            monthly_cost: sample.monthly_cost,
            potential_savings: sample.monthly_cost * IDLE_SAVINGS_SHARE,
            message: format!(
                "Namespace appears idle (CPU {}, memory {}). Removing or consolidating it would save {:.2} {}/month.",
                format_cpu(usage.cpu_mcores),
                format_memory(usage.memory_bytes),
                sample.monthly_cost,
                self.pricing.currency
            ),
        })
    }

    pub fn detect_all_idle(&self, samples: &[CostedSample]) -> Vec<IdleResource> {
        samples.iter().filter_map(|s| self.detect_idle(s)).collect()
    }

    /// Idle checks and right-sizing for every namespace. Namespaces with
    /// recommendations are ordered by potential savings, largest first.
    pub fn analyze_all(&self, samples: &[CostedSample]) -> AnalysisSummary {
        let idle_resources = self.detect_all_idle(samples);
        let mut right_sizing = samples
            .iter()
            .map(|s| self.analyze_namespace(s, None))
            .filter(|a| !a.recommendations.is_empty())
            .collect::<Vec<_>>();
        sort_by_savings(&mut right_sizing);

        let total_potential_monthly_savings = idle_resources
            .iter()
            .map(|i| i.potential_savings)
            .sum::<f64>()
            + right_sizing
                .iter()
                .map(|a| a.potential_monthly_savings)
                .sum::<f64>();

        debug!(
            namespaces = samples.len(),
            idle = idle_resources.len(),
            right_sizing = right_sizing.len(),
            "analyzed namespace usage"
        );
        AnalysisSummary {
            total_namespaces_analyzed: samples.len(),
            namespaces_with_recommendations: right_sizing.len(),
            high_priority_count: right_sizing.iter().map(|a| a.high_severity_count).sum(),
            medium_priority_count: right_sizing.iter().map(|a| a.medium_severity_count).sum(),
            idle_resources,
            right_sizing_recommendations: right_sizing,
            total_potential_monthly_savings,
        }
    }
}

/// Largest savings first; equal savings keep their input order.
fn sort_by_savings(analyses: &mut [NamespaceAnalysis]) {
    analyses.sort_by(|a, b| {
        b.potential_monthly_savings
            .partial_cmp(&a.potential_monthly_savings)
            .unwrap_or(Ordering::Equal)
    });
}
