use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::usage::{ContainerUsage, UsageSample};
use crate::quantity::{normalize_cpu, normalize_memory};

pub const DEFAULT_NAMESPACE: &str = "default";
pub const UNKNOWN_POD: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedContainer {
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
    pub reason: String,
}

/// Result of grouping container usage. Containers that could not be
/// normalized are listed in `skipped` and contribute nothing to `samples`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Aggregation {
    pub samples: Vec<UsageSample>,
    pub skipped: Vec<SkippedContainer>,
}

impl Aggregation {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

pub fn aggregate_by_namespace(containers: &[ContainerUsage]) -> Aggregation {
    aggregate(containers, false)
}

pub fn aggregate_by_pod(containers: &[ContainerUsage]) -> Aggregation {
    aggregate(containers, true)
}

fn aggregate(containers: &[ContainerUsage], per_pod: bool) -> Aggregation {
    let mut out = Aggregation::default();
    let mut index: HashMap<(String, Option<String>), usize> = HashMap::new();

    for c in containers {
        let namespace = c.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
        let pod = c.pod.as_deref().unwrap_or(UNKNOWN_POD);

        let (cpu, memory) = match normalize_container(c) {
            Ok(v) => v,
            Err(reason) => {
                warn!(namespace, pod, container = ?c.container, %reason, "skipping container usage");
                out.skipped.push(SkippedContainer {
                    namespace: namespace.to_string(),
                    pod: pod.to_string(),
                    container: c.container.clone(),
                    reason,
                });
                continue;
            }
        };

        let key = (namespace.to_string(), per_pod.then(|| pod.to_string()));
        let slot = *index.entry(key).or_insert_with_key(|(ns, pod)| {
            out.samples.push(UsageSample {
                namespace: ns.clone(),
                pod: pod.clone(),
                cpu_mcores: 0.0,
                memory_bytes: 0.0,
            });
            out.samples.len() - 1
        });
        out.samples[slot].cpu_mcores += cpu;
        out.samples[slot].memory_bytes += memory;
    }

    out
}

/// A missing field is a skip, not a zero: metrics-server omits usage for
/// containers it has not scraped yet.
fn normalize_container(c: &ContainerUsage) -> std::result::Result<(f64, f64), String> {
    let cpu = c.cpu.as_deref().ok_or_else(|| "missing cpu usage".to_string())?;
    let memory = c
        .memory
        .as_deref()
        .ok_or_else(|| "missing memory usage".to_string())?;
    let cpu = normalize_cpu(cpu).map_err(|e| e.to_string())?;
    let memory = normalize_memory(memory).map_err(|e| e.to_string())?;
    Ok((cpu, memory))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn containers() -> Vec<ContainerUsage> {
        vec![
            ContainerUsage::new("payments", "api-1", "250m", "256Mi"),
            ContainerUsage::new("web", "nginx-1", "100m", "128Mi"),
            ContainerUsage::new("payments", "api-1", "0.5", "512Mi"),
            ContainerUsage::new("payments", "worker-1", "1500000n", "1Gi"),
        ]
    }

    #[test]
    fn groups_by_namespace_in_first_seen_order() {
        let agg = aggregate_by_namespace(&containers());
        assert!(agg.skipped.is_empty());
        let names = agg.samples.iter().map(|s| s.namespace.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["payments", "web"]);

        let payments = &agg.samples[0];
        assert_eq!(payments.pod, None);
        assert_eq!(payments.cpu_mcores, 250.0 + 500.0 + 1.5);
        assert_eq!(payments.memory_bytes, (256.0 + 512.0 + 1024.0) * 1048576.0);
    }

    #[test]
    fn groups_by_namespace_and_pod() {
        let agg = aggregate_by_pod(&containers());
        let keys = agg
            .samples
            .iter()
            .map(|s| (s.namespace.as_str(), s.pod.as_deref().unwrap()))
            .collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![("payments", "api-1"), ("web", "nginx-1"), ("payments", "worker-1")]
        );
        assert_eq!(agg.samples[0].cpu_mcores, 750.0);
    }

    #[test]
    fn missing_namespace_defaults() {
        let agg = aggregate_by_pod(&[ContainerUsage {
            cpu: Some("10m".into()),
            memory: Some("1Ki".into()),
            ..ContainerUsage::default()
        }]);
        assert_eq!(agg.samples[0].namespace, DEFAULT_NAMESPACE);
        assert_eq!(agg.samples[0].pod.as_deref(), Some(UNKNOWN_POD));
    }

    #[test]
    fn malformed_and_missing_usage_is_skipped_and_counted() {
        let mut input = containers();
        input.push(ContainerUsage::new("web", "nginx-2", "lots", "128Mi"));
        input.push(ContainerUsage {
            namespace: Some("web".into()),
            pod: Some("nginx-3".into()),
            container: Some("sidecar".into()),
            cpu: Some("5m".into()),
            memory: None,
        });
        input.push(ContainerUsage::new("batch", "job-1", "10m", "12XB"));

        let agg = aggregate_by_namespace(&input);
        assert_eq!(agg.skipped_count(), 3);
        assert_eq!(agg.skipped[1].container.as_deref(), Some("sidecar"));
        assert!(agg.skipped[1].reason.contains("missing memory"));

        let web = agg.samples.iter().find(|s| s.namespace == "web").unwrap();
        assert_eq!(web.cpu_mcores, 100.0);
        // every container in "batch" was skipped, so no row is synthesized
        assert!(agg.samples.iter().all(|s| s.namespace != "batch"));
    }

    #[test]
    fn sums_do_not_depend_on_input_order() {
        let forward = containers();
        let mut reversed = containers();
        reversed.reverse();

        let a = aggregate_by_namespace(&forward);
        let b = aggregate_by_namespace(&reversed);
        for sample in &a.samples {
            let other = b.samples.iter().find(|s| s.namespace == sample.namespace).unwrap();
            let rel = |x: f64, y: f64| (x - y).abs() <= 1e-6 * x.abs().max(y.abs()).max(1.0);
            assert!(rel(sample.cpu_mcores, other.cpu_mcores));
            assert!(rel(sample.memory_bytes, other.memory_bytes));
        }
    }

    #[test]
    fn empty_input_yields_no_samples() {
        let agg = aggregate_by_namespace(&[]);
        assert!(agg.samples.is_empty());
        assert_eq!(agg.skipped_count(), 0);
    }
}
