use serde::{Deserialize, Serialize};

/// One container's usage as reported by a cluster source, before normalization.
///
/// Every field is optional because metrics-server payloads (and hand-written
/// demo files) routinely omit them. The aggregator decides what a missing
/// field means.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContainerUsage {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub pod: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
}

impl ContainerUsage {
    pub fn new(namespace: &str, pod: &str, cpu: &str, memory: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            pod: Some(pod.to_string()),
            container: None,
            cpu: Some(cpu.to_string()),
            memory: Some(memory.to_string()),
        }
    }
}

/// Summed usage for a namespace, or for one pod when `pod` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageSample {
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,
    pub cpu_mcores: f64,
    pub memory_bytes: f64,
}

impl UsageSample {
    pub fn namespace(namespace: impl Into<String>, cpu_mcores: f64, memory_bytes: f64) -> Self {
        Self {
            namespace: namespace.into(),
            pod: None,
            cpu_mcores,
            memory_bytes,
        }
    }

    pub fn pod(
        namespace: impl Into<String>,
        pod: impl Into<String>,
        cpu_mcores: f64,
        memory_bytes: f64,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod: Some(pod.into()),
            cpu_mcores,
            memory_bytes,
        }
    }
}
