use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordFamily {
    Namespace,
    Pod,
}

impl RecordFamily {
    pub fn table(self) -> &'static str {
        match self {
            Self::Namespace => "namespace_metrics",
            Self::Pod => "pod_metrics",
        }
    }
}

/// A persisted cost snapshot row. `pod` is only set for the pod family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,
    pub cpu_mcores: f64,
    pub memory_bytes: f64,
    pub hourly_cost: f64,
    pub monthly_cost: f64,
}
