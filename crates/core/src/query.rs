use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hourly roll-up of namespace rows. The four vectors are parallel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CostTrends {
    pub timestamps: Vec<DateTime<Utc>>,
    pub costs: Vec<f64>,
    pub cpu: Vec<f64>,
    pub memory: Vec<f64>,
}

impl CostTrends {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.timestamps.iter().copied().zip(self.costs.iter().copied())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamespaceRanking {
    pub namespace: String,
    pub avg_hourly_cost: f64,
    pub avg_monthly_cost: f64,
    pub avg_cpu: f64,
    pub avg_memory: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    Uninitialized,
    Ready,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatus {
    pub db_path: String,
    pub db_size_bytes: u64,
    pub state: StoreState,
    pub namespace_rows: usize,
    pub pod_rows: usize,
    pub oldest_ts: Option<DateTime<Utc>>,
    pub newest_ts: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PruneSummary {
    pub namespace_rows: usize,
    pub pod_rows: usize,
}

impl PruneSummary {
    pub fn total(&self) -> usize {
        self.namespace_rows + self.pod_rows
    }
}
