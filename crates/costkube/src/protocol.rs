use chrono::{DateTime, Utc};
use costkube_analysis::recommend::IdleResource;
use costkube_collect::{Persistence, SourceKind};
use costkube_core::aggregate::SkippedContainer;
use costkube_core::model::cost::{CostedSample, PricingConfig};
use costkube_core::model::record::MetricRecord;
use costkube_core::query::{NamespaceRanking, StoreStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostsResponse {
    pub data: Vec<CostedSample>,
    pub skipped: Vec<SkippedContainer>,
    pub persistence: Persistence,
    pub source: SourceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub pricing: PricingConfig,
    pub source: SourceKind,
    pub metrics_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub source: SourceKind,
    pub metrics_available: bool,
    pub store: StoreStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub data: Vec<MetricRecord>,
    pub namespace: Option<String>,
    pub hours: u32,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopNamespacesResponse {
    pub data: Vec<NamespaceRanking>,
    pub limit: usize,
    pub hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneResponse {
    pub days: u32,
    pub namespace_rows: usize,
    pub pod_rows: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleResponse {
    pub idle_resources: Vec<IdleResource>,
    pub count: usize,
    pub total_potential_savings: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub timestamp: DateTime<Utc>,
    pub export_type: String,
    pub data: Vec<CostedSample>,
}

/// Frames pushed over `/ws/metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsFrame {
    MetricsUpdate {
        data: Vec<CostedSample>,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
