use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use costkube_core::aggregate::{
    Aggregation, DEFAULT_NAMESPACE, aggregate_by_namespace, aggregate_by_pod,
};
use costkube_core::config::{Config, SourceMode};
use costkube_core::error::Result;
use costkube_core::model::usage::ContainerUsage;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::live::KubeMetricsSource;
use crate::simulated::SimulatedCluster;
use crate::static_source::StaticSource;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Kube,
    Simulated,
    Static,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Kube => "kube",
            Self::Simulated => "simulated",
            Self::Static => "static",
        };
        f.write_str(s)
    }
}

/// Per-container usage snapshot of a cluster.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// `None` means the backend could not be reached. An empty list is a
    /// reachable cluster with nothing running.
    async fn list_containers(&self) -> Option<Vec<ContainerUsage>>;

    fn kind(&self) -> SourceKind;
}

pub async fn get_namespace_usage(source: &dyn UsageSource) -> Option<Aggregation> {
    let containers = source.list_containers().await?;
    Some(aggregate_by_namespace(&containers))
}

/// Pod-level usage, optionally restricted to one namespace.
pub async fn get_pod_usage(source: &dyn UsageSource, namespace: Option<&str>) -> Option<Aggregation> {
    let mut containers = source.list_containers().await?;
    if let Some(ns) = namespace {
        containers.retain(|c| c.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE) == ns);
    }
    Some(aggregate_by_pod(&containers))
}

/// Build the source selected by `config.source`. In auto mode a reachable
/// metrics-server wins and the simulated cluster is the fallback.
pub async fn connect(config: &Config) -> Result<Arc<dyn UsageSource>> {
    let source: Arc<dyn UsageSource> = match config.source {
        SourceMode::Kube => Arc::new(KubeMetricsSource::connect().await),
        SourceMode::Simulated => Arc::new(SimulatedCluster::new()),
        SourceMode::Static => Arc::new(StaticSource::load(&config.static_source_path)?),
        SourceMode::Auto => {
            let live = KubeMetricsSource::connect().await;
            if live.is_connected() && live.list_containers().await.is_some() {
                Arc::new(live)
            } else {
                info!("metrics-server unreachable, using simulated cluster");
                Arc::new(SimulatedCluster::new())
            }
        }
    };
    info!(source = %source.kind(), "usage source selected");
    Ok(source)
}
