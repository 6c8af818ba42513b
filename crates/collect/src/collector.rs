use std::sync::Arc;

use costkube_core::aggregate::{Aggregation, SkippedContainer};
use costkube_core::cost::price;
use costkube_core::error::{CostError, Result};
use costkube_core::model::cost::{CostedSample, PricingConfig};
use costkube_core::model::record::RecordFamily;
use costkube_store::Store;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::source::{SourceKind, UsageSource, get_namespace_usage, get_pod_usage};

/// What happened to the history write that accompanied a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Persistence {
    NotRequested,
    Persisted { rows: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostReport {
    pub costs: Vec<CostedSample>,
    pub skipped: Vec<SkippedContainer>,
    pub persistence: Persistence,
}

impl CostReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Source → aggregate → price → optionally persist.
#[derive(Clone)]
pub struct Collector {
    source: Arc<dyn UsageSource>,
    store: Store,
    pricing: PricingConfig,
}

impl Collector {
    pub fn new(source: Arc<dyn UsageSource>, store: Store, pricing: PricingConfig) -> Self {
        Self {
            source,
            store,
            pricing,
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn is_available(&self) -> bool {
        self.source.list_containers().await.is_some()
    }

    pub async fn namespace_costs(&self, persist: bool) -> Result<CostReport> {
        let usage = get_namespace_usage(self.source.as_ref())
            .await
            .ok_or_else(unavailable)?;
        self.finish(RecordFamily::Namespace, usage, persist).await
    }

    pub async fn pod_costs(&self, namespace: Option<&str>, persist: bool) -> Result<CostReport> {
        let usage = get_pod_usage(self.source.as_ref(), namespace)
            .await
            .ok_or_else(unavailable)?;
        self.finish(RecordFamily::Pod, usage, persist).await
    }

    async fn finish(
        &self,
        family: RecordFamily,
        usage: Aggregation,
        persist: bool,
    ) -> Result<CostReport> {
        let costs = price(&usage.samples, &self.pricing)?;
        let persistence = if persist {
            self.persist(family, costs.clone()).await
        } else {
            Persistence::NotRequested
        };

        debug!(
            table = family.table(),
            samples = costs.len(),
            skipped = usage.skipped.len(),
            "computed costs"
        );
        Ok(CostReport {
            costs,
            skipped: usage.skipped,
            persistence,
        })
    }

    async fn persist(&self, family: RecordFamily, costs: Vec<CostedSample>) -> Persistence {
        let store = self.store.clone();
        let joined = tokio::task::spawn_blocking(move || match family {
            RecordFamily::Namespace => store.append_namespace_records(&costs),
            RecordFamily::Pod => store.append_pod_records(&costs),
        })
        .await;

        let outcome = match joined {
            Ok(res) => res,
            Err(e) => Err(CostError::Internal(format!("history write task failed: {e}"))),
        };
        match outcome {
            Ok(rows) => Persistence::Persisted { rows },
            Err(e) => {
                warn!(table = family.table(), error = %e, "failed to save cost history");
                Persistence::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

fn unavailable() -> CostError {
    CostError::BackendUnavailable("metrics backend is not reachable".to_string())
}
