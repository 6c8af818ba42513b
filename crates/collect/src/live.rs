//! Live usage from the Kubernetes metrics API.
//!
//! Reads `metrics.k8s.io/v1beta1` pod metrics through a raw request on the
//! `kube` client. Connection setup tries the in-cluster service account
//! first, then the local kubeconfig.

use std::collections::BTreeMap;

use async_trait::async_trait;
use costkube_core::model::usage::ContainerUsage;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::{Client, Config};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::source::{SourceKind, UsageSource};

const POD_METRICS_PATH: &str = "/apis/metrics.k8s.io/v1beta1/pods";

pub struct KubeMetricsSource {
    client: Option<Client>,
}

impl KubeMetricsSource {
    /// Never fails: without a usable configuration the source stays
    /// disconnected and every listing reports the backend unavailable.
    pub async fn connect() -> Self {
        let config = match Config::incluster() {
            Ok(config) => {
                info!("using in-cluster kubernetes configuration");
                Ok(config)
            }
            Err(e) => {
                debug!(error = %e, "in-cluster config unavailable, trying kubeconfig");
                Config::infer().await.map_err(|e| e.to_string())
            }
        };

        let client = match config {
            Ok(config) => match Client::try_from(config) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!(error = %e, "failed to build kubernetes client");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "no kubernetes configuration found");
                None
            }
        };

        Self { client }
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client: Some(client),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl UsageSource for KubeMetricsSource {
    async fn list_containers(&self) -> Option<Vec<ContainerUsage>> {
        let client = self.client.as_ref()?;

        let request = match http::Request::builder()
            .method("GET")
            .uri(POD_METRICS_PATH)
            .body(Vec::new())
        {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "failed to build metrics request");
                return None;
            }
        };

        match client.request::<PodMetricsList>(request).await {
            Ok(list) => Some(flatten(list)),
            Err(e) => {
                warn!(error = %e, "metrics API request failed");
                None
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Kube
    }
}

#[derive(Debug, Default, Deserialize)]
struct PodMetricsList {
    #[serde(default)]
    items: Vec<PodMetricsItem>,
}

#[derive(Debug, Default, Deserialize)]
struct PodMetricsItem {
    #[serde(default)]
    metadata: PodMetricsMetadata,
    #[serde(default)]
    containers: Vec<ContainerMetricsItem>,
}

#[derive(Debug, Default, Deserialize)]
struct PodMetricsMetadata {
    name: Option<String>,
    namespace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerMetricsItem {
    name: Option<String>,
    #[serde(default)]
    usage: BTreeMap<String, Quantity>,
}

fn flatten(list: PodMetricsList) -> Vec<ContainerUsage> {
    let mut out = Vec::new();
    for pod in list.items {
        for mut container in pod.containers {
            out.push(ContainerUsage {
                namespace: pod.metadata.namespace.clone(),
                pod: pod.metadata.name.clone(),
                container: container.name.take(),
                cpu: container.usage.remove("cpu").map(|q| q.0),
                memory: container.usage.remove("memory").map(|q| q.0),
            });
        }
    }
    out
}
