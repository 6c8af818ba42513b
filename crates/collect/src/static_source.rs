use std::fs;
use std::path::Path;

use async_trait::async_trait;
use costkube_core::error::{CostError, Result};
use costkube_core::model::usage::ContainerUsage;
use serde::Deserialize;
use tracing::{info, warn};

use crate::source::{SourceKind, UsageSource};

/// A fixed cluster read once from a JSON file.
///
/// The file holds `containers` with raw quantity strings and/or `pods` with
/// already-normalized `cpu_mcores` / `memory_bytes`. A missing file is an
/// empty cluster.
pub struct StaticSource {
    containers: Vec<ContainerUsage>,
}

#[derive(Debug, Default, Deserialize)]
struct StaticFile {
    #[serde(default)]
    containers: Vec<ContainerUsage>,
    #[serde(default)]
    pods: Vec<StaticPod>,
}

#[derive(Debug, Deserialize)]
struct StaticPod {
    namespace: String,
    pod: String,
    cpu_mcores: f64,
    memory_bytes: f64,
}

impl StaticSource {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "static usage file not found, serving an empty cluster");
            return Ok(Self::from_containers(Vec::new()));
        }

        let raw = fs::read_to_string(path)
            .map_err(|e| CostError::Io(format!("failed reading {}: {e}", path.display())))?;
        let source = Self::from_json(&raw)
            .map_err(|e| CostError::Config(format!("failed parsing {}: {e}", path.display())))?;
        info!(path = %path.display(), containers = source.containers.len(), "loaded static usage");
        Ok(source)
    }

    pub fn from_json(raw: &str) -> std::result::Result<Self, serde_json::Error> {
        let file: StaticFile = serde_json::from_str(raw)?;
        let mut containers = file.containers;
        containers.extend(file.pods.into_iter().map(|p| ContainerUsage {
            namespace: Some(p.namespace),
            pod: Some(p.pod),
            container: None,
            cpu: Some(format!("{}m", p.cpu_mcores)),
            memory: Some(format!("{}", p.memory_bytes)),
        }));
        Ok(Self::from_containers(containers))
    }

    pub fn from_containers(containers: Vec<ContainerUsage>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl UsageSource for StaticSource {
    async fn list_containers(&self) -> Option<Vec<ContainerUsage>> {
        Some(self.containers.clone())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Static
    }
}
