//! A fake cluster with a fixed set of workloads whose usage swings on a
//! short cycle, for demos and for running without a metrics-server.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use costkube_core::model::usage::ContainerUsage;
use rand::Rng;

use crate::source::{SourceKind, UsageSource};

const LOAD_CYCLE: Duration = Duration::from_secs(60);
const CPU_JITTER: f64 = 0.20;
const MEMORY_JITTER: f64 = 0.10;
const POD_SUFFIX_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const POD_SUFFIX_LEN: usize = 10;

struct Workload {
    name: &'static str,
    replicas: u32,
    cpu_mcores: f64,
    memory_mib: f64,
}

const fn workload(name: &'static str, replicas: u32, cpu_mcores: f64, memory_mib: f64) -> Workload {
    Workload {
        name,
        replicas,
        cpu_mcores,
        memory_mib,
    }
}

const WORKLOADS: &[(&str, &[Workload])] = &[
    (
        "production",
        &[
            workload("nginx-web", 3, 150.0, 512.0),
            workload("api-gateway", 2, 200.0, 768.0),
            workload("redis-cache", 2, 100.0, 1024.0),
            workload("postgres-db", 1, 300.0, 2048.0),
            workload("monitoring", 1, 80.0, 384.0),
        ],
    ),
    (
        "development",
        &[
            workload("webapp-dev", 2, 100.0, 256.0),
            workload("api-dev", 2, 120.0, 384.0),
            workload("database-dev", 1, 150.0, 512.0),
        ],
    ),
    (
        "staging",
        &[
            workload("test-app", 1, 80.0, 256.0),
            workload("integration-tests", 1, 120.0, 384.0),
        ],
    ),
    (
        "monitoring",
        &[
            workload("prometheus", 1, 250.0, 1536.0),
            workload("grafana", 1, 100.0, 512.0),
        ],
    ),
];

pub struct SimulatedCluster {
    started: Instant,
}

impl SimulatedCluster {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn namespaces(&self) -> Vec<&'static str> {
        WORKLOADS.iter().map(|(ns, _)| *ns).collect()
    }

    pub fn total_pods(&self) -> u32 {
        WORKLOADS
            .iter()
            .flat_map(|(_, workloads)| workloads.iter())
            .map(|w| w.replicas)
            .sum()
    }

    fn snapshot(&self) -> Vec<ContainerUsage> {
        let load = load_multiplier(self.started.elapsed());
        let mut rng = rand::rng();
        let mut out = Vec::with_capacity(self.total_pods() as usize);

        for (namespace, workloads) in WORKLOADS {
            for w in *workloads {
                for _ in 0..w.replicas {
                    let cpu = w.cpu_mcores * load * rng.random_range(1.0 - CPU_JITTER..=1.0 + CPU_JITTER);
                    let memory_kib = w.memory_mib
                        * 1024.0
                        * rng.random_range(1.0 - MEMORY_JITTER..=1.0 + MEMORY_JITTER);
                    out.push(ContainerUsage {
                        namespace: Some((*namespace).to_string()),
                        pod: Some(pod_name(&mut rng, w.name)),
                        container: Some(w.name.to_string()),
                        cpu: Some(format!("{}m", cpu as u64)),
                        memory: Some(format!("{}Ki", memory_kib as u64)),
                    });
                }
            }
        }
        out
    }
}

impl Default for SimulatedCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageSource for SimulatedCluster {
    async fn list_containers(&self) -> Option<Vec<ContainerUsage>> {
        Some(self.snapshot())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Simulated
    }
}

/// Triangle wave over one cycle: 1.3 at the edges, 0.7 in the middle.
fn load_multiplier(elapsed: Duration) -> f64 {
    let cycle = (elapsed.as_secs_f64() % LOAD_CYCLE.as_secs_f64()) / LOAD_CYCLE.as_secs_f64();
    0.7 + 0.6 * (2.0 * cycle - 1.0).abs()
}

fn pod_name(rng: &mut impl Rng, workload: &str) -> String {
    let suffix = (0..POD_SUFFIX_LEN)
        .map(|_| POD_SUFFIX_CHARS[rng.random_range(0..POD_SUFFIX_CHARS.len())] as char)
        .collect::<String>();
    format!("{workload}-{suffix}")
}
