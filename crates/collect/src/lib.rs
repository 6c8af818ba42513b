pub mod collector;
pub mod live;
pub mod simulated;
pub mod source;
pub mod static_source;

pub use collector::{Collector, CostReport, Persistence};
pub use live::KubeMetricsSource;
pub use simulated::SimulatedCluster;
pub use source::{SourceKind, UsageSource, connect, get_namespace_usage, get_pod_usage};
pub use static_source::StaticSource;
