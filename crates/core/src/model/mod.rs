pub mod cost;
pub mod record;
pub mod usage;

pub use cost::{CostedSample, PricingConfig};
pub use record::{MetricRecord, RecordFamily};
pub use usage::{ContainerUsage, UsageSample};
