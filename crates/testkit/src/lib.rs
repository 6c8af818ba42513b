use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use costkube_core::cost::price;
use costkube_core::model::cost::{CostedSample, PricingConfig};
use costkube_core::model::usage::{ContainerUsage, UsageSample};
use costkube_core::time::Clock;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 10, 15, 0).unwrap()
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, ts: DateTime<Utc>) {
        *self.now.lock().unwrap() = ts;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(base_time())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A small cluster: two production pods (one with two containers), one
/// staging pod.
pub fn sample_containers() -> Vec<ContainerUsage> {
    vec![
        ContainerUsage {
            container: Some("nginx".to_string()),
            ..ContainerUsage::new("production", "web-7f9c", "150m", "512Mi")
        },
        ContainerUsage {
            container: Some("envoy".to_string()),
            ..ContainerUsage::new("production", "web-7f9c", "50m", "128Mi")
        },
        ContainerUsage::new("production", "db-0", "300m", "2Gi"),
        ContainerUsage::new("staging", "test-app-1", "80m", "256Mi"),
    ]
}

pub fn default_pricing() -> PricingConfig {
    PricingConfig::default()
}

pub fn costed_namespace(namespace: &str, cpu_mcores: f64, memory_bytes: f64) -> CostedSample {
    costed(UsageSample::namespace(namespace, cpu_mcores, memory_bytes))
}

pub fn costed_pod(
    namespace: &str,
    pod: &str,
    cpu_mcores: f64,
    memory_bytes: f64,
) -> CostedSample {
    costed(UsageSample::pod(namespace, pod, cpu_mcores, memory_bytes))
}

fn costed(sample: UsageSample) -> CostedSample {
    price(&[sample], &default_pricing())
        .unwrap()
        .remove(0)
}
