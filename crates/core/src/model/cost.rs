use serde::{Deserialize, Serialize};

use crate::error::{CostError, Result};
use crate::model::usage::UsageSample;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingConfig {
    pub currency: String,
    pub cpu_per_core_hour: f64,
    pub mem_per_gb_hour: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            cpu_per_core_hour: 0.031,
            mem_per_gb_hour: 0.004,
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.currency.trim().is_empty() {
            return Err(CostError::Config("pricing currency cannot be empty".to_string()));
        }
        for (name, rate) in [
            ("cpu_per_core_hour", self.cpu_per_core_hour),
            ("mem_per_gb_hour", self.mem_per_gb_hour),
        ] {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(CostError::Config(format!(
                    "pricing {name} must be a positive number (value={rate})"
                )));
            }
        }
        Ok(())
    }
}

/// A usage sample with its price attached.
///
/// `hourly_cost` and `monthly_cost` are already rounded for display;
/// the core-hour fields keep full precision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostedSample {
    #[serde(flatten)]
    pub usage: UsageSample,
    pub cpu_core_hours: f64,
    pub memory_gb_hours: f64,
    pub hourly_cost: f64,
    pub monthly_cost: f64,
}

impl CostedSample {
    pub fn namespace(&self) -> &str {
        &self.usage.namespace
    }

    pub fn pod(&self) -> Option<&str> {
        self.usage.pod.as_deref()
    }
}
