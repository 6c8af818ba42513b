use crate::error::{CostError, Result};
use crate::model::cost::{CostedSample, PricingConfig};
use crate::model::usage::UsageSample;

pub const HOURS_PER_MONTH: f64 = 730.0;
const BYTES_PER_GIB: f64 = 1_073_741_824.0;

/// Price every sample, failing on the first one carrying a non-finite or
/// negative quantity.
pub fn price(samples: &[UsageSample], config: &PricingConfig) -> Result<Vec<CostedSample>> {
    samples.iter().map(|s| price_sample(s, config)).collect()
}

/// Usage is an instantaneous reading; it is billed as if sustained for one
/// hour, and the monthly figure projects that hour over 730.
pub fn price_sample(sample: &UsageSample, config: &PricingConfig) -> Result<CostedSample> {
    check_usage("cpu_mcores", sample.cpu_mcores, sample)?;
    check_usage("memory_bytes", sample.memory_bytes, sample)?;

    let cpu_core_hours = sample.cpu_mcores / 1000.0;
    let memory_gb_hours = sample.memory_bytes / BYTES_PER_GIB;
    let hourly_cost =
        cpu_core_hours * config.cpu_per_core_hour + memory_gb_hours * config.mem_per_gb_hour;
    let monthly_cost = hourly_cost * HOURS_PER_MONTH;

    Ok(CostedSample {
        usage: sample.clone(),
        cpu_core_hours,
        memory_gb_hours,
        hourly_cost: round_to(hourly_cost, 4),
        monthly_cost: round_to(monthly_cost, 2),
    })
}

fn check_usage(field: &str, value: f64, sample: &UsageSample) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        return Ok(());
    }
    Err(CostError::InvalidUsageValue(format!(
        "{field}={value} for namespace={} pod={}",
        sample.namespace,
        sample.pod.as_deref().unwrap_or("-")
    )))
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing() -> PricingConfig {
        PricingConfig {
            currency: "USD".into(),
            cpu_per_core_hour: 0.031,
            mem_per_gb_hour: 0.004,
        }
    }

    #[test]
    fn prices_known_sample() {
        let out = price(
            &[UsageSample::namespace("test-namespace", 100.0, 1073741824.0)],
            &pricing(),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert_eq!(c.namespace(), "test-namespace");
        assert_eq!(c.cpu_core_hours, 0.1);
        assert_eq!(c.memory_gb_hours, 1.0);
        assert_eq!(c.hourly_cost, 0.0071);
        assert_eq!(c.monthly_cost, 5.18);
    }

    #[test]
    fn zero_usage_costs_nothing() {
        let c = price_sample(&UsageSample::namespace("empty", 0.0, 0.0), &pricing()).unwrap();
        assert_eq!(c.cpu_core_hours, 0.0);
        assert_eq!(c.memory_gb_hours, 0.0);
        assert_eq!(c.hourly_cost, 0.0);
        assert_eq!(c.monthly_cost, 0.0);
    }

    #[test]
    fn prices_multiple_samples_in_order() {
        let out = price(
            &[
                UsageSample::namespace("namespace-1", 500.0, 536870912.0),
                UsageSample::pod("namespace-2", "db-0", 2000.0, 2147483648.0),
            ],
            &pricing(),
        )
        .unwrap();
        assert_eq!(out[0].hourly_cost, 0.0175);
        assert_eq!(out[0].monthly_cost, 12.78);
        assert_eq!(out[1].pod(), Some("db-0"));
        assert_eq!(out[1].hourly_cost, 0.07);
        assert_eq!(out[1].monthly_cost, 51.1);
    }

    #[test]
    fn pricing_is_deterministic() {
        let input = vec![UsageSample::namespace("a", 333.3, 12345678.9)];
        assert_eq!(price(&input, &pricing()).unwrap(), price(&input, &pricing()).unwrap());
    }

    #[test]
    fn rejects_non_finite_usage() {
        for (cpu, mem) in [(f64::NAN, 0.0), (0.0, f64::INFINITY), (-1.0, 0.0)] {
            let err = price(&[UsageSample::namespace("bad", cpu, mem)], &pricing()).unwrap_err();
            assert!(matches!(err, CostError::InvalidUsageValue(_)));
        }
    }

    #[test]
    fn monthly_uses_unrounded_hourly() {
        // 0.00714 rounds to 0.0071 but 0.00714 * 730 = 5.2122
        let cfg = PricingConfig {
            cpu_per_core_hour: 0.0714,
            ..pricing()
        };
        let c = price_sample(&UsageSample::namespace("a", 100.0, 0.0), &cfg).unwrap();
        assert_eq!(c.hourly_cost, 0.0071);
        assert_eq!(c.monthly_cost, 5.21);
    }
}
