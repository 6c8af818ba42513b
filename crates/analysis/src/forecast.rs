//! Linear cost forecasting over hourly trend points.
//!
//! Inputs are `(bucket start, summed hourly cost)` pairs as produced by
//! `CostTrends::points`. The fit is ordinary least squares of cost against
//! hours since the Unix epoch.

use chrono::{DateTime, Datelike, Duration, TimeDelta, Timelike, Utc};
use costkube_core::cost::HOURS_PER_MONTH;
use costkube_core::error::{CostError, Result};
use serde::{Deserialize, Serialize};

pub const MIN_FORECAST_POINTS: usize = 7;
pub const MIN_SEASONAL_POINTS: usize = 30;
pub const RUNWAY_HORIZON_DAYS: u32 = 365;

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Stable,
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Forecast {
    pub forecast_days: u32,
    pub forecast_dates: Vec<DateTime<Utc>>,
    pub forecast_costs: Vec<f64>,
    pub forecast_monthly_total: f64,
    pub lower_bound: Vec<f64>,
    pub upper_bound: Vec<f64>,
    pub current_monthly_cost: f64,
    pub trend: Trend,
    pub trend_slope: f64,
    pub daily_change_rate: f64,
    pub mean_historical_cost: f64,
    pub std_dev: f64,
    pub data_points_used: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetRunway {
    pub budget: f64,
    pub days_until_exhaustion: u32,
    pub exhaustion_date: Option<DateTime<Utc>>,
    pub sufficient_for_year: bool,
    pub current_monthly_burn_rate: f64,
    pub projected_monthly_burn_rate: f64,
    pub trend: Trend,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodAverage {
    pub label: String,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonalAnalysis {
    pub day_of_week_averages: Vec<PeriodAverage>,
    pub hour_of_day_averages: Vec<PeriodAverage>,
    pub peak_day: PeriodAverage,
    pub low_day: PeriodAverage,
    pub peak_hour: PeriodAverage,
    pub low_hour: PeriodAverage,
    pub weekday_avg: f64,
    pub weekend_avg: f64,
}

struct LinearFit {
    mean_x: f64,
    mean_y: f64,
    slope: f64,
}

impl LinearFit {
    fn new(xs: &[f64], ys: &[f64]) -> Self {
        let mean_x = mean(xs);
        let mean_y = mean(ys);
        let mut sxy = 0.0;
        let mut sxx = 0.0;
        for (x, y) in xs.iter().zip(ys) {
            sxy += (x - mean_x) * (y - mean_y);
            sxx += (x - mean_x) * (x - mean_x);
        }
        // All points share one timestamp: no slope to speak of.
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        Self {
            mean_x,
            mean_y,
            slope,
        }
    }

    fn predict(&self, x: f64) -> f64 {
        self.mean_y + self.slope * (x - self.mean_x)
    }
}

/// Project daily costs `days` ahead of the last point.
pub fn forecast_costs(points: &[(DateTime<Utc>, f64)], days: u32) -> Result<Forecast> {
    if points.len() < MIN_FORECAST_POINTS {
        return Err(CostError::InsufficientHistory {
            required: MIN_FORECAST_POINTS,
            available: points.len(),
        });
    }
    if days == 0 || days > RUNWAY_HORIZON_DAYS {
        return Err(CostError::InvalidArgument(format!(
            "forecast days must be between 1 and {RUNWAY_HORIZON_DAYS}, got {days}"
        )));
    }

    let xs = points.iter().map(|(ts, _)| hours_since_epoch(*ts)).collect::<Vec<_>>();
    let ys = points.iter().map(|(_, cost)| *cost).collect::<Vec<_>>();
    let fit = LinearFit::new(&xs, &ys);
    let mean_cost = fit.mean_y;
    let std_dev = population_std(&ys, mean_cost);

    let trend = if fit.slope.abs() < mean_cost * 0.001 {
        Trend::Stable
    } else if fit.slope > 0.0 {
        Trend::Increasing
    } else {
        Trend::Decreasing
    };

    let (last_ts, _) = points[points.len() - 1];
    let last_x = xs[xs.len() - 1];
    let mut forecast_dates = Vec::with_capacity(days as usize);
    let mut forecast_costs = Vec::with_capacity(days as usize);
    for day in 1..=days {
        let hours = i64::from(day) * 24;
        let date = last_ts
            .checked_add_signed(TimeDelta::hours(hours))
            .ok_or_else(|| {
                CostError::InvalidArgument(format!("forecast day {day} is out of range"))
            })?;
        forecast_dates.push(date);
        forecast_costs.push(fit.predict(last_x + hours as f64).max(0.0));
    }

    let forecast_monthly_total = forecast_costs.iter().take(30).sum::<f64>() * 24.0;
    let lower_bound = forecast_costs.iter().map(|c| (c - std_dev).max(0.0)).collect();
    let upper_bound = forecast_costs.iter().map(|c| c + std_dev).collect();

    Ok(Forecast {
        forecast_days: days,
        forecast_dates,
        forecast_costs,
        forecast_monthly_total,
        lower_bound,
        upper_bound,
        current_monthly_cost: mean_cost * HOURS_PER_MONTH,
        trend,
        trend_slope: fit.slope,
        daily_change_rate: fit.slope * 24.0,
        mean_historical_cost: mean_cost,
        std_dev,
        data_points_used: points.len(),
    })
}

/// Days until cumulative forecast spend reaches `budget`, looking at most a
/// year ahead.
pub fn budget_runway(points: &[(DateTime<Utc>, f64)], budget: f64) -> Result<BudgetRunway> {
    if !budget.is_finite() || budget < 0.0 {
        return Err(CostError::InvalidArgument(format!(
            "budget must be a non-negative number, got {budget}"
        )));
    }
    let forecast = forecast_costs(points, RUNWAY_HORIZON_DAYS)?;

    let mut cumulative = 0.0;
    let mut exhausted = None;
    for (i, hourly) in forecast.forecast_costs.iter().enumerate() {
        cumulative += hourly * 24.0;
        if cumulative >= budget {
            exhausted = Some(i);
            break;
        }
    }

    let (days_until_exhaustion, exhaustion_date, sufficient_for_year) = match exhausted {
        Some(i) => (i as u32 + 1, forecast.forecast_dates.get(i).copied(), false),
        None => (
            RUNWAY_HORIZON_DAYS,
            forecast.forecast_dates.last().copied(),
            true,
        ),
    };

    Ok(BudgetRunway {
        budget,
        days_until_exhaustion,
        exhaustion_date,
        sufficient_for_year,
        current_monthly_burn_rate: forecast.current_monthly_cost,
        projected_monthly_burn_rate: forecast.forecast_monthly_total,
        trend: forecast.trend,
        recommendation: runway_recommendation(days_until_exhaustion),
    })
}

fn runway_recommendation(days: u32) -> String {
    match days {
        d if d > 180 => format!("Budget is healthy. Runway exceeds 6 months ({d} days)."),
        d if d > 90 => format!("Budget runway is {d} days. Consider planning for the next quarter."),
        d if d > 30 => format!("Budget runway is {d} days. Start planning cost optimization now."),
        d => format!("Critical: budget will be exhausted in {d} days. Immediate action required."),
    }
}

/// Average cost by weekday and by hour of day. Periods with no points
/// average to zero.
pub fn seasonal_analysis(points: &[(DateTime<Utc>, f64)]) -> Result<SeasonalAnalysis> {
    if points.len() < MIN_SEASONAL_POINTS {
        return Err(CostError::InsufficientHistory {
            required: MIN_SEASONAL_POINTS,
            available: points.len(),
        });
    }

    let mut by_day = vec![Vec::new(); 7];
    let mut by_hour = vec![Vec::new(); 24];
    for (ts, cost) in points {
        by_day[ts.weekday().num_days_from_monday() as usize].push(*cost);
        by_hour[ts.hour() as usize].push(*cost);
    }

    let day_of_week_averages = by_day
        .iter()
        .zip(DAY_NAMES)
        .map(|(costs, name)| PeriodAverage {
            label: name.to_string(),
            average: mean(costs),
        })
        .collect::<Vec<_>>();
    let hour_of_day_averages = by_hour
        .iter()
        .enumerate()
        .map(|(hour, costs)| PeriodAverage {
            label: format!("{hour:02}:00"),
            average: mean(costs),
        })
        .collect::<Vec<_>>();

    let weekday_avg = mean(
        &day_of_week_averages[..5]
            .iter()
            .map(|d| d.average)
            .collect::<Vec<_>>(),
    );
    let weekend_avg = mean(
        &day_of_week_averages[5..]
            .iter()
            .map(|d| d.average)
            .collect::<Vec<_>>(),
    );

    Ok(SeasonalAnalysis {
        peak_day: first_extreme(&day_of_week_averages, |a, b| a > b),
        low_day: first_extreme(&day_of_week_averages, |a, b| a < b),
        peak_hour: first_extreme(&hour_of_day_averages, |a, b| a > b),
        low_hour: first_extreme(&hour_of_day_averages, |a, b| a < b),
        day_of_week_averages,
        hour_of_day_averages,
        weekday_avg,
        weekend_avg,
    })
}

/// Earliest period that beats every other under `better`. Ties keep the
/// earlier one.
fn first_extreme(periods: &[PeriodAverage], better: impl Fn(f64, f64) -> bool) -> PeriodAverage {
    let mut best = &periods[0];
    for p in &periods[1..] {
        if better(p.average, best.average) {
            best = p;
        }
    }
    best.clone()
}

fn hours_since_epoch(ts: DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 / 3600.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn hourly(costs: &[f64]) -> Vec<(DateTime<Utc>, f64)> {
        let start = Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap();
        costs
            .iter()
            .enumerate()
            .map(|(i, c)| (start + Duration::hours(i as i64), *c))
            .collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn needs_a_week_of_points() {
        let err = forecast_costs(&hourly(&[1.0; 6]), 30).unwrap_err();
        assert!(matches!(
            err,
            CostError::InsufficientHistory {
                required: 7,
                available: 6
            }
        ));
    }

    #[test]
    fn flat_history_is_stable() {
        let f = forecast_costs(&hourly(&[1.0; 10]), 30).unwrap();
        assert_eq!(f.trend, Trend::Stable);
        assert_eq!(f.forecast_costs.len(), 30);
        assert!(f.forecast_costs.iter().all(|c| close(*c, 1.0)));
        assert!(close(f.forecast_monthly_total, 720.0));
        assert!(close(f.current_monthly_cost, 730.0));
        assert_eq!(f.std_dev, 0.0);
        assert_eq!(f.lower_bound, f.forecast_costs);
        assert_eq!(f.data_points_used, 10);
    }

    #[test]
    fn rising_history_extrapolates_linearly() {
        let costs = (0..10).map(|h| 0.1 * h as f64).collect::<Vec<_>>();
        let points = hourly(&costs);
        let f = forecast_costs(&points, 3).unwrap();

        assert_eq!(f.trend, Trend::Increasing);
        assert!((f.trend_slope - 0.1).abs() < 1e-6);
        assert!((f.daily_change_rate - 2.4).abs() < 1e-6);
        // last point is hour 9, first prediction hour 33
        assert!((f.forecast_costs[0] - 3.3).abs() < 1e-6);
        assert!((f.forecast_costs[2] - 8.1).abs() < 1e-6);
        assert_eq!(f.forecast_dates[0], points[9].0 + Duration::hours(24));
        assert!(f.upper_bound[0] > f.forecast_costs[0]);
    }

    #[test]
    fn falling_history_never_goes_negative() {
        let costs = (0..10).map(|h| 10.0 - h as f64).collect::<Vec<_>>();
        let f = forecast_costs(&hourly(&costs), 5).unwrap();
        assert_eq!(f.trend, Trend::Decreasing);
        assert!(f.forecast_costs.iter().all(|c| *c == 0.0));
        assert!(f.lower_bound.iter().all(|c| *c == 0.0));
    }

    #[test]
    fn zero_days_is_rejected() {
        assert!(matches!(
            forecast_costs(&hourly(&[1.0; 10]), 0),
            Err(CostError::InvalidArgument(_))
        ));
    }

    #[test]
    fn horizon_beyond_a_year_is_rejected() {
        let points = hourly(&[1.0; 10]);
        assert_eq!(forecast_costs(&points, RUNWAY_HORIZON_DAYS).unwrap().forecast_costs.len(), 365);
        for days in [RUNWAY_HORIZON_DAYS + 1, u32::MAX] {
            assert!(matches!(
                forecast_costs(&points, days),
                Err(CostError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn dates_past_the_calendar_end_are_rejected() {
        let end = DateTime::<Utc>::MAX_UTC - Duration::hours(10);
        let points = (0..10)
            .map(|i| (end + Duration::hours(i), 1.0))
            .collect::<Vec<_>>();
        assert!(matches!(
            forecast_costs(&points, 1),
            Err(CostError::InvalidArgument(_))
        ));
    }

    #[test]
    fn runway_counts_days_until_budget_spent() {
        // 1.0/hour is 24 per day: 24, 48, 72, 96, 120
        let r = budget_runway(&hourly(&[1.0; 10]), 100.0).unwrap();
        assert_eq!(r.days_until_exhaustion, 5);
        assert!(!r.sufficient_for_year);
        assert!(r.recommendation.starts_with("Critical"));
        assert!(r.exhaustion_date.is_some());
    }

    #[test]
    fn large_budget_lasts_the_year() {
        let r = budget_runway(&hourly(&[1.0; 10]), 1.0e9).unwrap();
        assert_eq!(r.days_until_exhaustion, 365);
        assert!(r.sufficient_for_year);
        assert!(r.recommendation.contains("healthy"));
    }

    #[test]
    fn runway_bands() {
        assert!(runway_recommendation(181).contains("healthy"));
        assert!(runway_recommendation(120).contains("next quarter"));
        assert!(runway_recommendation(45).contains("optimization"));
        assert!(runway_recommendation(30).starts_with("Critical"));
    }

    #[test]
    fn negative_budget_is_rejected() {
        assert!(matches!(
            budget_runway(&hourly(&[1.0; 10]), -5.0),
            Err(CostError::InvalidArgument(_))
        ));
    }

    #[test]
    fn seasonal_needs_thirty_points() {
        assert!(matches!(
            seasonal_analysis(&hourly(&[1.0; 29])),
            Err(CostError::InsufficientHistory { required: 30, .. })
        ));
    }

    #[test]
    fn seasonal_finds_peaks() {
        // Monday and Tuesday, with a noon spike each day.
        let costs = (0..48)
            .map(|h| if h % 24 == 12 { 5.0 } else { 1.0 })
            .collect::<Vec<_>>();
        let s = seasonal_analysis(&hourly(&costs)).unwrap();

        assert_eq!(s.peak_day.label, "Monday");
        assert!(close(s.peak_day.average, 28.0 / 24.0));
        assert_eq!(s.low_day.label, "Wednesday");
        assert_eq!(s.low_day.average, 0.0);
        assert_eq!(s.peak_hour.label, "12:00");
        assert_eq!(s.peak_hour.average, 5.0);
        assert_eq!(s.low_hour.label, "00:00");
        assert_eq!(s.weekend_avg, 0.0);
        assert!(close(s.weekday_avg, 2.0 * 28.0 / 24.0 / 5.0));
        assert_eq!(s.hour_of_day_averages.len(), 24);
    }
}
