use chrono::SecondsFormat;
use costkube_analysis::forecast::{BudgetRunway, Forecast, Trend};
use costkube_analysis::recommend::{AnalysisSummary, Severity};
use costkube_core::query::CostTrends;
use costkube_core::quantity::{format_cpu, format_memory};
use owo_colors::OwoColorize;

use crate::protocol::{
    CostsResponse, HealthResponse, HistoryResponse, IdleResponse, PruneResponse,
    TopNamespacesResponse,
};

pub fn print_costs_human(v: &CostsResponse) {
    for c in &v.data {
        let name = match c.pod() {
            Some(pod) => format!("{}/{pod}", c.namespace()),
            None => c.namespace().to_string(),
        };
        println!(
            "{:<40} cpu={:<8} mem={:<10} hourly={:<8.4} monthly={:.2}",
            name.cyan(),
            format_cpu(c.usage.cpu_mcores),
            format_memory(c.usage.memory_bytes),
            c.hourly_cost,
            c.monthly_cost
        );
    }
    let monthly: f64 = v.data.iter().map(|c| c.monthly_cost).sum();
    println!(
        "-- {} rows, monthly total {:.2}, source={} --",
        v.data.len(),
        monthly,
        v.source
    );
    if !v.skipped.is_empty() {
        println!(
            "{}",
            format!("skipped {} containers with unreadable usage", v.skipped.len()).yellow()
        );
    }
}

pub fn print_history_human(v: &HistoryResponse) {
    for r in &v.data {
        let name = match &r.pod {
            Some(pod) => format!("{}/{pod}", r.namespace),
            None => r.namespace.clone(),
        };
        println!(
            "{} {} cpu={} mem={} hourly={:.4}",
            r.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            name,
            format_cpu(r.cpu_mcores),
            format_memory(r.memory_bytes),
            r.hourly_cost
        );
    }
    println!("-- {} records in the last {}h --", v.count, v.hours);
}

pub fn print_trends_human(v: &CostTrends) {
    for (i, ts) in v.timestamps.iter().enumerate() {
        println!(
            "{} hourly={:.4} cpu={} mem={}",
            ts.to_rfc3339_opts(SecondsFormat::Secs, true),
            v.costs[i],
            format_cpu(v.cpu[i]),
            format_memory(v.memory[i])
        );
    }
    println!("-- {} hourly buckets --", v.len());
}

pub fn print_top_human(v: &TopNamespacesResponse) {
    for (rank, ns) in v.data.iter().enumerate() {
        println!(
            "{:>2}. {:<30} avg_monthly={:.2} avg_cpu={} avg_mem={}",
            rank + 1,
            ns.namespace.cyan(),
            ns.avg_monthly_cost,
            format_cpu(ns.avg_cpu),
            format_memory(ns.avg_memory)
        );
    }
    println!("-- top {} over the last {}h --", v.data.len(), v.hours);
}

pub fn print_forecast_human(v: &Forecast) {
    println!(
        "trend={} slope={:.6}/h daily_change={:.4}",
        trend_label(v.trend),
        v.trend_slope,
        v.daily_change_rate
    );
    println!(
        "current_monthly={:.2} forecast_monthly={:.2}",
        v.current_monthly_cost, v.forecast_monthly_total
    );
    for (i, date) in v.forecast_dates.iter().enumerate() {
        println!(
            "{} {:.4} [{:.4}, {:.4}]",
            date.format("%Y-%m-%d"),
            v.forecast_costs[i],
            v.lower_bound[i],
            v.upper_bound[i]
        );
    }
    println!("-- {} days from {} data points --", v.forecast_days, v.data_points_used);
}

pub fn print_runway_human(v: &BudgetRunway) {
    let exhaustion = v
        .exhaustion_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "none within a year".to_string());
    println!(
        "budget={:.2} days={} exhaustion={} trend={}",
        v.budget,
        v.days_until_exhaustion,
        exhaustion,
        trend_label(v.trend)
    );
    println!(
        "burn current={:.2}/month projected={:.2}/month",
        v.current_monthly_burn_rate, v.projected_monthly_burn_rate
    );
    if v.days_until_exhaustion <= 30 {
        println!("{}", v.recommendation.red());
    } else {
        println!("{}", v.recommendation);
    }
}

pub fn print_recommendations_human(v: &AnalysisSummary) {
    for ns in &v.right_sizing_recommendations {
        println!(
            "{} savings={:.2}/month",
            ns.namespace.cyan(),
            ns.potential_monthly_savings
        );
        for rec in &ns.recommendations {
            println!("  {} {}", severity_label(rec.severity), rec.message);
        }
    }
    for idle in &v.idle_resources {
        println!("{} {}", severity_label(idle.severity), idle.message);
    }
    println!(
        "-- {} of {} namespaces need attention, potential savings {:.2}/month --",
        v.namespaces_with_recommendations,
        v.total_namespaces_analyzed,
        v.total_potential_monthly_savings
    );
}

pub fn print_idle_human(v: &IdleResponse) {
    for idle in &v.idle_resources {
        println!(
            "{:<30} cpu={} mem={} savings={:.2}",
            idle.namespace.cyan(),
            format_cpu(idle.cpu_mcores),
            format_memory(idle.memory_bytes),
            idle.potential_savings
        );
    }
    println!(
        "-- {} idle namespaces, potential savings {:.2}/month --",
        v.count, v.total_potential_savings
    );
}

pub fn print_prune_human(v: &PruneResponse) {
    println!(
        "pruned {} rows older than {} days (namespace={} pod={})",
        v.deleted, v.days, v.namespace_rows, v.pod_rows
    );
}

pub fn print_status_human(v: &HealthResponse) {
    let metrics = if v.metrics_available {
        "available".green().to_string()
    } else {
        "unavailable".red().to_string()
    };
    println!("status={} source={} metrics={metrics}", v.status, v.source);
    println!("db_path={}", v.store.db_path);
    println!("db_size_bytes={}", v.store.db_size_bytes);
    println!(
        "namespace_rows={} pod_rows={}",
        v.store.namespace_rows, v.store.pod_rows
    );
    if let Some(oldest) = v.store.oldest_ts {
        println!("oldest={}", oldest.to_rfc3339_opts(SecondsFormat::Millis, true));
    }
    if let Some(newest) = v.store.newest_ts {
        println!("newest={}", newest.to_rfc3339_opts(SecondsFormat::Millis, true));
    }
}

fn trend_label(trend: Trend) -> String {
    match trend {
        Trend::Stable => "stable".green().to_string(),
        Trend::Increasing => "increasing".yellow().to_string(),
        Trend::Decreasing => "decreasing".blue().to_string(),
    }
}

fn severity_label(severity: Severity) -> String {
    match severity {
        Severity::High => "HIGH".red().to_string(),
        Severity::Medium => "MEDIUM".yellow().to_string(),
    }
}
