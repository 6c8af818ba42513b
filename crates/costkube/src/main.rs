mod api;
mod client;
mod export;
mod output;
mod protocol;
mod telemetry;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use costkube_analysis::forecast::{BudgetRunway, Forecast, SeasonalAnalysis};
use costkube_analysis::recommend::AnalysisSummary;
use costkube_collect::{Collector, CostReport, Persistence};
use costkube_core::config::{Config, SourceMode};
use costkube_core::query::CostTrends;
use costkube_store::Store;
use serde::Serialize;

use crate::api::AppState;
use crate::client::ApiClient;
use crate::output::{
    print_costs_human, print_forecast_human, print_history_human, print_idle_human,
    print_prune_human, print_recommendations_human, print_runway_human, print_status_human,
    print_top_human, print_trends_human,
};
use crate::protocol::{
    CostsResponse, HealthResponse, HistoryResponse, IdleResponse, PruneResponse,
    TopNamespacesResponse,
};
use crate::telemetry::{LogFormat, init_cli_tracing, init_run_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "costkube")]
#[command(about = "Kubernetes namespace and pod cost tracking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true, help = "Address of a running costkube server")]
    addr: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the HTTP API with periodic collection and retention")]
    Serve {
        #[arg(long)]
        db_path: Option<PathBuf>,
        #[arg(long)]
        listen_addr: Option<String>,
        #[arg(long, help = "auto, kube, simulated or static")]
        source: Option<String>,
    },
    #[command(about = "Current cost per namespace")]
    Namespaces {
        #[arg(long, help = "Do not record this snapshot in history")]
        no_save: bool,
    },
    #[command(about = "Current cost per pod")]
    Pods {
        #[arg(long)]
        namespace: Option<String>,
        #[arg(long, help = "Do not record this snapshot in history")]
        no_save: bool,
    },
    #[command(about = "Recorded cost snapshots")]
    History {
        #[arg(long)]
        namespace: Option<String>,
        #[arg(long, default_value_t = 24)]
        hours: u32,
        #[arg(long, help = "Show pod history instead of namespaces")]
        pods: bool,
    },
    #[command(about = "Hourly cost roll-up")]
    Trends {
        #[arg(long, default_value_t = 168)]
        hours: u32,
    },
    #[command(about = "Most expensive namespaces on average")]
    Top {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },
    #[command(about = "Project future cost from recorded history")]
    Forecast {
        #[arg(long, default_value_t = 30)]
        days: u32,
        #[arg(long, help = "Report how long this budget lasts instead")]
        budget: Option<f64>,
        #[arg(long, conflicts_with = "budget")]
        seasonal: bool,
    },
    #[command(about = "Right-sizing and idle namespace recommendations")]
    Recommendations {
        #[arg(long, help = "Only list idle namespaces")]
        idle: bool,
    },
    #[command(about = "Write the current namespace costs to stdout")]
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
    },
    #[command(about = "Delete history older than the given number of days")]
    Prune {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let json = cli.json;
    let addr = cli.addr;

    match cli.command {
        Commands::Serve {
            db_path,
            listen_addr,
            source,
        } => run_server(db_path, listen_addr, source).await,
        Commands::Namespaces { no_save } => {
            let client = cli_client(addr);
            let v: CostsResponse = client
                .get("/api/namespaces", &[("save_history", (!no_save).to_string())])
                .await?;
            emit(&v, json, print_costs_human)
        }
        Commands::Pods { namespace, no_save } => {
            let client = cli_client(addr);
            let mut query = vec![("save_history", (!no_save).to_string())];
            if let Some(ns) = namespace {
                query.push(("namespace", ns));
            }
            let v: CostsResponse = client.get("/api/pods", &query).await?;
            emit(&v, json, print_costs_human)
        }
        Commands::History {
            namespace,
            hours,
            pods,
        } => {
            let client = cli_client(addr);
            let path = if pods {
                "/api/history/pods"
            } else {
                "/api/history/namespaces"
            };
            let mut query = vec![("hours", hours.to_string())];
            if let Some(ns) = namespace {
                query.push(("namespace", ns));
            }
            let v: HistoryResponse = client.get(path, &query).await?;
            emit(&v, json, print_history_human)
        }
        Commands::Trends { hours } => {
            let client = cli_client(addr);
            let v: CostTrends = client
                .get("/api/history/trends", &[("hours", hours.to_string())])
                .await?;
            emit(&v, json, print_trends_human)
        }
        Commands::Top { limit, hours } => {
            let client = cli_client(addr);
            let v: TopNamespacesResponse = client
                .get(
                    "/api/history/top-namespaces",
                    &[("limit", limit.to_string()), ("hours", hours.to_string())],
                )
                .await?;
            emit(&v, json, print_top_human)
        }
        Commands::Forecast {
            days,
            budget,
            seasonal,
        } => {
            let client = cli_client(addr);
            if let Some(budget) = budget {
                let v: BudgetRunway = client
                    .get("/api/forecast/budget-runway", &[("budget", budget.to_string())])
                    .await?;
                emit(&v, json, print_runway_human)
            } else if seasonal {
                let v: SeasonalAnalysis = client.get("/api/forecast/seasonal", &[]).await?;
                print_json(&v)
            } else {
                let v: Forecast = client
                    .get("/api/forecast", &[("days", days.to_string())])
                    .await?;
                emit(&v, json, print_forecast_human)
            }
        }
        Commands::Recommendations { idle } => {
            let client = cli_client(addr);
            if idle {
                let v: IdleResponse = client.get("/api/recommendations/idle", &[]).await?;
                emit(&v, json, print_idle_human)
            } else {
                let v: AnalysisSummary = client.get("/api/recommendations", &[]).await?;
                emit(&v, json, print_recommendations_human)
            }
        }
        Commands::Export { format } => {
            let client = cli_client(addr);
            let path = match format {
                ExportFormat::Csv => "/api/export/namespaces/csv",
                ExportFormat::Json => "/api/export/namespaces/json",
            };
            let body = client.get_text(path).await?;
            print!("{body}");
            Ok(())
        }
        Commands::Prune { days } => {
            let client = cli_client(addr);
            let v: PruneResponse = client
                .post("/api/history/prune", &[("days", days.to_string())])
                .await?;
            emit(&v, json, print_prune_human)
        }
        Commands::Status => {
            let client = cli_client(addr);
            let v: HealthResponse = client.get("/api/health", &[]).await?;
            emit(&v, json, print_status_human)
        }
    }
}

fn cli_client(addr: Option<String>) -> ApiClient {
    init_cli_tracing();
    ApiClient::new(addr)
}

fn emit<T: Serialize>(v: &T, json: bool, human: fn(&T)) -> anyhow::Result<()> {
    if json {
        return print_json(v);
    }
    human(v);
    Ok(())
}

fn print_json<T: Serialize>(v: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

async fn run_server(
    db_path: Option<PathBuf>,
    listen_addr: Option<String>,
    source: Option<String>,
) -> anyhow::Result<()> {
    let mut cfg = Config::load().context("load config")?;
    if let Some(v) = db_path {
        cfg.db_path = v;
    }
    if let Some(v) = listen_addr {
        cfg.listen_addr = v;
    }
    if let Some(v) = source {
        cfg.source = v.parse::<SourceMode>()?;
    }
    anyhow::ensure!(!cfg.poll_interval.is_zero(), "poll_interval must be positive");
    anyhow::ensure!(
        !cfg.retention_interval.is_zero(),
        "retention_interval must be positive"
    );

    init_run_tracing(LogFormat::from_env());

    let store = Store::open(&cfg.db_path).context("open metrics store")?;
    store.initialize().context("initialize metrics store")?;
    let source = costkube_collect::connect(&cfg).await?;
    let collector = Collector::new(source, store.clone(), cfg.pricing.clone());

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("bind {}", cfg.listen_addr))?;

    eprintln!("costkube serve");
    eprintln!("  db: {}", cfg.db_path.display());
    eprintln!("  api: http://{}", cfg.listen_addr);
    eprintln!("  source: {}", collector.source_kind());
    eprintln!(
        "  pricing: {} cpu/core-h={} mem/GB-h={}",
        cfg.pricing.currency, cfg.pricing.cpu_per_core_hour, cfg.pricing.mem_per_gb_hour
    );

    let app = api::router(AppState::new(collector.clone()));
    let server_task = tokio::spawn(async move { axum::serve(listener, app).await });

    let poll_task = cfg
        .save_history
        .then(|| tokio::spawn(poll_loop(collector, cfg.poll_interval)));

    let retention_task = tokio::spawn(retention_loop(
        store.clone(),
        cfg.retention_days,
        cfg.retention_interval,
    ));

    tokio::select! {
        res = server_task => {
            res??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    if let Some(task) = poll_task {
        task.abort();
    }
    retention_task.abort();
    store.close()?;
    shutdown_tracing();
    Ok(())
}

async fn poll_loop(collector: Collector, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match collector.namespace_costs(true).await {
            Ok(report) => {
                log_snapshot("namespace", &report);
            }
            Err(err) => {
                tracing::warn!(error = %err, "namespace poll failed");
                continue;
            }
        }
        match collector.pod_costs(None, true).await {
            Ok(report) => {
                log_snapshot("pod", &report);
            }
            Err(err) => tracing::warn!(error = %err, "pod poll failed"),
        }
    }
}

/// Log the outcome of one polled snapshot. Returns whether it reached history.
fn log_snapshot(family: &str, report: &CostReport) -> bool {
    match &report.persistence {
        Persistence::Persisted { rows } => {
            tracing::debug!(
                family,
                rows,
                skipped = report.skipped_count(),
                "recorded snapshot"
            );
            true
        }
        Persistence::Failed { error } => {
            tracing::warn!(family, error = %error, "snapshot not saved to history");
            false
        }
        Persistence::NotRequested => {
            tracing::debug!(family, samples = report.costs.len(), "snapshot not persisted");
            false
        }
    }
}

async fn retention_loop(store: Store, days: u32, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let store = store.clone();
        match tokio::task::spawn_blocking(move || store.prune_older_than(days)).await {
            Ok(Ok(summary)) if summary.total() > 0 => {
                tracing::info!(deleted = summary.total(), days, "pruned cost history");
            }
            Ok(Ok(_)) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "retention task failed"),
            Err(err) => tracing::warn!(error = %err, "retention task panicked"),
        }
    }
}
