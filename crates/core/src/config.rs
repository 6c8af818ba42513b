use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CostError, Result};
use crate::model::cost::PricingConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Live cluster when one is reachable, simulated otherwise.
    #[default]
    Auto,
    Kube,
    Simulated,
    Static,
}

impl FromStr for SourceMode {
    type Err = CostError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "kube" | "k8s" | "live" => Ok(Self::Kube),
            "simulated" | "sim" => Ok(Self::Simulated),
            "static" | "demo" => Ok(Self::Static),
            _ => Err(CostError::Config(format!("unknown source mode: {s}"))),
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Kube => "kube",
            Self::Simulated => "simulated",
            Self::Static => "static",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub listen_addr: String,
    pub source: SourceMode,
    pub static_source_path: PathBuf,
    pub poll_interval: Duration,
    pub save_history: bool,
    pub retention_days: u32,
    pub retention_interval: Duration,
    pub pricing: PricingConfig,
}

impl Default for Config {
    fn default() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let data_root = env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(home).join(".local/share"));

        Self {
            db_path: data_root.join("costkube/costkube.duckdb"),
            listen_addr: "127.0.0.1:8000".to_string(),
            source: SourceMode::Auto,
            static_source_path: PathBuf::from("sample_data/demo_metrics.json"),
            poll_interval: Duration::from_secs(5 * 60),
            save_history: true,
            retention_days: 30,
            retention_interval: Duration::from_secs(60 * 60),
            pricing: PricingConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        cfg.pricing.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(file_overrides) = load_file_overrides(path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        cfg.pricing.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    db_path: Option<PathBuf>,
    listen_addr: Option<String>,
    source: Option<String>,
    static_source_path: Option<PathBuf>,
    poll_interval: Option<String>,
    save_history: Option<bool>,
    retention_days: Option<u32>,
    retention_interval: Option<String>,
    #[serde(default)]
    pricing: PricingOverrides,
}

#[derive(Debug, Default, Deserialize)]
struct PricingOverrides {
    currency: Option<String>,
    cpu_per_core_hour: Option<f64>,
    mem_per_gb_hour: Option<f64>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("COSTKUBE_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("costkube/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| CostError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| CostError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    Ok(ConfigOverrides {
        db_path: env::var("COSTKUBE_DB_PATH").ok().map(PathBuf::from),
        listen_addr: env::var("COSTKUBE_LISTEN_ADDR").ok(),
        source: env::var("COSTKUBE_SOURCE").ok(),
        static_source_path: env::var("COSTKUBE_STATIC_SOURCE_PATH").ok().map(PathBuf::from),
        poll_interval: env::var("COSTKUBE_POLL_INTERVAL").ok(),
        save_history: env_parsed("COSTKUBE_SAVE_HISTORY")?,
        retention_days: env_parsed("COSTKUBE_RETENTION_DAYS")?,
        retention_interval: env::var("COSTKUBE_RETENTION_INTERVAL").ok(),
        pricing: PricingOverrides {
            currency: env::var("COSTKUBE_CURRENCY").ok(),
            cpu_per_core_hour: env_parsed("COSTKUBE_CPU_PER_CORE_HOUR")?,
            mem_per_gb_hour: env_parsed("COSTKUBE_MEM_PER_GB_HOUR")?,
        },
    })
}

fn env_parsed<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| CostError::Config(format!("bad {key} in environment: {e}"))),
        Err(_) => Ok(None),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.db_path {
        cfg.db_path = v;
    }
    if let Some(v) = overrides.listen_addr {
        cfg.listen_addr = v;
    }
    if let Some(v) = overrides.source {
        cfg.source = v.parse().map_err(|e| {
            CostError::Config(format!("bad source in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.static_source_path {
        cfg.static_source_path = v;
    }
    if let Some(v) = overrides.poll_interval {
        cfg.poll_interval = humantime::parse_duration(&v).map_err(|e| {
            CostError::Config(format!("bad poll_interval in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.save_history {
        cfg.save_history = v;
    }
    if let Some(v) = overrides.retention_days {
        cfg.retention_days = v;
    }
    if let Some(v) = overrides.retention_interval {
        cfg.retention_interval = humantime::parse_duration(&v).map_err(|e| {
            CostError::Config(format!("bad retention_interval in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.pricing.currency {
        cfg.pricing.currency = v;
    }
    if let Some(v) = overrides.pricing.cpu_per_core_hour {
        cfg.pricing.cpu_per_core_hour = v;
    }
    if let Some(v) = overrides.pricing.mem_per_gb_hour {
        cfg.pricing.mem_per_gb_hour = v;
    }
    Ok(())
}
