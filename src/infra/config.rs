//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::fare::{FarePolicy, RateTable};
use crate::services::pool::{Inventory, MAX_SPOTS};
use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct LotConfig {
    #[serde(default = "default_lot_id")]
    pub id: String,
}

impl Default for LotConfig {
    fn default() -> Self {
        Self { id: default_lot_id() }
    }
}

fn default_lot_id() -> String {
    "lot".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FareConfig {
    #[serde(default)]
    pub policy: FarePolicy,
    #[serde(default)]
    pub rates: RateTable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

/// Traffic generated by the demo binary
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_sim_vehicles")]
    pub vehicles: usize,
    #[serde(default = "default_sim_arrival_interval_ms")]
    pub arrival_interval_ms: u64,
    #[serde(default = "default_sim_stay_ms")]
    pub stay_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            vehicles: default_sim_vehicles(),
            arrival_interval_ms: default_sim_arrival_interval_ms(),
            stay_ms: default_sim_stay_ms(),
        }
    }
}

fn default_sim_vehicles() -> usize {
    8
}

fn default_sim_arrival_interval_ms() -> u64 {
    200
}

fn default_sim_stay_ms() -> u64 {
    1500
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub lot: LotConfig,
    pub inventory: Inventory,
    #[serde(default)]
    pub fare: FareConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub sim: SimConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    lot_id: String,
    inventory: Inventory,
    fare_policy: FarePolicy,
    rates: RateTable,
    metrics_interval_secs: u64,
    sim_vehicles: usize,
    sim_arrival_interval_ms: u64,
    sim_stay_ms: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        let sim = SimConfig::default();
        Self {
            lot_id: default_lot_id(),
            inventory: Inventory::new(2, 2, 1),
            fare_policy: FarePolicy::Base,
            rates: RateTable::default(),
            metrics_interval_secs: default_metrics_interval(),
            sim_vehicles: sim.vehicles,
            sim_arrival_interval_ms: sim.arrival_interval_ms,
            sim_stay_ms: sim.stay_ms,
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        match toml_config.inventory.total() {
            Some(0) => bail!("Config file {} declares an empty inventory", path.display()),
            Some(total) if total <= MAX_SPOTS => {}
            _ => bail!("Config file {} declares more than {} spots", path.display(), MAX_SPOTS),
        }
        for rate in [toml_config.fare.rates.small, toml_config.fare.rates.medium, toml_config.fare.rates.large] {
            if !rate.is_finite() || rate < 0.0 {
                bail!("Config file {} has invalid hourly rate {}", path.display(), rate);
            }
        }

        Ok(Self {
            lot_id: toml_config.lot.id,
            inventory: toml_config.inventory,
            fare_policy: toml_config.fare.policy,
            rates: toml_config.fare.rates,
            metrics_interval_secs: toml_config.metrics.interval_secs.max(1),
            sim_vehicles: toml_config.sim.vehicles,
            sim_arrival_interval_ms: toml_config.sim.arrival_interval_ms,
            sim_stay_ms: toml_config.sim.stay_ms,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn lot_id(&self) -> &str {
        &self.lot_id
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn fare_policy(&self) -> FarePolicy {
        self.fare_policy
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn sim_vehicles(&self) -> usize {
        self.sim_vehicles
    }

    pub fn sim_arrival_interval_ms(&self) -> u64 {
        self.sim_arrival_interval_ms
    }

    pub fn sim_stay_ms(&self) -> u64 {
        self.sim_stay_ms
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}
