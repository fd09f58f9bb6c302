// Settings layered defaults < config file < FEED__* env < CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

#[derive(Parser, Debug, Default, Clone)]
#[command(name = "tick-feed", version, about = "Simulated stock price and order book feed over WebSockets")]
pub struct Cli {
    /// Optional settings file (toml, json or yaml)
    #[arg(long, default_value = "feed.toml")]
    pub config: PathBuf,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,
    /// Instrument catalog (.json or .csv)
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    #[arg(long)]
    pub tick_interval_ms: Option<u64>,
    /// Fixed RNG seed for a reproducible price walk
    #[arg(long)]
    pub seed: Option<u64>,
    /// Log filter, e.g. "info,tick_feed=debug"
    #[arg(long)]
    pub log: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub catalog: CatalogSettings,
    pub simulation: SimulationSettings,
    pub feed: FeedSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Prometheus scrape port, only bound with the `metrics-exporter` feature.
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationSettings {
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    /// Per-subscriber outbound queue depth.
    pub send_queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub filter: String,
}

impl Settings {
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.metrics_port", 9000)?
            .set_default("catalog.path", "stocks.json")?
            .set_default("simulation.tick_interval_ms", 1000)?
            .set_default("feed.send_queue_capacity", 64)?
            .set_default("log.filter", "info")?
            .add_source(File::from(cli.config.as_path()).required(false))
            .add_source(
                Environment::with_prefix("FEED")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", cli.host.clone())?
            .set_override_option("server.port", cli.port.map(i64::from))?
            .set_override_option("catalog.path", cli.catalog.as_ref().map(|p| p.display().to_string()))?
            .set_override_option("simulation.tick_interval_ms", cli.tick_interval_ms)?
            .set_override_option("simulation.seed", cli.seed)?
            .set_override_option("log.filter", cli.log.clone())?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "simulation.tick_interval_ms",
                reason: "must be greater than zero",
            });
        }
        if self.feed.send_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "feed.send_queue_capacity",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.simulation.tick_interval_ms)
    }
}
