//! Configuration module for the ledger engine.
//!
//! One serde tree split into per-component files, every field with a
//! default so an empty config file is valid. Loaded from an optional
//! file plus `LEDGER_`-prefixed environment overrides
//! (`LEDGER_RECOVERY__MAX_ATTEMPTS=5`).

mod broker;
mod cancellation;
mod ingestion;
mod pnl;
mod reconciliation;
mod recovery;
mod scheduler;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use broker::BrokerConfig;
pub use cancellation::CancellationConfig;
pub use ingestion::IngestionConfig;
pub use pnl::PnlConfig;
pub use reconciliation::ReconciliationConfig;
pub use recovery::RecoveryConfig;
pub use scheduler::SchedulerConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read or parse a configuration source.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Shared data directory of the broker-connected process.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Broker history API settings.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Event ingestion settings.
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// Reconciliation settings.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Cancellation protocol settings.
    #[serde(default)]
    pub cancellation: CancellationConfig,
    /// Auto-recovery sweep settings.
    #[serde(default)]
    pub recovery: RecoveryConfig,
    /// Realized-P&L settings.
    #[serde(default)]
    pub pnl: PnlConfig,
    /// Built-in driver loop intervals.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            broker: BrokerConfig::default(),
            ingestion: IngestionConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            cancellation: CancellationConfig::default(),
            recovery: RecoveryConfig::default(),
            pnl: PnlConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Settings {
    /// Load settings from an optional file path plus environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Load`] if a present source fails to parse.
    pub fn load(path: Option<&str>) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("ledger-engine").required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("LEDGER").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
