//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod check_run;
mod storage;

pub use check_run::{CheckRunConfig, TransferRetryConfig, DEFAULT_PAYMENT_DESTINATION};
pub use storage::{SqliteConfig, StorageConfig, StorageType};

use serde::Deserialize;

use crate::domain::{VestingSchedule, ZeroContributionReason, ZeroContributionReasonTable};
use crate::services::vesting::{VestingError, VestingScheduleRegistry};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "PROFITSHARE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "PROFITSHARE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "PROFITSHARE_LOG";
/// Environment variable selecting the log format (`json` or text).
pub const LOG_FORMAT_ENV_VAR: &str = "PROFITSHARE_LOG_FORMAT";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid vesting configuration: {0}")]
    Vesting(#[from] VestingError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Vesting schedule overrides.
///
/// A configured schedule replaces the seeded schedule with the same id;
/// new ids are added.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VestingConfig {
    pub schedules: Vec<VestingSchedule>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Check-run workflow settings.
    pub check_run: CheckRunConfig,
    /// Payment file transmission back-off.
    pub transfer_retry: TransferRetryConfig,
    /// Vesting schedule overrides.
    pub vesting: VestingConfig,
    /// Zero-contribution reason overrides, merged over the seeded table.
    pub zero_contribution_reasons: Vec<ZeroContributionReason>,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    ///
    /// The loaded configuration is validated before it is returned.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vesting_registry()?;
        if self.transfer_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "transfer_retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.transfer_retry.min_delay_ms > self.transfer_retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "transfer_retry.min_delay_ms exceeds max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Seeded schedules with the configured overrides applied.
    pub fn vesting_registry(&self) -> Result<VestingScheduleRegistry, VestingError> {
        let mut schedules = vec![VestingSchedule::old_plan(), VestingSchedule::new_plan()];
        for schedule in &self.vesting.schedules {
            schedules.retain(|s| s.id != schedule.id);
            schedules.push(schedule.clone());
        }
        VestingScheduleRegistry::new(schedules)
    }

    /// Seeded zero-contribution reasons with the configured overrides applied.
    pub fn reason_table(&self) -> ZeroContributionReasonTable {
        let mut reasons: Vec<ZeroContributionReason> = ZeroContributionReasonTable::seeded()
            .iter()
            .filter(|seeded| !self.zero_contribution_reasons.iter().any(|r| r.id == seeded.id))
            .cloned()
            .collect();
        reasons.extend(self.zero_contribution_reasons.iter().cloned());
        ZeroContributionReasonTable::new(reasons)
    }
}
