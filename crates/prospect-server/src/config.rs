//! Configuration management for the reconciliation service
//!
//! Sources, lowest precedence first: `conf/application.yml` (or `--config`),
//! `PROSPECT.*` environment variables, command line overrides.

use clap::Parser;
use config::{Config, Environment};
use prospect_common::{SyncError, SyncResult};
use prospect_sync::EngineSettings;

use crate::schedule::Trigger;
use crate::startup::{LogRotation, LoggingConfig};

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";
pub const DEFAULT_BEAT_HOURS: u64 = 12;

const PROFILE_PROPERTY: &str = "profile";
const PROFILE_PROD: &str = "prod";
const BEAT_HOURS_PROPERTY: &str = "schedule.beat_hours";
const CRON_PROPERTY: &str = "schedule.cron";
const RUN_ON_STARTUP_PROPERTY: &str = "schedule.run_on_startup";
const ONCE_PROPERTY: &str = "schedule.once";

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "prospect-sync", version, about = "Change-log driven document reconciliation")]
pub struct Cli {
    /// Configuration file
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    config: String,
    /// Deployment profile (dev or prod)
    #[arg(short = 'p', long = "profile")]
    profile: Option<String>,
    /// Run a single cycle and exit
    #[arg(long = "once")]
    once: bool,
    #[arg(long = "target-db-url", env = "PROSPECT_TARGET_DB_URL")]
    target_database_url: Option<String>,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn new() -> anyhow::Result<Self> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(args: Cli) -> anyhow::Result<Self> {
        let mut config_builder = Config::builder()
            .add_source(config::File::with_name(&args.config))
            .add_source(
                Environment::with_prefix("prospect")
                    .separator(".")
                    .try_parsing(true),
            );

        if let Some(v) = args.profile {
            config_builder = config_builder.set_override(PROFILE_PROPERTY, v)?;
        }
        if args.once {
            config_builder = config_builder.set_override(ONCE_PROPERTY, true)?;
        }
        if let Some(v) = args.target_database_url {
            config_builder = config_builder.set_override("target.db.url", v)?;
        }

        let app_config = config_builder.build().map_err(|e| {
            anyhow::anyhow!("Failed to build configuration from {}: {}", args.config, e)
        })?;

        Ok(Configuration { config: app_config })
    }

    // ========================================================================
    // Deployment
    // ========================================================================

    pub fn profile(&self) -> String {
        self.config
            .get_string(PROFILE_PROPERTY)
            .unwrap_or("dev".to_string())
    }

    pub fn is_prod(&self) -> bool {
        self.profile() == PROFILE_PROD
    }

    // ========================================================================
    // Schedule
    // ========================================================================

    pub fn beat_hours(&self) -> u64 {
        self.config
            .get_int(BEAT_HOURS_PROPERTY)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(DEFAULT_BEAT_HOURS)
    }

    pub fn cron_expression(&self) -> Option<String> {
        self.config
            .get_string(CRON_PROPERTY)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    pub fn run_on_startup(&self) -> bool {
        self.config.get_bool(RUN_ON_STARTUP_PROPERTY).unwrap_or(true)
    }

    pub fn once(&self) -> bool {
        self.config.get_bool(ONCE_PROPERTY).unwrap_or(false)
    }

    /// The trigger: `once` wins, then a cron expression, then the beat.
    pub fn trigger(&self) -> SyncResult<Trigger> {
        if self.once() {
            return Ok(Trigger::Once);
        }
        match self.cron_expression() {
            Some(expression) => Trigger::cron(&expression),
            None => Trigger::every_hours(self.beat_hours()),
        }
    }

    // ========================================================================
    // Engine
    // ========================================================================

    /// Sync, target and region settings, validated.
    pub fn engine_settings(&self) -> SyncResult<EngineSettings> {
        let settings: EngineSettings = self
            .config
            .clone()
            .try_deserialize()
            .map_err(|e| SyncError::configuration(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    // ========================================================================
    // Logging
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.config.get_string("logging.dir").ok(),
            self.config.get_bool("logging.console").unwrap_or(true),
            self.config.get_bool("logging.file").unwrap_or(self.is_prod()),
            self.config
                .get_string("logging.level")
                .unwrap_or("info".to_string()),
            self.config
                .get_string("logging.rotation")
                .map(|v| LogRotation::parse(&v))
                .unwrap_or(LogRotation::Daily),
        )
    }
}
