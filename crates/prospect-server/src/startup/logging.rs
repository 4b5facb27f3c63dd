//! File-based logging with per-component files.
//!
//! Every event reaches the console (optional) and the root file; component
//! files receive only the events whose `tracing` target they route:
//!
//! | Log File            | Component                           | Target Prefixes                 |
//! |---------------------|-------------------------------------|---------------------------------|
//! | prospect-sync.log   | Root logger (all components)        | (all)                           |
//! | sync.log            | Pollers, sagas, dispatchers         | prospect_sync                   |
//! | persistence.log     | Source and target databases         | prospect_persistence            |
//! | compensation.log    | Rollbacks that left residue         | prospect_sync::compensation     |
//! | dead-letter.log     | Entries dropped after retries       | prospect_sync::dead_letter      |
//!
//! Log files are stored in `~/prospect-sync/logs` by default.
//! Override with `PROSPECT_LOG_DIR` or the `logging.dir` config key.

use std::path::PathBuf;

use prospect_sync::{COMPENSATION_TARGET, DEAD_LETTER_TARGET};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const ROOT_LOG_FILE: &str = "prospect-sync.log";

// ---------------------------------------------------------------------------
// Component log file definitions
// ---------------------------------------------------------------------------

struct ComponentLogDef {
    /// Log file name (e.g. "sync.log")
    file_name: &'static str,
    /// Target module prefixes routed to this file
    targets: &'static [&'static str],
}

const COMPONENT_LOGS: &[ComponentLogDef] = &[
    ComponentLogDef {
        file_name: "sync.log",
        targets: &["prospect_sync"],
    },
    ComponentLogDef {
        file_name: "persistence.log",
        targets: &["prospect_persistence"],
    },
    ComponentLogDef {
        file_name: "compensation.log",
        targets: &[COMPENSATION_TARGET],
    },
    ComponentLogDef {
        file_name: "dead-letter.log",
        targets: &[DEAD_LETTER_TARGET],
    },
];

// ---------------------------------------------------------------------------
// Log rotation policy
// ---------------------------------------------------------------------------

/// Log rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    /// Rotate daily (default)
    Daily,
    /// Rotate hourly
    Hourly,
    /// Never rotate (single file)
    Never,
}

impl LogRotation {
    /// Parse a rotation name; unknown names fall back to daily.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => LogRotation::Hourly,
            "never" => LogRotation::Never,
            _ => LogRotation::Daily,
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging configuration
// ---------------------------------------------------------------------------

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{}/prospect-sync/logs", home))
}

/// Logging configuration for the entire application.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Base log directory (default: `~/prospect-sync/logs`)
    pub log_dir: PathBuf,
    /// Enable console output
    pub console_output: bool,
    /// Console log level
    pub console_level: Level,
    /// Enable file logging
    pub file_logging: bool,
    /// Default log level for the root file
    pub file_level: Level,
    /// Log rotation policy
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            console_output: true,
            console_level: Level::INFO,
            file_logging: false,
            file_level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

impl LoggingConfig {
    /// Create from application configuration.
    ///
    /// `PROSPECT_LOG_DIR`, `PROSPECT_LOG_LEVEL`, `PROSPECT_LOG_CONSOLE` and
    /// `PROSPECT_LOG_FILE` take precedence over the configured values.
    pub fn from_config(
        log_dir: Option<String>,
        console_output: bool,
        file_logging: bool,
        level: String,
        rotation: LogRotation,
    ) -> Self {
        let log_dir = std::env::var("PROSPECT_LOG_DIR")
            .ok()
            .or(log_dir)
            .map(PathBuf::from)
            .unwrap_or_else(default_log_dir);

        let level = std::env::var("PROSPECT_LOG_LEVEL")
            .ok()
            .and_then(|v| v.parse().ok())
            .or_else(|| level.parse().ok())
            .unwrap_or(Level::INFO);

        let console_output = std::env::var("PROSPECT_LOG_CONSOLE")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(console_output);

        let file_logging = std::env::var("PROSPECT_LOG_FILE")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(file_logging);

        Self {
            log_dir,
            console_output,
            console_level: level,
            file_logging,
            file_level: level,
            rotation,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging guard
// ---------------------------------------------------------------------------

/// Keeps the non-blocking file writers alive.
///
/// Dropping it flushes all buffered log output, so `main` holds it until exit.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Initialize the logging system with multi-file output.
///
/// This sets up:
/// - Console output (optional, human-readable format with colors)
/// - Root log file `prospect-sync.log` that captures **all** events
/// - Component log files with target-based routing (see [`COMPONENT_LOGS`])
///
/// `RUST_LOG` controls the level of the console and the root file. Component
/// files capture everything from their targets.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;
    }

    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_string()));
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(filter);
        layers.push(Box::new(console_layer));
    }

    if config.file_logging {
        let root_appender =
            RollingFileAppender::new(config.rotation.into(), &config.log_dir, ROOT_LOG_FILE);
        let (root_nb, root_guard) = tracing_appender::non_blocking(root_appender);
        guards.push(root_guard);

        let root_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.file_level.to_string()));
        let root_layer = fmt::layer()
            .with_writer(root_nb)
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false)
            .with_filter(root_filter);
        layers.push(Box::new(root_layer));

        for component in COMPONENT_LOGS {
            let appender = RollingFileAppender::new(
                config.rotation.into(),
                &config.log_dir,
                component.file_name,
            );
            let (nb, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);

            let layer = fmt::layer()
                .with_writer(nb)
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_filter(component_targets(component));
            layers.push(Box::new(layer));
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if config.file_logging {
        tracing::info!(
            log_dir = %config.log_dir.display(),
            component_files = COMPONENT_LOGS.len(),
            "File logging initialized: {} (root) + {} component log files",
            ROOT_LOG_FILE,
            COMPONENT_LOGS.len()
        );
    }

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}

fn component_targets(component: &ComponentLogDef) -> Targets {
    component
        .targets
        .iter()
        .fold(Targets::new(), |targets, target| {
            targets.with_target(*target, LevelFilter::TRACE)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.console_output);
        assert!(!config.file_logging);
        assert_eq!(config.console_level, Level::INFO);
        assert_eq!(config.rotation, LogRotation::Daily);
    }

    #[test]
    fn test_log_rotation_conversion() {
        assert!(matches!(
            Rotation::from(LogRotation::Daily),
            Rotation::DAILY
        ));
        assert!(matches!(
            Rotation::from(LogRotation::Hourly),
            Rotation::HOURLY
        ));
        assert!(matches!(
            Rotation::from(LogRotation::Never),
            Rotation::NEVER
        ));
    }

    #[test]
    fn test_log_rotation_parse() {
        assert_eq!(LogRotation::parse("HOURLY"), LogRotation::Hourly);
        assert_eq!(LogRotation::parse("never"), LogRotation::Never);
        assert_eq!(LogRotation::parse("weekly"), LogRotation::Daily);
    }

    #[test]
    fn test_component_log_definitions() {
        for component in COMPONENT_LOGS {
            assert!(
                component.file_name.ends_with(".log"),
                "Log file name should end with .log: {}",
                component.file_name
            );
            assert!(
                !component.targets.is_empty(),
                "Component {} should have at least one target",
                component.file_name
            );
        }
    }

    #[test]
    fn test_reports_routed_to_their_own_files() {
        let file_for = |target: &str| {
            COMPONENT_LOGS
                .iter()
                .find(|c| c.targets.contains(&target))
                .map(|c| c.file_name)
        };
        assert_eq!(file_for("prospect_sync::compensation"), Some("compensation.log"));
        assert_eq!(file_for("prospect_sync::dead_letter"), Some("dead-letter.log"));
    }

    #[test]
    fn test_component_targets_route_by_prefix() {
        let sync = &COMPONENT_LOGS[0];
        let targets = component_targets(sync);
        assert!(targets.would_enable("prospect_sync::saga::insert", &Level::DEBUG));
        assert!(!targets.would_enable("prospect_persistence::sql", &Level::ERROR));
    }
}
