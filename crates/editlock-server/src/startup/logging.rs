//! File-based logging with per-component routing.
//!
//! Every event goes to the console (optional) and to the root file; events
//! from specific crates are additionally copied to their own rolling file:
//!
//! | Log File           | Component                     | Target Prefixes          |
//! |--------------------|-------------------------------|--------------------------|
//! | editlock.log       | Root logger (all components)  | (all)                    |
//! | lock-manager.log   | Lock manager, store, sweeper  | editlock_core            |
//! | lock-http.log      | HTTP handlers                 | editlock_server::api     |
//! | persistence.log    | Database lock store           | editlock_persistence     |
//! | lock-client.log    | Client SDK / controller       | editlock_client          |
//!
//! Log files are stored in `~/editlock/logs` by default.
//! Override with `EDITLOCK_LOG_DIR` or the `editlock.logs.path` config key.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const ROOT_LOG_FILE: &str = "editlock.log";

struct ComponentLogDef {
    file_name: &'static str,
    targets: &'static [&'static str],
}

const COMPONENT_LOGS: &[ComponentLogDef] = &[
    ComponentLogDef {
        file_name: "lock-manager.log",
        targets: &["editlock_core"],
    },
    ComponentLogDef {
        file_name: "lock-http.log",
        targets: &["editlock_server::api", "actix_web::middleware::logger"],
    },
    ComponentLogDef {
        file_name: "persistence.log",
        targets: &["editlock_persistence", "sea_orm"],
    },
    ComponentLogDef {
        file_name: "lock-client.log",
        targets: &["editlock_client"],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
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

impl LogRotation {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "daily" => Some(LogRotation::Daily),
            "hourly" => Some(LogRotation::Hourly),
            "never" => Some(LogRotation::Never),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub console_output: bool,
    pub console_level: Level,
    pub file_logging: bool,
    pub file_level: Level,
    pub rotation: LogRotation,
}

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{}/editlock/logs", home))
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            console_output: true,
            console_level: Level::INFO,
            file_logging: true,
            file_level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

impl LoggingConfig {
    /// Read `EDITLOCK_LOG_*` environment variables over the defaults
    pub fn from_env() -> Self {
        let log_dir = std::env::var("EDITLOCK_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_log_dir());

        let console_output = std::env::var("EDITLOCK_LOG_CONSOLE")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        let file_logging = std::env::var("EDITLOCK_LOG_FILE")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(true);

        let console_level = std::env::var("EDITLOCK_LOG_LEVEL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Level::INFO);

        let file_level = std::env::var("EDITLOCK_LOG_FILE_LEVEL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(console_level);

        let rotation = std::env::var("EDITLOCK_LOG_ROTATION")
            .ok()
            .and_then(|v| LogRotation::parse(&v))
            .unwrap_or(LogRotation::Daily);

        Self {
            log_dir,
            console_output,
            console_level,
            file_logging,
            file_level,
            rotation,
        }
    }

    /// Apply values from application configuration; `None` keeps the current value
    pub fn with_overrides(
        mut self,
        log_dir: Option<String>,
        console_output: Option<bool>,
        file_logging: Option<bool>,
        level: Option<String>,
        rotation: Option<String>,
    ) -> Self {
        if let Some(dir) = log_dir {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(console) = console_output {
            self.console_output = console;
        }
        if let Some(file) = file_logging {
            self.file_logging = file;
        }
        if let Some(level) = level.and_then(|l| l.parse::<Level>().ok()) {
            self.console_level = level;
            self.file_level = level;
        }
        if let Some(rotation) = rotation.as_deref().and_then(LogRotation::parse) {
            self.rotation = rotation;
        }
        self
    }
}

/// Keeps the non-blocking file writers alive; buffered output is flushed on drop.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

/// Install the global subscriber.
///
/// All filtering is per-layer: console and root file follow `RUST_LOG` (or
/// the configured level), component files capture everything from their
/// targets.
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
            .with_file(true)
            .with_line_number(true)
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

            let targets = component
                .targets
                .iter()
                .fold(Targets::new(), |t, target| {
                    t.with_target(*target, LevelFilter::TRACE)
                });

            let layer = fmt::layer()
                .with_writer(nb)
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_filter(targets);
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
            "File logging initialized: {} (root) + {} component log files",
            ROOT_LOG_FILE,
            COMPONENT_LOGS.len()
        );
    }

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.console_output);
        assert!(config.file_logging);
        assert_eq!(config.file_level, Level::INFO);
        assert!(config.log_dir.ends_with("editlock/logs"));
    }

    #[test]
    fn test_overrides_apply_only_present_values() {
        let config = LoggingConfig::default().with_overrides(
            Some("/tmp/editlock-test-logs".to_string()),
            Some(false),
            None,
            Some("debug".to_string()),
            Some("hourly".to_string()),
        );
        assert_eq!(config.log_dir, PathBuf::from("/tmp/editlock-test-logs"));
        assert!(!config.console_output);
        assert!(config.file_logging);
        assert_eq!(config.console_level, Level::DEBUG);
        assert_eq!(config.rotation, LogRotation::Hourly);

        let unchanged = LoggingConfig::default().with_overrides(
            None,
            None,
            None,
            Some("loud".to_string()),
            Some("weekly".to_string()),
        );
        assert_eq!(unchanged.console_level, Level::INFO);
        assert_eq!(unchanged.rotation, LogRotation::Daily);
    }

    #[test]
    fn test_component_log_definitions() {
        for component in COMPONENT_LOGS {
            assert!(component.file_name.ends_with(".log"));
            assert!(!component.targets.is_empty());
            assert_ne!(component.file_name, ROOT_LOG_FILE);
        }
    }
}
