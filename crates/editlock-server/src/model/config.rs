//! Configuration management for the lock server
//!
//! Sources, lowest precedence first: `conf/application.yml` (optional),
//! `EDITLOCK_`-prefixed environment variables, command line flags.

use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigError, Environment};

use editlock_common::LockError;
use editlock_core::LockSettings;
use editlock_core::settings::{
    DEFAULT_HEARTBEAT_INTERVAL_SECONDS, DEFAULT_STATUS_POLL_INTERVAL_SECONDS, DEFAULT_TTL_SECONDS,
};

use crate::startup::LoggingConfig;

pub const SERVER_ADDRESS: &str = "server.address";
pub const SERVER_PORT: &str = "server.port";
pub const LOCK_TTL_SECONDS: &str = "lock.ttlSeconds";
pub const LOCK_HEARTBEAT_INTERVAL_SECONDS: &str = "lock.heartbeatIntervalSeconds";
pub const LOCK_STATUS_POLL_INTERVAL_SECONDS: &str = "lock.statusPollIntervalSeconds";
pub const LOCK_AUTO_ACQUIRE_ON_MOUNT: &str = "lock.autoAcquireOnMount";
pub const LOCK_AUTO_RELEASE_ON_TEARDOWN: &str = "lock.autoReleaseOnTeardown";
pub const LOCK_STORE: &str = "lock.store";
pub const LOCK_SWEEPER_ENABLED: &str = "lock.sweeper.enabled";
pub const LOCK_SWEEPER_INTERVAL_SECONDS: &str = "lock.sweeper.intervalSeconds";
pub const DB_URL: &str = "db.url";
pub const DB_POOL_MAX_CONNECTIONS: &str = "db.pool.maxConnections";

pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_SWEEPER_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Command line arguments for the server
#[derive(Debug, Default, Parser)]
#[command(name = "editlock-server", about = "Collaborative resource lock server")]
pub struct Cli {
    /// Configuration file (extension optional)
    #[arg(short = 'c', long = "config", default_value = "conf/application")]
    pub config_file: String,
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,
    /// Lock store backend: memory | database
    #[arg(short = 's', long = "store")]
    pub store: Option<String>,
    #[arg(long = "db-url", env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

/// Which `LockStore` backs the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Database,
}

impl FromStr for StoreKind {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "database" | "db" => Ok(StoreKind::Database),
            other => Err(LockError::Configuration(format!(
                "unknown {} '{}', expected memory or database",
                LOCK_STORE, other
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load from the process command line
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(args: Cli) -> Result<Self, ConfigError> {
        Self::from_sources(args, Environment::with_prefix("editlock"))
    }

    fn from_sources(args: Cli, environment: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(config::File::with_name(&args.config_file).required(false))
            .add_source(
                environment
                    .prefix_separator("_")
                    .separator(".")
                    .try_parsing(true),
            );

        if let Some(port) = args.port {
            builder = builder.set_override(SERVER_PORT, port as i64)?;
        }
        if let Some(store) = args.store {
            builder = builder.set_override(LOCK_STORE, store)?;
        }
        if let Some(url) = args.database_url {
            builder = builder.set_override(DB_URL, url)?;
        }

        Ok(Configuration {
            config: builder.build()?,
        })
    }

    pub fn from_config(config: Config) -> Self {
        Configuration { config }
    }

    // Environment variables arrive lowercased (`lock.ttlseconds`) while files
    // keep camelCase keys, so each lookup tries the lowercased key first.
    fn lookup<T>(
        &self,
        key: &str,
        get: impl Fn(&Config, &str) -> Result<T, ConfigError>,
    ) -> Option<T> {
        let lowered = key.to_ascii_lowercase();
        get(&self.config, &lowered)
            .ok()
            .or_else(|| get(&self.config, key).ok())
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.lookup(key, |c, k| c.get_int(k))
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.lookup(key, |c, k| c.get_bool(k))
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.lookup(key, |c, k| c.get_string(k))
    }

    // ========================================================================
    // Server
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.get_string(SERVER_ADDRESS)
            .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.get_int(SERVER_PORT)
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    // ========================================================================
    // Lock timing
    // ========================================================================

    fn seconds(&self, key: &str, default: u64) -> u64 {
        self.get_int(key)
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(default)
    }

    pub fn lock_settings(&self) -> LockSettings {
        LockSettings::from_seconds(
            self.seconds(LOCK_TTL_SECONDS, DEFAULT_TTL_SECONDS),
            self.seconds(
                LOCK_HEARTBEAT_INTERVAL_SECONDS,
                DEFAULT_HEARTBEAT_INTERVAL_SECONDS,
            ),
            self.seconds(
                LOCK_STATUS_POLL_INTERVAL_SECONDS,
                DEFAULT_STATUS_POLL_INTERVAL_SECONDS,
            ),
        )
        .with_auto_acquire_on_mount(
            self.get_bool(LOCK_AUTO_ACQUIRE_ON_MOUNT).unwrap_or(false),
        )
        .with_auto_release_on_teardown(
            self.get_bool(LOCK_AUTO_RELEASE_ON_TEARDOWN).unwrap_or(true),
        )
    }

    // ========================================================================
    // Store
    // ========================================================================

    pub fn store_kind(&self) -> Result<StoreKind, LockError> {
        match self.get_string(LOCK_STORE) {
            Some(value) => value.parse(),
            None => Ok(StoreKind::Memory),
        }
    }

    pub fn sweeper_enabled(&self) -> bool {
        self.get_bool(LOCK_SWEEPER_ENABLED).unwrap_or(true)
    }

    pub fn sweeper_interval(&self) -> Duration {
        Duration::from_secs(
            self.seconds(
                LOCK_SWEEPER_INTERVAL_SECONDS,
                DEFAULT_SWEEPER_INTERVAL_SECONDS,
            )
            .max(1),
        )
    }

    pub fn database_url(&self) -> Option<String> {
        self.get_string(DB_URL)
            .filter(|url| !url.is_empty())
    }

    pub fn db_max_connections(&self) -> u32 {
        self.get_int(DB_POOL_MAX_CONNECTIONS)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
    }

    // ========================================================================
    // Logging
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_env().with_overrides(
            self.get_string("editlock.logs.path"),
            self.get_bool("editlock.logs.console"),
            self.get_bool("editlock.logs.file"),
            self.get_string("editlock.logs.level"),
            self.get_string("editlock.logs.rotation"),
        )
    }
}
