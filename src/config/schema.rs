use crate::error::ConfigError;
use crate::retention::{KeepSet, MembershipFallback, SchemaDescriptor, StoreOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - resolved at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// SQLite database the run operates on
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Principals to keep; everything else is swept
    #[serde(default)]
    pub keep: Vec<String>,

    #[serde(default)]
    pub membership_fallback: MembershipFallback,

    /// Write a `VACUUM INTO` snapshot here before a live run
    #[serde(default)]
    pub backup_path: Option<PathBuf>,

    #[serde(default)]
    pub store: StoreConfig,

    /// Ownership graph; defaults to the built-in Synapse descriptor
    #[serde(default)]
    pub schema: SchemaDescriptor,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("/data/homeserver.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            database_path: default_database_path(),
            keep: Vec::new(),
            membership_fallback: MembershipFallback::default(),
            backup_path: None,
            store: StoreConfig::default(),
            schema: SchemaDescriptor::default(),
        }
    }
}

impl Config {
    pub fn keep_set(&self) -> Result<KeepSet, ConfigError> {
        KeepSet::new(self.keep.iter().cloned()).map_err(|err| {
            ConfigError::Validation(format!("keep: {err} (set `keep` in config, KEEPSWEEP_KEEP or --keep)"))
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.keep_set()?;
        self.schema
            .validate()
            .map_err(|err| ConfigError::Validation(format!("schema: {err}")))?;
        if self.store.busy_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "store.busy_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.store.busy_timeout_ms),
            enforce_foreign_keys: self.store.enforce_foreign_keys,
        }
    }
}

// ── Store connection ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How long to wait for the write lock when the run starts
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Turn on `PRAGMA foreign_keys` for the run's connection
    #[serde(default = "default_true")]
    pub enforce_foreign_keys: bool,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
            enforce_foreign_keys: true,
        }
    }
}
