//! # Engine Configuration
//!
//! Configuration management for the Kanvas engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KANVAS_DB_PATH=/srv/kanvas/kanvas.db                               │
//! │     KANVAS_UTC_OFFSET_MINUTES=420                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/kanvas/kanvas.toml (Linux)                               │
//! │     ~/Library/Application Support/id.kanvas.kanvas/kanvas.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     ./kanvas.db, UTC calendar, registered debt allowed                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # kanvas.toml
//! [database]
//! path = "/srv/kanvas/kanvas.db"
//! max_connections = 5
//!
//! [calendar]
//! utc_offset_minutes = 420   # WIB; the daily cap resets at local midnight
//!
//! [settlement]
//! allow_registered_debt = true
//!
//! [codes]
//! expedition_prefix = "EXP"
//! order_prefix = "SO"
//! ```

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

/// Where the SQLite file lives and how the pool is sized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kanvas.db")
}
fn default_max_connections() -> u32 {
    5
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Calendar Settings
// =============================================================================

/// The business's local calendar.
///
/// ## Why a Fixed Offset
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  The daily cap is "per calendar day" where the warehouse is.           │
/// │                                                                         │
/// │  utc_offset_minutes = 420 (UTC+7)                                      │
/// │                                                                         │
/// │  local day 2026-03-02  ==  [2026-03-01T17:00Z, 2026-03-02T17:00Z)      │
/// │                                                                         │
/// │  Every cap query filters timestamps with that half-open UTC range.     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CalendarSettings {
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl CalendarSettings {
    pub fn new(utc_offset_minutes: i32) -> Self {
        CalendarSettings { utc_offset_minutes }
    }

    /// The configured offset, or UTC if it is out of range.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Local calendar day of an instant.
    pub fn local_day(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset()).date_naive()
    }

    /// Today's local calendar day.
    pub fn today(&self) -> NaiveDate {
        self.local_day(Utc::now())
    }

    /// Half-open UTC range `[start, end)` covering one local day.
    pub fn day_bounds(&self, day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let local_midnight = day.and_time(NaiveTime::MIN);
        let offset = Duration::seconds(i64::from(self.offset().local_minus_utc()));
        let start = Utc.from_utc_datetime(&(local_midnight - offset));
        (start, start + Duration::days(1))
    }
}

// =============================================================================
// Settlement Settings
// =============================================================================

/// Order settlement policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SettlementSettings {
    /// Registered customers may leave a shortfall that becomes debt.
    /// Walk-in customers never may.
    #[serde(default = "default_true")]
    pub allow_registered_debt: bool,
}

impl Default for SettlementSettings {
    fn default() -> Self {
        SettlementSettings {
            allow_registered_debt: true,
        }
    }
}

// =============================================================================
// Code Settings
// =============================================================================

/// Prefixes of generated business codes (`EXP-20260302-1a2b3c`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSettings {
    #[serde(default = "default_expedition_prefix")]
    pub expedition_prefix: String,

    #[serde(default = "default_order_prefix")]
    pub order_prefix: String,
}

fn default_expedition_prefix() -> String {
    "EXP".to_string()
}
fn default_order_prefix() -> String {
    "SO".to_string()
}

impl Default for CodeSettings {
    fn default() -> Self {
        CodeSettings {
            expedition_prefix: default_expedition_prefix(),
            order_prefix: default_order_prefix(),
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub calendar: CalendarSettings,

    #[serde(default)]
    pub settlement: SettlementSettings,

    #[serde(default)]
    pub codes: CodeSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (kanvas.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| DbError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document. Missing sections fall back to defaults.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::InvalidConfig(e.to_string()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::InvalidConfig("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(DbError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(DbError::InvalidConfig(
                "database.min_connections must not exceed max_connections".into(),
            ));
        }

        // FixedOffset accepts strictly less than a day either way.
        if self.calendar.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(DbError::InvalidConfig(format!(
                "calendar.utc_offset_minutes out of range: {}",
                self.calendar.utc_offset_minutes
            )));
        }

        for (field, prefix) in [
            ("codes.expedition_prefix", &self.codes.expedition_prefix),
            ("codes.order_prefix", &self.codes.order_prefix),
        ] {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(DbError::InvalidConfig(format!(
                    "{} must be non-empty ASCII alphanumeric, got '{}'",
                    field, prefix
                )));
            }
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("KANVAS_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("KANVAS_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(m) => self.database.max_connections = m,
                Err(_) => warn!(value = %max, "Ignoring invalid KANVAS_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(offset) = std::env::var("KANVAS_UTC_OFFSET_MINUTES") {
            match offset.parse::<i32>() {
                Ok(o) => {
                    debug!(offset = o, "Overriding calendar offset from environment");
                    self.calendar.utc_offset_minutes = o;
                }
                Err(_) => warn!(value = %offset, "Ignoring invalid KANVAS_UTC_OFFSET_MINUTES"),
            }
        }

        if let Ok(allow) = std::env::var("KANVAS_ALLOW_REGISTERED_DEBT") {
            match allow.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.settlement.allow_registered_debt = true,
                "0" | "false" | "no" => self.settlement.allow_registered_debt = false,
                _ => warn!(value = %allow, "Unknown KANVAS_ALLOW_REGISTERED_DEBT value"),
            }
        }

        if let Ok(prefix) = std::env::var("KANVAS_EXPEDITION_PREFIX") {
            self.codes.expedition_prefix = prefix;
        }

        if let Ok(prefix) = std::env::var("KANVAS_ORDER_PREFIX") {
            self.codes.order_prefix = prefix;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("id", "kanvas", "kanvas")
            .map(|dirs| dirs.config_dir().join("kanvas.toml"))
    }

    /// Pool configuration derived from `[database]`.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(std::time::Duration::from_secs(self.database.connect_timeout_secs))
            .run_migrations(self.database.run_migrations)
    }
}
