//! # Configuration
//!
//! Two layers:
//! - [`AppConfig`]: process wiring read from the environment (port, database, logging)
//! - [`EngineSettings`]: scheduling knobs with built-in defaults, overridden by the
//!   `app_config` table and, for household-sensitive keys, by `household_settings`

use std::time::Duration as StdDuration;

use chrono::Duration;
use tracing::warn;

/// Dotted key names used in the key/value settings tables.
pub mod keys {
    pub const WINDOW_DAYS: &str = "generation.window_days";
    pub const SCHEDULER_INTERVAL_MINUTES: &str = "scheduler.interval_minutes";
    pub const STATUS_INTERVAL_MINUTES: &str = "status.interval_minutes";
    pub const HOUSEKEEPING_INTERVAL_MINUTES: &str = "housekeeping.interval_minutes";
    pub const LATE_GRACE_MINUTES: &str = "generation.late_grace_minutes";
    pub const MISSED_SHIFT_GRACE_MINUTES: &str = "status.missed_shift_grace_minutes";
    pub const HANDOFF_LEAD_MINUTES: &str = "status.handoff_lead_minutes";
    pub const LOGIN_ATTEMPT_RETENTION_DAYS: &str = "housekeeping.login_attempt_retention_days";
    pub const NOTIFICATION_RETENTION_DAYS: &str = "housekeeping.notification_retention_days";

    /// High-water mark of the overdue check, not a tunable.
    pub const OVERDUE_CHECKED_THROUGH: &str = "status.overdue_checked_through";

    /// Keys a household may override for itself.
    pub const HOUSEHOLD_SCOPED: &[&str] = &[
        WINDOW_DAYS,
        LATE_GRACE_MINUTES,
        MISSED_SHIFT_GRACE_MINUTES,
        HANDOFF_LEAD_MINUTES,
    ];
}

/// Upper bound for minute-valued settings (one year).
const MAX_MINUTES: u32 = 525_600;

/// Upper bound for retention settings (one hundred years).
const MAX_RETENTION_DAYS: u32 = 36_500;

/// Process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// How long a writer waits on SQLite's lock before giving up.
    pub db_busy_timeout: StdDuration,
    pub log_level: String,
    pub cors_origin: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparseable values use defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, fallback: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        let number = |key: &str, fallback: u64| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(fallback)
        };

        Self {
            port: u16::try_from(number("CAREHUB_PORT", 8080)).unwrap_or(8080),
            database_url: string("CAREHUB_DATABASE_URL", "sqlite:data/carehub.db"),
            db_max_connections: u32::try_from(number("CAREHUB_DB_MAX_CONNECTIONS", 4))
                .unwrap_or(4)
                .max(1),
            db_busy_timeout: StdDuration::from_millis(number("CAREHUB_DB_BUSY_TIMEOUT_MS", 5000)),
            log_level: string("LOG_LEVEL", "info"),
            cors_origin: string("CAREHUB_CORS_ORIGIN", "http://localhost:8080"),
        }
    }
}

/// Scheduling settings in effect for one household (or the whole process).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub window_days: u32,
    pub scheduler_interval: StdDuration,
    pub status_interval: StdDuration,
    pub housekeeping_interval: StdDuration,
    pub late_grace: Duration,
    pub missed_shift_grace: Duration,
    pub handoff_lead: Duration,
    pub login_attempt_retention: Duration,
    pub notification_retention: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            window_days: 3,
            scheduler_interval: StdDuration::from_secs(30 * 60),
            status_interval: StdDuration::from_secs(5 * 60),
            housekeeping_interval: StdDuration::from_secs(60 * 60),
            late_grace: Duration::hours(2),
            missed_shift_grace: Duration::minutes(30),
            handoff_lead: Duration::minutes(30),
            login_attempt_retention: Duration::days(7),
            notification_retention: Duration::days(90),
        }
    }
}

impl EngineSettings {
    /// Apply a process-scoped override. Returns false when the pair was rejected.
    pub fn apply(&mut self, key: &str, value: &str) -> bool {
        let Ok(n) = value.trim().parse::<u32>() else {
            warn!(key, value, "ignoring non-numeric setting");
            return false;
        };
        if n == 0 {
            warn!(key, "ignoring zero-valued setting");
            return false;
        }

        let minutes = || StdDuration::from_secs(u64::from(n) * 60);
        match key {
            keys::WINDOW_DAYS if n <= 31 => self.window_days = n,
            _ if key.ends_with("_minutes") && n > MAX_MINUTES => {
                warn!(key, value, "ignoring out-of-range setting");
                return false;
            }
            _ if key.ends_with("_days") && n > MAX_RETENTION_DAYS => {
                warn!(key, value, "ignoring out-of-range setting");
                return false;
            }
            keys::SCHEDULER_INTERVAL_MINUTES => self.scheduler_interval = minutes(),
            keys::STATUS_INTERVAL_MINUTES => self.status_interval = minutes(),
            keys::HOUSEKEEPING_INTERVAL_MINUTES => self.housekeeping_interval = minutes(),
            keys::LATE_GRACE_MINUTES => self.late_grace = Duration::minutes(i64::from(n)),
            keys::MISSED_SHIFT_GRACE_MINUTES => {
                self.missed_shift_grace = Duration::minutes(i64::from(n))
            }
            keys::HANDOFF_LEAD_MINUTES => self.handoff_lead = Duration::minutes(i64::from(n)),
            keys::LOGIN_ATTEMPT_RETENTION_DAYS => {
                self.login_attempt_retention = Duration::days(i64::from(n))
            }
            keys::NOTIFICATION_RETENTION_DAYS => {
                self.notification_retention = Duration::days(i64::from(n))
            }
            _ => {
                warn!(key, value, "ignoring unknown or out-of-range setting");
                return false;
            }
        }
        true
    }

    /// Apply a household-scoped override; process-only keys are rejected.
    pub fn apply_household(&mut self, key: &str, value: &str) -> bool {
        if !keys::HOUSEHOLD_SCOPED.contains(&key) {
            warn!(key, "setting cannot be overridden per household");
            return false;
        }
        self.apply(key, value)
    }
}
