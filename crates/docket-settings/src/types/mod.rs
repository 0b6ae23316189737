//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may be partial: missing fields take their compiled default.

mod reminders;
mod storage;

pub use reminders::*;
pub use storage::*;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for Docket.
///
/// # JSON Format
///
/// ```json
/// {
///   "reconciler": { "intervalSecs": 600 },
///   "reminders": { "leadTimeSecs": 1800 },
///   "storage": { "dbPath": "~/.docket/docket.db" }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocketSettings {
    /// Settings schema version.
    pub version: String,
    /// Periodic overdue reconciliation.
    pub reconciler: ReconcilerSettings,
    /// Reminder and overdue alert scheduling.
    pub reminders: ReminderSettings,
    /// Task database location.
    pub storage: StorageSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for DocketSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            reconciler: ReconcilerSettings::default(),
            reminders: ReminderSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl DocketSettings {
    /// Reject values that deserialize fine but cannot drive the engine.
    pub fn validate(&self) -> Result<()> {
        if self.reconciler.interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "reconciler.intervalSecs must be greater than zero".into(),
            ));
        }
        if self.storage.db_path.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "storage.dbPath must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Periodic reconciler settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconcilerSettings {
    /// Seconds between overdue sweeps.
    pub interval_secs: u64,
    /// Sweep once immediately when the reconciler starts.
    pub run_on_start: bool,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            run_on_start: true,
        }
    }
}

impl ReconcilerSettings {
    /// Interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (or `EnvFilter` directive) for stderr output.
    pub level: String,
    /// Emit newline-delimited JSON instead of the compact text format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
