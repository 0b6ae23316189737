//! Engine configuration derived from [`DocketSettings`].

use std::time::Duration;

use docket_reminders::ReminderConfig;
use docket_settings::DocketSettings;
use tracing::warn;

/// Default period between reconcile ticks.
const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(3600);

/// Everything the engine needs beyond its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Reminder scheduling.
    pub reminders: ReminderConfig,
    /// Period between reconcile ticks.
    pub reconcile_interval: Duration,
    /// Run a tick as soon as the reconciler starts.
    pub run_on_start: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reminders: ReminderConfig::default(),
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            run_on_start: true,
        }
    }
}

impl From<&DocketSettings> for EngineConfig {
    fn from(settings: &DocketSettings) -> Self {
        let defaults = ReminderConfig::default();
        let lead_time = chrono::Duration::from_std(settings.reminders.lead_time())
            .unwrap_or_else(|_| {
                warn!(
                    lead_time_secs = settings.reminders.lead_time_secs,
                    "reminder lead time out of range, using default"
                );
                defaults.lead_time
            });
        Self {
            reminders: ReminderConfig {
                enabled: settings.reminders.enabled,
                lead_time,
                reminder_title: settings.reminders.reminder_title.clone(),
                overdue_title: settings.reminders.overdue_title.clone(),
            },
            reconcile_interval: settings.reconciler.interval(),
            run_on_start: settings.reconciler.run_on_start,
        }
    }
}
