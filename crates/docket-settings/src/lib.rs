//! # docket-settings
//!
//! Layered configuration for Docket.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`DocketSettings::default()`]
//! 2. **User file**: `~/.docket/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `DOCKET_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
static SETTINGS: OnceLock<DocketSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.docket/settings.json` with env var
/// overrides. If loading fails, falls back to compiled defaults.
pub fn get_settings() -> &'static DocketSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            DocketSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: DocketSettings) -> std::result::Result<(), DocketSettings> {
    SETTINGS.set(settings)
}
