//! # clawboard-settings
//!
//! Configuration for the relay server and the bot client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ClawboardSettings::default()`]
//! 2. **User file**: `~/.clawboard/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PORT`, `HOST`, `WS_URL`, `API_URL` and
//!    `CLAWBOARD_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path, validate,
};
pub use types::*;
