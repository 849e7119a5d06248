//! # lifeline-settings
//!
//! Settings for the lifeline dispatch server: compiled defaults, an optional
//! JSON file deep-merged over them, and `LIFELINE_*` environment overrides
//! applied last.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{LifelineSettings, LogLevel, LoggingSettings, ServerSettings, StoreSettings};
