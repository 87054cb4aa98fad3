//! Configuration module for Filament.
//!
//! Handles the TOML settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CacheSettings, ExtractionSettings, ModelSettings, OutputSettings, Settings,
    SettingsError,
};
