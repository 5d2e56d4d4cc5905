//! Configuration loading, env substitution, overrides, and validation.
//!
//! Config files: `revwatch.toml`, `revwatch.yaml`, or `revwatch.json`
//! Searched in `./` then `~/.config/revwatch/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in the raw
//! file before parsing.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config,
        render_toml,
    },
    schema::{
        AlertConfig, CacheConfig, ClientConfig, LogStrategy, LoggingConfig, RevwatchConfig,
        ShutdownConfig, WhatsAppConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
