use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    schema::{LogStrategy, RevwatchConfig},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "revwatch.toml",
    "revwatch.yaml",
    "revwatch.yml",
    "revwatch.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<RevwatchConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config, then apply `REVWATCH_*` environment overrides.
///
/// Search order:
/// 1. `dir_override/revwatch.{toml,yaml,yml,json}` when a directory is given
/// 2. `./revwatch.{toml,yaml,yml,json}` (project-local)
/// 3. `~/.config/revwatch/revwatch.{toml,yaml,yml,json}` (user-global)
///
/// A missing or unreadable file falls back to `RevwatchConfig::default()`.
pub fn discover_and_load(dir_override: Option<&Path>) -> RevwatchConfig {
    let mut config = match find_config_file(dir_override) {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                RevwatchConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            RevwatchConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Find the first config file in standard locations.
pub fn find_config_file(dir_override: Option<&Path>) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Some(dir) = dir_override {
        dirs.push(dir.to_path_buf());
    }
    dirs.push(PathBuf::from("."));
    if let Some(dir) = config_dir() {
        dirs.push(dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/revwatch/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "revwatch").map(|d| d.config_dir().to_path_buf())
}

/// Apply `REVWATCH_*` overrides from the process environment.
pub fn apply_env_overrides(config: &mut RevwatchConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut RevwatchConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(raw) = lookup("REVWATCH_LOG_STRATEGY") {
        match raw.parse::<LogStrategy>() {
            Ok(strategy) => config.logging.strategy = strategy,
            Err(e) => warn!(value = %raw, error = %e, "ignoring REVWATCH_LOG_STRATEGY"),
        }
    }
    if let Some(raw) = lookup("REVWATCH_LOG_DIR")
        && !raw.trim().is_empty()
    {
        config.logging.dir = PathBuf::from(raw);
    }
    if let Some(raw) = lookup("REVWATCH_ALERT_ENABLED") {
        match parse_bool(&raw) {
            Some(enabled) => config.alert.enabled = enabled,
            None => warn!(value = %raw, "ignoring REVWATCH_ALERT_ENABLED, expected a boolean"),
        }
    }
    if let Some(text) = lookup("REVWATCH_ALERT_TEXT") {
        config.alert.text = text;
    }
    if let Some(raw) = lookup("REVWATCH_SIDECAR_PORT") {
        match raw.trim().parse::<u16>() {
            Ok(port) => config.whatsapp.port = port,
            Err(e) => warn!(value = %raw, error = %e, "ignoring REVWATCH_SIDECAR_PORT"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Serialize the effective config as TOML for `revwatch config show`.
pub fn render_toml(config: &RevwatchConfig) -> anyhow::Result<String> {
    toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<RevwatchConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
