/// Config schema types (logging, alert, cache, client, shutdown, whatsapp).
use std::{path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// Alert text used when none is configured.
pub const DEFAULT_ALERT_TEXT: &str = "I saw that! 👁️ This message has been logged to my server.";

/// Which messages get a line in the history stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStrategy {
    /// Every observed message is journaled.
    All,
    /// Only revocations are journaled; the cache still sees every message.
    #[default]
    DeletedOnly,
}

impl LogStrategy {
    #[must_use]
    pub fn logs_history(self) -> bool {
        matches!(self, Self::All)
    }
}

impl std::fmt::Display for LogStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::DeletedOnly => write!(f, "deleted_only"),
        }
    }
}

impl FromStr for LogStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "all" | "log_all" => Ok(Self::All),
            "deleted_only" | "deleted" => Ok(Self::DeletedOnly),
            other => Err(format!("unknown log strategy: {other}")),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevwatchConfig {
    pub logging: LoggingConfig,
    pub alert: AlertConfig,
    pub cache: CacheConfig,
    pub client: ClientConfig,
    pub shutdown: ShutdownConfig,
    pub whatsapp: WhatsAppConfig,
}

/// Durable journal location and strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub strategy: LogStrategy,
    /// Directory holding both streams. Created on startup if missing.
    pub dir: PathBuf,
    pub history_file: String,
    pub revocations_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            strategy: LogStrategy::default(),
            dir: PathBuf::from("./logs"),
            history_file: "history.jsonl".into(),
            revocations_file: "revoked_events.jsonl".into(),
        }
    }
}

impl LoggingConfig {
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.dir.join(&self.history_file)
    }

    #[must_use]
    pub fn revocations_path(&self) -> PathBuf {
        self.dir.join(&self.revocations_file)
    }
}

/// In-chat alert sent back when a message is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub text: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            text: DEFAULT_ALERT_TEXT.into(),
        }
    }
}

/// Recent-message cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Eviction runs once the entry count goes above this.
    pub high_water: usize,
    /// How many of the oldest entries one eviction removes.
    pub evict_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            high_water: 5000,
            evict_batch: 1000,
        }
    }
}

/// Limits on calls into the chat client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub chat_name_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chat_name_timeout_ms: 5000,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn chat_name_timeout(&self) -> Duration {
        Duration::from_millis(self.chat_name_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound for each shutdown step (client destroy, journal drain).
    pub timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl ShutdownConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// WhatsApp Web sidecar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Directory containing the sidecar's `package.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidecar_dir: Option<PathBuf>,
    pub port: u16,
    /// Where the sidecar keeps its session/auth state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_dir: Option<PathBuf>,
    /// Chromium executable for the headless browser.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_path: Option<PathBuf>,
    pub headless: bool,
    /// Spawn and supervise the sidecar process. Disable to run it by hand.
    pub auto_start: bool,
    /// Per-request timeout for sidecar round trips.
    pub request_timeout_ms: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            sidecar_dir: None,
            port: 3017,
            auth_dir: None,
            browser_path: None,
            headless: true,
            auto_start: true,
            request_timeout_ms: 15_000,
        }
    }
}
