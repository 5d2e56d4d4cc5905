use std::{sync::Arc, time::Duration};

use {
    revwatch_channels::{ChatClient, ClientEvent},
    revwatch_config::{LogStrategy, RevwatchConfig},
    revwatch_journal::Journal,
    tokio::task::JoinSet,
    tracing::{error, info, warn},
};

#[cfg(feature = "metrics")]
use revwatch_metrics::{counter, events as event_metrics};

use crate::{MessageCache, Result, fault::supervise};

/// Per-event behavior derived from configuration.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub strategy: LogStrategy,
    /// Public reply posted after a revocation, `None` when alerts are off.
    pub alert_text: Option<String>,
    pub chat_name_timeout: Duration,
}

impl WatchSettings {
    pub fn from_config(config: &RevwatchConfig) -> Self {
        Self {
            strategy: config.logging.strategy,
            alert_text: config
                .alert
                .enabled
                .then(|| config.alert.text.clone()),
            chat_name_timeout: config.client.chat_name_timeout(),
        }
    }
}

/// Outcome of one dispatched event, mostly for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Failed(String),
    Panicked(String),
}

/// Owns the message cache and reacts to client events one at a time.
///
/// Events must be fed from a single task: the cache is plain owned state
/// and relies on that serialization.
pub struct Watcher {
    pub(crate) cache: MessageCache,
    pub(crate) journal: Journal,
    pub(crate) client: Arc<dyn ChatClient>,
    pub(crate) settings: WatchSettings,
    pub(crate) alerts: JoinSet<()>,
}

impl Watcher {
    pub fn new(client: Arc<dyn ChatClient>, journal: Journal, settings: WatchSettings) -> Self {
        Self {
            cache: MessageCache::new(),
            journal,
            client,
            settings,
            alerts: JoinSet::new(),
        }
    }

    /// Swap in a cache with different bounds. Existing entries are dropped.
    pub fn replace_cache(&mut self, cache: MessageCache) {
        self.cache = cache;
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn settings(&self) -> &WatchSettings {
        &self.settings
    }

    /// Handle one event, containing any error or panic it raises.
    ///
    /// Nothing an individual event does can stop the caller's loop.
    pub async fn dispatch(&mut self, event: ClientEvent) -> Dispatch {
        let kind = event.kind();
        match supervise(self.handle_event(event)).await {
            Ok(Ok(())) => Dispatch::Handled,
            Ok(Err(e)) => {
                error!(event = kind, error = %e, "failed to handle client event");
                #[cfg(feature = "metrics")]
                counter!(event_metrics::FAULTS_TOTAL, "event" => kind, "kind" => "error")
                    .increment(1);
                Dispatch::Failed(e.to_string())
            },
            Err(panic) => {
                error!(event = kind, %panic, "client event handler panicked");
                #[cfg(feature = "metrics")]
                counter!(event_metrics::FAULTS_TOTAL, "event" => kind, "kind" => "panic")
                    .increment(1);
                Dispatch::Panicked(panic)
            },
        }
    }

    /// Handle one event, propagating failures to the caller.
    pub async fn handle_event(&mut self, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::Qr(code) => {
                info!(code = %code, "scan this pairing code with the phone app to log in");
            },
            ClientEvent::Ready => {
                info!(
                    client = self.client.id(),
                    strategy = %self.settings.strategy,
                    alerts = self.settings.alert_text.is_some(),
                    "chat client ready, watching for deleted messages"
                );
            },
            ClientEvent::MessageCreated(message) => {
                self.handle_message_created(message).await?;
            },
            ClientEvent::MessageRevoked { message_id, before } => {
                self.handle_message_revoked(message_id, before).await?;
            },
            ClientEvent::AuthFailure(reason) => {
                error!(%reason, "chat client authentication failed, pairing required");
            },
            ClientEvent::Disconnected(reason) => {
                warn!(%reason, "chat client disconnected");
            },
        }
        Ok(())
    }

    /// Wait for every alert still in flight.
    pub async fn drain_alerts(&mut self) {
        while let Some(joined) = self.alerts.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "revocation alert task did not finish");
            }
        }
    }

    /// Abort alerts that are still running.
    pub fn abort_alerts(&mut self) {
        self.alerts.abort_all();
    }
}
