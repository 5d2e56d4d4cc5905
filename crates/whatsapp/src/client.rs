use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use {
    async_trait::async_trait,
    revwatch_channels::{ChatClient, ClientEventSender, Error, Result},
    revwatch_config::WhatsAppConfig,
    tokio::sync::{Mutex, RwLock},
    tracing::{debug, info, warn},
};

use crate::{
    process::{SidecarConfig, SidecarProcess, find_sidecar_dir, start_sidecar},
    sidecar::SidecarConnection,
    types::{SidecarRequest, chat_name_from_result},
};

/// Connection attempts made while a freshly started sidecar boots.
const CONNECT_ATTEMPTS: u32 = 20;

/// Upper bound on waiting for the sidecar to confirm browser shutdown
/// before the process itself is stopped.
const DESTROY_CONFIRM_TIMEOUT: Duration = Duration::from_secs(2);

/// [`ChatClient`] backed by the WhatsApp Web sidecar.
pub struct WhatsAppClient {
    config: WhatsAppConfig,
    process: Mutex<Option<SidecarProcess>>,
    connection: RwLock<Option<SidecarConnection>>,
    destroyed: AtomicBool,
}

impl WhatsAppClient {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            process: Mutex::new(None),
            connection: RwLock::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.config.request_timeout_ms)
    }

    async fn ensure_process_running(&self) -> Result<()> {
        let mut process = self.process.lock().await;
        if let Some(proc) = process.as_mut() {
            if proc.is_running() {
                return Ok(());
            }
            warn!("sidecar process died, restarting");
        }

        let dir = find_sidecar_dir(self.config.sidecar_dir.as_deref())
            .map_err(|e| Error::unavailable(format!("{e:#}")))?;
        let proc = start_sidecar(SidecarConfig::from_config(dir, &self.config))
            .await
            .map_err(|e| Error::unavailable(format!("{e:#}")))?;
        debug!(port = proc.port(), "sidecar process started");
        *process = Some(proc);
        Ok(())
    }

    async fn request(&self, request: SidecarRequest) -> Result<Option<serde_json::Value>> {
        let connection = self.connection.read().await;
        let Some(conn) = connection.as_ref() else {
            return Err(Error::unavailable("WhatsApp client not initialized"));
        };
        conn.request(request).await
    }
}

#[async_trait]
impl ChatClient for WhatsAppClient {
    fn id(&self) -> &str {
        "whatsapp-web"
    }

    async fn initialize(&self, events: ClientEventSender) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(Error::unavailable("WhatsApp client already destroyed"));
        }

        if self.config.auto_start {
            self.ensure_process_running().await?;
        } else {
            debug!(port = self.config.port, "expecting an externally managed sidecar");
        }

        let conn = SidecarConnection::connect_with_retry(
            self.config.port,
            events,
            self.request_timeout(),
            CONNECT_ATTEMPTS,
        )
        .await?;
        conn.request(SidecarRequest::Initialize).await?;
        *self.connection.write().await = Some(conn);

        info!(port = self.config.port, "WhatsApp Web session starting");
        Ok(())
    }

    async fn resolve_chat_name(&self, chat_ref: &str) -> Result<Option<String>> {
        let result = self
            .request(SidecarRequest::GetChat {
                chat_id: chat_ref.to_string(),
            })
            .await?;
        Ok(chat_name_from_result(result.as_ref()))
    }

    async fn send_message(&self, remote_chat_id: &str, text: &str) -> Result<()> {
        self.request(SidecarRequest::SendMessage {
            chat_id: remote_chat_id.to_string(),
            text: text.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let process = self.process.lock().await.take();
        let connection = self.connection.write().await.take();

        if let Some(conn) = connection {
            let confirm = self.request_timeout().min(DESTROY_CONFIRM_TIMEOUT);
            match tokio::time::timeout(confirm, conn.request(SidecarRequest::Destroy)).await {
                Ok(Ok(_)) => debug!("sidecar closed the browser"),
                Ok(Err(e)) => warn!(error = %e, "sidecar did not confirm browser shutdown"),
                Err(_) => warn!(
                    timeout_ms = confirm.as_millis() as u64,
                    "sidecar did not confirm browser shutdown in time"
                ),
            }
        }

        // The stop runs on its own task so the process still gets SIGTERM
        // when the caller stops waiting on this future.
        if let Some(mut proc) = process {
            tokio::spawn(async move { proc.stop().await })
                .await
                .map_err(|e| Error::unavailable(format!("sidecar stop task failed: {e}")))?
                .map_err(|e| Error::unavailable(format!("{e:#}")))?;
        }

        info!("WhatsApp client destroyed");
        Ok(())
    }
}
