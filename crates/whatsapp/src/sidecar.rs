//! WebSocket link to the sidecar: request/response correlation plus event
//! forwarding.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    futures::{SinkExt, StreamExt},
    revwatch_channels::{ClientEvent, ClientEventSender, Error, Result},
    serde_json::Value,
    tokio::{
        net::TcpStream,
        sync::{Mutex, mpsc, oneshot},
    },
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
    tracing::{debug, info, warn},
};

use crate::types::{RequestFrame, ResponseFrame, SidecarFrame, SidecarRequest};

/// Port the sidecar listens on unless configured otherwise.
pub const DEFAULT_SIDECAR_PORT: u16 = 3017;

/// Delay between connection attempts while the sidecar boots.
const RETRY_DELAY: Duration = Duration::from_millis(500);

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<ResponseFrame>>>>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open connection to a running sidecar.
///
/// The background task owns the event sender: when the socket closes, the
/// sender is dropped and the consumer sees the event stream end.
pub struct SidecarConnection {
    write_tx: mpsc::UnboundedSender<String>,
    pending: PendingMap,
    connected: Arc<AtomicBool>,
    request_timeout: Duration,
}

impl SidecarConnection {
    /// Connect once to `ws://127.0.0.1:{port}`.
    pub async fn connect(
        port: u16,
        events: ClientEventSender,
        request_timeout: Duration,
    ) -> Result<Self> {
        let url = format!("ws://127.0.0.1:{port}");
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::external(format!("connect to sidecar at {url}"), e))?;
        info!(%url, "connected to WhatsApp sidecar");

        let (write_tx, write_rx) = mpsc::unbounded_channel::<String>();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(run_connection(
            ws_stream,
            write_rx,
            events,
            Arc::clone(&pending),
            Arc::clone(&connected),
        ));

        Ok(Self {
            write_tx,
            pending,
            connected,
            request_timeout,
        })
    }

    /// Connect, retrying while the sidecar process is still starting.
    pub async fn connect_with_retry(
        port: u16,
        events: ClientEventSender,
        request_timeout: Duration,
        attempts: u32,
    ) -> Result<Self> {
        let mut last_error = None;
        for attempt in 1..=attempts.max(1) {
            match Self::connect(port, events.clone(), request_timeout).await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    debug!(attempt, error = %e, "sidecar not reachable yet");
                    last_error = Some(e);
                    tokio::time::sleep(RETRY_DELAY).await;
                },
            }
        }
        Err(last_error.unwrap_or_else(|| Error::unavailable("sidecar not reachable")))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send `request` and wait for its response, bounded by the request
    /// timeout. Returns the response's `result` payload.
    pub async fn request(&self, request: SidecarRequest) -> Result<Option<Value>> {
        if !self.is_connected() {
            return Err(Error::unavailable("sidecar connection closed"));
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let json = serde_json::to_string(&RequestFrame::new(&request_id, &request))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);

        if self.write_tx.send(json).is_err() {
            self.pending.lock().await.remove(&request_id);
            return Err(Error::unavailable("sidecar connection closed"));
        }

        let method = request.method();
        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) if response.ok => Ok(response.result),
            Ok(Ok(response)) => Err(Error::rejected(
                method,
                response.error.unwrap_or_else(|| "unknown error".into()),
            )),
            Ok(Err(_)) => Err(Error::unavailable(format!(
                "sidecar connection closed during {method}"
            ))),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                Err(Error::timeout(method))
            },
        }
    }
}

async fn run_connection(
    ws_stream: WsStream,
    mut write_rx: mpsc::UnboundedReceiver<String>,
    events: ClientEventSender,
    pending: PendingMap,
    connected: Arc<AtomicBool>,
) {
    let (mut ws_sink, mut ws_reader) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            msg = ws_reader.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_text(text.as_str(), &events, &pending).await;
                },
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                        break format!("failed to answer ping: {e}");
                    }
                },
                Some(Ok(Message::Close(_))) | None => break "sidecar closed the connection".to_string(),
                Some(Ok(_)) => {},
                Some(Err(e)) => break format!("sidecar connection error: {e}"),
            },
            outgoing = write_rx.recv() => match outgoing {
                Some(json) => {
                    if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                        break format!("failed to write to sidecar: {e}");
                    }
                },
                None => {
                    let _ = ws_sink.close().await;
                    break "connection dropped".to_string();
                },
            },
        }
    };

    connected.store(false, Ordering::SeqCst);
    // Dropping the senders wakes every waiting request with an error.
    pending.lock().await.clear();
    warn!(%reason, "WhatsApp sidecar connection ended");
    let _ = events.send(ClientEvent::Disconnected(reason));
}

/// Route one text frame to its waiting request or to the event stream.
async fn handle_text(text: &str, events: &ClientEventSender, pending: &PendingMap) {
    let frame: SidecarFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "ignoring malformed sidecar frame");
            return;
        },
    };

    match frame {
        SidecarFrame::Response(response) => {
            match pending.lock().await.remove(&response.request_id) {
                Some(tx) => {
                    let _ = tx.send(response);
                },
                None => debug!(
                    request_id = %response.request_id,
                    "response for unknown or expired request"
                ),
            }
        },
        other => {
            if let Some(event) = other.into_event() {
                let _ = events.send(event);
            }
        },
    }
}
