//! Startup, the event loop, and bounded shutdown.
//!
//! Every way of stopping (operator signal, uncaught panic, client failure,
//! explicit request) goes through [`ShutdownHandle::trigger`], and the
//! controller runs the shutdown sequence exactly once.

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use {
    async_trait::async_trait,
    revwatch_channels::{ChatClient, ClientEvent},
    revwatch_config::RevwatchConfig,
    revwatch_journal::Journal,
    tokio::{
        sync::{mpsc, watch},
        time::Instant,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    Error, MessageCache, Result,
    service::{WatchSettings, Watcher},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    ShuttingDown,
    Terminated,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::ShuttingDown => "shutting_down",
            Self::Terminated => "terminated",
        })
    }
}

/// Why the watcher stopped. The first trigger wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(&'static str),
    Fault(String),
    InitFailed(String),
    /// The client stopped delivering events.
    ClientClosed,
    Requested,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "received {name}"),
            Self::Fault(msg) => write!(f, "uncaught fault: {msg}"),
            Self::InitFailed(msg) => write!(f, "client failed to start: {msg}"),
            Self::ClientClosed => f.write_str("client closed its event stream"),
            Self::Requested => f.write_str("shutdown requested"),
        }
    }
}

/// Cloneable trigger shared with signal listeners and the panic hook.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    cancel: CancellationToken,
    reason: Arc<OnceLock<ShutdownReason>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Later calls only log.
    pub fn trigger(&self, reason: ShutdownReason) {
        let message = reason.to_string();
        if self.reason.set(reason).is_ok() {
            info!(reason = %message, "shutdown requested");
        } else {
            debug!(reason = %message, "shutdown already in progress");
        }
        self.cancel.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().cloned()
    }

    /// Resolves once any trigger has fired.
    pub async fn triggered(&self) {
        self.cancel.cancelled().await;
    }
}

/// Where cached messages go at shutdown.
///
/// Cache contents are not needed across restarts, so the default drops them.
#[async_trait]
pub trait CachePersistence: Send + Sync {
    async fn persist(&self, cache: &MessageCache) -> Result<()>;
}

/// Keeps nothing.
pub struct NoopPersistence;

#[async_trait]
impl CachePersistence for NoopPersistence {
    async fn persist(&self, cache: &MessageCache) -> Result<()> {
        debug!(entries = cache.len(), "discarding message cache");
        Ok(())
    }
}

/// Drives one watcher run from client startup to termination.
pub struct LifecycleController {
    config: RevwatchConfig,
    client: Arc<dyn ChatClient>,
    persistence: Arc<dyn CachePersistence>,
    state: watch::Sender<LifecycleState>,
    shutdown: ShutdownHandle,
}

impl LifecycleController {
    pub fn new(config: RevwatchConfig, client: Arc<dyn ChatClient>) -> Self {
        let (state, _) = watch::channel(LifecycleState::Uninitialized);
        Self {
            config,
            client,
            persistence: Arc::new(NoopPersistence),
            state,
            shutdown: ShutdownHandle::new(),
        }
    }

    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn CachePersistence>) -> Self {
        self.persistence = persistence;
        self
    }

    /// Use an existing handle, e.g. one the panic hook already holds.
    #[must_use]
    pub fn with_shutdown_handle(mut self, handle: ShutdownHandle) -> Self {
        self.shutdown = handle;
        self
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        debug!(from = %previous, to = %next, "lifecycle transition");
    }

    /// Open the journal, start the client, and process events until a
    /// shutdown trigger fires. Returns the reason the run ended.
    pub async fn run(&self) -> Result<ShutdownReason> {
        let mut current = LifecycleState::Uninitialized;
        let started = self.state.send_if_modified(|state| {
            current = *state;
            if *state == LifecycleState::Uninitialized {
                *state = LifecycleState::Initializing;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(Error::AlreadyStarted { state: current });
        }
        debug!(from = %current, to = %LifecycleState::Initializing, "lifecycle transition");

        let logging = &self.config.logging;
        let journal = match Journal::open(
            &logging.dir,
            &logging.history_file,
            &logging.revocations_file,
        )
        .await
        {
            Ok(journal) => journal,
            Err(e) => {
                error!(dir = %logging.dir.display(), error = %e, "failed to open journal");
                self.transition(LifecycleState::Terminated);
                return Err(e.into());
            },
        };
        info!(
            dir = %journal.dir().display(),
            strategy = %logging.strategy,
            "journal ready"
        );

        let mut watcher = Watcher::new(
            Arc::clone(&self.client),
            journal,
            WatchSettings::from_config(&self.config),
        );
        watcher.replace_cache(MessageCache::with_bounds(
            self.config.cache.high_water,
            self.config.cache.evict_batch,
        ));

        let init_error = self.event_loop(&mut watcher).await;
        self.shutdown_with(&mut watcher).await;

        match init_error {
            Some(e) => Err(e.into()),
            None => Ok(self.shutdown.reason().unwrap_or(ShutdownReason::Requested)),
        }
    }

    /// Single consumer of client events. Returns the initialization error,
    /// if that is what ended the loop.
    async fn event_loop(&self, watcher: &mut Watcher) -> Option<revwatch_channels::Error> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        info!(client = self.client.id(), "starting chat client");
        let init = self.client.initialize(tx);
        tokio::pin!(init);
        let mut init_pending = true;
        let mut init_error = None;

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.triggered() => break,
                res = &mut init, if init_pending => {
                    init_pending = false;
                    if let Err(e) = res {
                        error!(error = %e, "chat client failed to initialize");
                        self.shutdown.trigger(ShutdownReason::InitFailed(e.to_string()));
                        init_error = Some(e);
                    }
                },
                event = rx.recv() => match event {
                    Some(event) => {
                        if matches!(event, ClientEvent::Ready)
                            && self.state() == LifecycleState::Initializing
                        {
                            self.transition(LifecycleState::Ready);
                        }
                        watcher.dispatch(event).await;
                    },
                    None => self.shutdown.trigger(ShutdownReason::ClientClosed),
                },
            }
        }

        init_error
    }

    /// Persist, stop the client, and drain the journal, all within the
    /// configured budget. Runs at most once.
    async fn shutdown_with(&self, watcher: &mut Watcher) {
        if matches!(
            self.state(),
            LifecycleState::ShuttingDown | LifecycleState::Terminated
        ) {
            return;
        }
        self.transition(LifecycleState::ShuttingDown);

        let budget = self.config.shutdown.timeout();
        let deadline = Instant::now() + budget;
        let reason = self.shutdown.reason().unwrap_or(ShutdownReason::Requested);
        info!(%reason, budget_secs = budget.as_secs(), "shutting down");

        match tokio::time::timeout_at(deadline, self.persistence.persist(watcher.cache())).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => warn!(error = %e, "failed to persist message cache"),
            Err(_) => warn!("persisting message cache timed out"),
        }

        if tokio::time::timeout_at(deadline, watcher.drain_alerts())
            .await
            .is_err()
        {
            warn!("revocation alerts still pending at shutdown, aborting them");
            watcher.abort_alerts();
        }

        match tokio::time::timeout_at(deadline, self.client.destroy()).await {
            Ok(Ok(())) => debug!(client = self.client.id(), "chat client stopped"),
            Ok(Err(e)) => warn!(error = %e, "chat client did not stop cleanly"),
            Err(_) => warn!(
                client = self.client.id(),
                "chat client did not stop within the shutdown budget"
            ),
        }

        // The journal always gets a short grace period, even when the
        // steps above used up the budget.
        let grace = deadline.max(Instant::now() + Duration::from_millis(500));
        if tokio::time::timeout_at(grace, watcher.journal().close())
            .await
            .is_err()
        {
            warn!("journal did not drain before shutdown finished");
        }

        self.transition(LifecycleState::Terminated);
        info!("shutdown complete");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::{Mutex, atomic::Ordering};

    use {
        super::*,
        crate::testing::{FakeChatClient, message},
        revwatch_common::RevocationRecord,
        revwatch_journal::read_tail,
    };

    fn config(dir: &std::path::Path) -> RevwatchConfig {
        let mut config = RevwatchConfig::default();
        config.logging.dir = dir.join("logs");
        config.alert.enabled = true;
        config.shutdown.timeout_secs = 1;
        config
    }

    async fn run_until_ready_then_hang_up(
        controller: &LifecycleController,
        client: &FakeChatClient,
    ) -> Result<ShutdownReason> {
        let mut states = controller.subscribe();
        let drive = async {
            states
                .wait_for(|s| *s == LifecycleState::Ready)
                .await
                .unwrap();
            client.hang_up();
        };
        let (result, ()) = tokio::join!(controller.run(), drive);
        result
    }

    #[tokio::test]
    async fn processes_events_then_shuts_down_once() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(FakeChatClient::new().with_script(vec![
            ClientEvent::Qr("2@abc".into()),
            ClientEvent::Ready,
            ClientEvent::MessageCreated(message("A1", "15551234567@c.us", "hello")),
            ClientEvent::MessageRevoked {
                message_id: "A1".into(),
                before: None,
            },
        ]));
        let cfg = config(dir.path());
        let revoked_path = cfg.logging.revocations_path();
        let controller = LifecycleController::new(cfg, client.clone());

        let reason = run_until_ready_then_hang_up(&controller, &client)
            .await
            .unwrap();

        assert_eq!(reason, ShutdownReason::ClientClosed);
        assert_eq!(controller.state(), LifecycleState::Terminated);
        assert_eq!(client.destroyed.load(Ordering::SeqCst), 1);

        let revoked: Vec<RevocationRecord> = read_tail(&revoked_path, None).await.unwrap();
        assert_eq!(revoked.len(), 1);
        assert_eq!(revoked[0].content, "hello");
        assert_eq!(client.sent().len(), 1);
    }

    #[tokio::test]
    async fn early_trigger_skips_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(FakeChatClient::new());
        let controller = LifecycleController::new(config(dir.path()), client.clone());

        let handle = controller.shutdown_handle();
        handle.trigger(ShutdownReason::Signal("SIGTERM"));
        handle.trigger(ShutdownReason::Requested);

        let reason = controller.run().await.unwrap();
        assert_eq!(reason, ShutdownReason::Signal("SIGTERM"));
        assert_eq!(controller.state(), LifecycleState::Terminated);
        assert_eq!(client.destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cannot_run_twice() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(FakeChatClient::new());
        let controller = LifecycleController::new(config(dir.path()), client.clone());
        controller.shutdown_handle().trigger(ShutdownReason::Requested);
        controller.run().await.unwrap();

        let err = controller.run().await.unwrap_err();
        assert!(matches!(
            err,
            Error::AlreadyStarted {
                state: LifecycleState::Terminated
            }
        ));
        assert_eq!(client.destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_runs_start_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(FakeChatClient::new());
        let controller = Arc::new(LifecycleController::new(config(dir.path()), client.clone()));
        controller.shutdown_handle().trigger(ShutdownReason::Requested);

        let first = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.run().await }
        });
        let second = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.run().await }
        });
        let results = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(Error::AlreadyStarted { state }) if *state != LifecycleState::Uninitialized
        )));
        assert_eq!(client.destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_initialize_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(FakeChatClient::new());
        client.init_fails.store(true, Ordering::SeqCst);
        let controller = LifecycleController::new(config(dir.path()), client.clone());

        let err = controller.run().await.unwrap_err();
        assert!(matches!(err, Error::Client(_)));
        assert_eq!(controller.state(), LifecycleState::Terminated);
        assert_eq!(client.destroyed.load(Ordering::SeqCst), 1);
        assert!(matches!(
            controller.shutdown_handle().reason(),
            Some(ShutdownReason::InitFailed(_))
        ));
    }

    #[tokio::test]
    async fn hanging_destroy_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(FakeChatClient::new());
        client.destroy_hangs.store(true, Ordering::SeqCst);
        let controller = LifecycleController::new(config(dir.path()), client.clone());
        controller.shutdown_handle().trigger(ShutdownReason::Requested);

        let started = std::time::Instant::now();
        controller.run().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(controller.state(), LifecycleState::Terminated);
    }

    struct CountingPersistence(Mutex<Vec<usize>>);

    #[async_trait]
    impl CachePersistence for CountingPersistence {
        async fn persist(&self, cache: &MessageCache) -> Result<()> {
            self.0.lock().unwrap().push(cache.len());
            Ok(())
        }
    }

    #[tokio::test]
    async fn persistence_hook_sees_final_cache() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(FakeChatClient::new().with_script(vec![
            ClientEvent::MessageCreated(message("A1", "1@c.us", "one")),
            ClientEvent::MessageCreated(message("A2", "1@c.us", "two")),
            ClientEvent::Ready,
        ]));
        let persistence = Arc::new(CountingPersistence(Mutex::new(vec![])));
        let controller = LifecycleController::new(config(dir.path()), client.clone())
            .with_persistence(persistence.clone());

        run_until_ready_then_hang_up(&controller, &client)
            .await
            .unwrap();

        assert_eq!(*persistence.0.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn unwritable_log_dir_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "not a directory").unwrap();

        let client = Arc::new(FakeChatClient::new());
        let controller = LifecycleController::new(config(dir.path()), client.clone());

        assert!(matches!(controller.run().await, Err(Error::Journal(_))));
        assert_eq!(controller.state(), LifecycleState::Terminated);
        assert_eq!(client.destroyed.load(Ordering::SeqCst), 0);
    }
}
