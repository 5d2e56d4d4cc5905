use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    fd_lock::RwLock,
    revwatch_common::{LogRecord, RevocationRecord},
    serde::Serialize,
    tokio::sync::{mpsc, oneshot},
    tracing::{debug, error, warn},
};

#[cfg(feature = "metrics")]
use revwatch_metrics::{counter, journal as journal_metrics};

use crate::{Error, Result, error::Context};

/// The two journal streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    History,
    Revocations,
}

impl StreamKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Revocations => "revocations",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

enum WriteOp {
    Line(String),
    /// Acknowledged once every line queued before it has been attempted.
    Flush(oneshot::Sender<()>),
    /// Like `Flush`, then the writer stops.
    Close(oneshot::Sender<()>),
}

/// Queue in front of one stream's single writer task.
struct StreamWriter {
    kind: StreamKind,
    path: PathBuf,
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl StreamWriter {
    fn spawn(kind: StreamKind, path: PathBuf) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(kind, path.clone(), rx));
        Self { kind, path, tx }
    }

    fn submit<T: Serialize>(&self, record: &T) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                error!(stream = %self.kind, error = %e, "failed to serialize journal record");
                #[cfg(feature = "metrics")]
                counter!(journal_metrics::WRITE_FAILURES_TOTAL, "stream" => self.kind.as_str())
                    .increment(1);
                return;
            },
        };
        if self.tx.send(WriteOp::Line(line)).is_err() {
            let err = Error::Closed {
                stream: self.kind.as_str(),
            };
            error!(stream = %self.kind, error = %err, "dropping journal record");
            #[cfg(feature = "metrics")]
            counter!(journal_metrics::WRITE_FAILURES_TOTAL, "stream" => self.kind.as_str())
                .increment(1);
        }
    }

    async fn barrier(&self, close: bool) {
        let (ack_tx, ack_rx) = oneshot::channel();
        let op = if close {
            WriteOp::Close(ack_tx)
        } else {
            WriteOp::Flush(ack_tx)
        };
        if self.tx.send(op).is_err() {
            // Writer already stopped, nothing left to wait for.
            return;
        }
        if ack_rx.await.is_err() {
            warn!(stream = %self.kind, "journal writer stopped before acknowledging");
        }
    }
}

async fn run_writer(kind: StreamKind, path: PathBuf, mut rx: mpsc::UnboundedReceiver<WriteOp>) {
    debug!(stream = %kind, path = %path.display(), "journal writer started");

    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Line(line) => match append_line(path.clone(), line).await {
                Ok(()) => {
                    #[cfg(feature = "metrics")]
                    counter!(journal_metrics::LINES_WRITTEN_TOTAL, "stream" => kind.as_str())
                        .increment(1);
                },
                Err(e) => {
                    error!(stream = %kind, path = %path.display(), error = %e, "journal write failed");
                    #[cfg(feature = "metrics")]
                    counter!(journal_metrics::WRITE_FAILURES_TOTAL, "stream" => kind.as_str())
                        .increment(1);
                },
            },
            WriteOp::Flush(ack) => {
                let _ = ack.send(());
            },
            WriteOp::Close(ack) => {
                let _ = ack.send(());
                break;
            },
        }
    }

    debug!(stream = %kind, "journal writer stopped");
}

/// Append one line under an exclusive file lock.
///
/// The file is reopened per line so an operator can rotate or delete it
/// while the watcher runs.
async fn append_line(path: PathBuf, line: String) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut lock = RwLock::new(file);
        let mut guard = lock
            .write()
            .map_err(|e| Error::lock_failed(e.to_string()))?;
        writeln!(*guard, "{line}")?;
        Ok(())
    })
    .await?
}

struct JournalInner {
    dir: PathBuf,
    history: StreamWriter,
    revocations: StreamWriter,
}

/// Append-only writer for the history and revocation streams.
///
/// Appends never block the caller and never fail from the caller's point of
/// view: problems are logged by the stream's writer task and the record is
/// dropped. Cloning is cheap and every clone feeds the same writers.
#[derive(Clone)]
pub struct Journal {
    inner: Arc<JournalInner>,
}

impl Journal {
    /// Create the log directory if needed and start both stream writers.
    ///
    /// Must be called from inside a tokio runtime.
    pub async fn open(
        dir: impl Into<PathBuf>,
        history_file: &str,
        revocations_file: &str,
    ) -> Result<Self> {
        let dir = dir.into();
        let create_dir = dir.clone();
        tokio::task::spawn_blocking(move || fs::create_dir_all(&create_dir))
            .await?
            .with_context(|| format!("create log directory {}", dir.display()))?;

        let history = StreamWriter::spawn(StreamKind::History, dir.join(history_file));
        let revocations =
            StreamWriter::spawn(StreamKind::Revocations, dir.join(revocations_file));

        Ok(Self {
            inner: Arc::new(JournalInner {
                dir,
                history,
                revocations,
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn path(&self, kind: StreamKind) -> &Path {
        match kind {
            StreamKind::History => &self.inner.history.path,
            StreamKind::Revocations => &self.inner.revocations.path,
        }
    }

    pub fn append_history(&self, record: &LogRecord) {
        self.inner.history.submit(record);
    }

    pub fn append_revocation(&self, record: &RevocationRecord) {
        self.inner.revocations.submit(record);
    }

    /// Wait until every record submitted so far has been written (or its
    /// failure logged) on both streams.
    pub async fn flush(&self) {
        tokio::join!(
            self.inner.history.barrier(false),
            self.inner.revocations.barrier(false)
        );
    }

    /// Drain both streams and stop their writers. Later appends are logged
    /// and dropped. Calling this more than once is harmless.
    pub async fn close(&self) {
        tokio::join!(
            self.inner.history.barrier(true),
            self.inner.revocations.barrier(true)
        );
    }
}
