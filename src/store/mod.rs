//! Durable store backed by SQLite
//!
//! All statements run on one worker thread that owns the connection. Work is
//! submitted over a FIFO channel, so operations apply in the order they were
//! submitted even when callers await the results on detached tasks.

mod migrations;
mod sessions;
mod timers;

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex, OnceLock},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use migrations::run_migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type StoreTask = Box<dyn FnOnce(Option<&mut Connection>) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct StoreInner {
    path: PathBuf,
    sender: OnceLock<mpsc::Sender<StoreCommand>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let Some(sender) = self.sender.get() else {
            return;
        };

        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = sender.send(StoreCommand::Shutdown) {
                debug!("Store worker already gone: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store worker: {join_err:?}");
            }
        }
    }
}

/// Result of a submitted store operation.
///
/// The operation is already queued when this is returned; awaiting it only
/// observes the outcome.
#[must_use = "dropping a pending result discards the operation outcome"]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// Wait for the worker to finish the operation
    pub async fn wait(self) -> Result<T> {
        self.rx
            .await
            .map_err(|_| anyhow!("store worker is not running"))?
    }
}

/// Handle to the durable store. Cheap to clone; clones share one worker.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a handle for the database at `path`.
    ///
    /// Nothing is opened until the first operation is submitted.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: path.into(),
                sender: OnceLock::new(),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        self.inner.path.as_path()
    }

    /// Whether the worker has been started
    pub fn is_open(&self) -> bool {
        self.inner.sender.get().is_some()
    }

    /// Queue `task` on the worker thread and return its pending result
    pub fn submit<F, T>(&self, task: F) -> Pending<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = match conn {
                Some(conn) => task(conn),
                None => Err(anyhow!("store is unavailable")),
            };
            if reply_tx.send(result).is_err() {
                debug!("Store caller dropped before receiving result");
            }
        }));

        // A failed send drops the reply sender, which `Pending::wait` reports.
        if self.sender().send(command).is_err() {
            error!("Failed to queue store operation: worker is not running");
        }

        Pending { rx: reply_rx }
    }

    /// Submit and wait in one step
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(task).wait().await
    }

    fn sender(&self) -> &mpsc::Sender<StoreCommand> {
        self.inner.sender.get_or_init(|| self.spawn_worker())
    }

    fn spawn_worker(&self) -> mpsc::Sender<StoreCommand> {
        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let path = self.inner.path.clone();

        let spawned = thread::Builder::new()
            .name("study-timer-store".into())
            .spawn(move || store_worker(path, command_rx));

        match spawned {
            Ok(handle) => {
                let mut guard = match self.inner.worker.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                *guard = Some(handle);
            }
            Err(err) => error!("Failed to spawn store worker thread: {err}"),
        }

        command_tx
    }
}

fn store_worker(path: PathBuf, commands: mpsc::Receiver<StoreCommand>) {
    let mut conn = match open_connection(&path) {
        Ok(conn) => {
            info!("Store opened at {}", path.display());
            Some(conn)
        }
        Err(err) => {
            error!("Failed to open store at {}: {err:#}", path.display());
            None
        }
    };

    while let Ok(command) = commands.recv() {
        match command {
            StoreCommand::Execute(task) => task(conn.as_mut()),
            StoreCommand::Shutdown => break,
        }
    }

    debug!("Store worker shutting down");
}

fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create store directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path).context("failed to open SQLite database")?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode: {err}");
    }

    run_migrations(&mut conn).context("failed to run store migrations")?;
    Ok(conn)
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}
