//! Connection management
//!
//! A [`ConnectionManager`] hands out the one shared [`Database`] handle for
//! its location. The handle is opened lazily on first `acquire`; concurrent
//! first callers wait on the same in-flight open instead of racing to open
//! their own, and share its outcome whether it succeeds or fails. A failed
//! open is not cached, so a later `acquire` retries.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::error::{StorageError, StorageResult};
use super::queries;

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// SQLite file on disk
    File(PathBuf),
    /// Private in-memory database (for testing)
    Memory,
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::File(path) => write!(f, "{}", path.display()),
            StoreLocation::Memory => f.write_str(":memory:"),
        }
    }
}

/// An open SQLite connection shared by every store operation
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    location: StoreLocation,
}

impl Database {
    /// Open the database at `location` (blocking)
    fn open(location: StoreLocation) -> StorageResult<Self> {
        let conn = match &location {
            StoreLocation::File(path) => Connection::open(path),
            StoreLocation::Memory => Connection::open_in_memory(),
        }
        .and_then(|conn| {
            queries::register_functions(&conn)?;
            Ok(conn)
        })
        .map_err(|source| StorageError::Unavailable {
            location: location.clone(),
            source: Arc::new(source),
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
        })
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Run a blocking operation against the connection
    ///
    /// The closure runs on tokio's blocking pool so the caller's task is
    /// suspended, not blocked, while SQLite does I/O.
    pub async fn run<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StorageError::Poisoned)?;
            f(&mut guard)
        })
        .await?
    }
}

/// Lazily opens and memoizes the shared [`Database`] handle
pub struct ConnectionManager {
    location: StoreLocation,
    handle: OnceCell<Arc<Database>>,
    /// Held while an open is in flight; keeps the last failure for waiters
    opening: tokio::sync::Mutex<Option<FailedOpen>>,
    open_attempts: AtomicUsize,
}

/// Outcome of the most recent failed open
struct FailedOpen {
    /// Value of `open_attempts` once that attempt finished
    attempt: usize,
    source: Arc<rusqlite::Error>,
}

impl ConnectionManager {
    pub fn new(location: StoreLocation) -> Self {
        Self {
            location,
            handle: OnceCell::new(),
            opening: tokio::sync::Mutex::new(None),
            open_attempts: AtomicUsize::new(0),
        }
    }

    /// Manager for a private in-memory database
    pub fn in_memory() -> Self {
        Self::new(StoreLocation::Memory)
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Get the shared handle, opening the database if needed
    ///
    /// Only one open runs at a time. Callers that arrive while it is in
    /// flight get its result: the shared handle, or the same
    /// `Unavailable` error. Nothing is cached on failure, so a call made
    /// after a failed open has finished starts a new attempt.
    pub async fn acquire(&self) -> StorageResult<Arc<Database>> {
        if let Some(db) = self.handle.get() {
            return Ok(Arc::clone(db));
        }

        let finished_before = self.open_attempts.load(Ordering::SeqCst);
        let mut last_failure = self.opening.lock().await;

        if let Some(db) = self.handle.get() {
            return Ok(Arc::clone(db));
        }
        if let Some(failed) = last_failure.as_ref() {
            if failed.attempt > finished_before {
                debug!("Sharing failed open attempt {}", failed.attempt);
                return Err(StorageError::Unavailable {
                    location: self.location.clone(),
                    source: Arc::clone(&failed.source),
                });
            }
        }

        info!(
            "Opening database at {} (attempt {})",
            self.location,
            finished_before + 1
        );
        let location = self.location.clone();
        let result = tokio::task::spawn_blocking(move || Database::open(location))
            .await
            .map_err(StorageError::from)
            .and_then(|opened| opened);
        let attempt = self.open_attempts.fetch_add(1, Ordering::SeqCst) + 1;

        match result {
            Ok(db) => {
                debug!("Database connection established");
                let db = Arc::new(db);
                let _ = self.handle.set(Arc::clone(&db));
                *last_failure = None;
                Ok(db)
            }
            Err(e) => {
                warn!("Failed to open database: {}", e);
                *last_failure = match &e {
                    StorageError::Unavailable { source, .. } => Some(FailedOpen {
                        attempt,
                        source: Arc::clone(source),
                    }),
                    _ => None,
                };
                Err(e)
            }
        }
    }

    /// Whether a handle has been opened
    pub fn is_open(&self) -> bool {
        self.handle.initialized()
    }

    /// Number of open attempts made so far (successful or not)
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_acquire_opens_once() {
        let manager = ConnectionManager::in_memory();
        assert!(!manager.is_open());

        let first = manager.acquire().await.unwrap();
        let second = manager.acquire().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(manager.is_open());
        assert_eq!(manager.open_attempts(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_shares_one_open() {
        let manager = Arc::new(ConnectionManager::in_memory());

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move { manager.acquire().await }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap().unwrap());
        }

        assert_eq!(manager.open_attempts(), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_failed_open_is_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        let missing_dir = temp_dir.path().join("not-yet");
        let manager = ConnectionManager::new(StoreLocation::File(missing_dir.join("hyperhold.db")));

        let err = manager.acquire().await.err().unwrap();
        assert!(matches!(err, StorageError::Unavailable { .. }));
        assert!(err.is_retryable());
        assert!(!manager.is_open());

        // Once the directory exists the next call opens cleanly
        std::fs::create_dir_all(&missing_dir).unwrap();
        let db = manager.acquire().await.unwrap();
        assert!(manager.is_open());
        assert_eq!(manager.open_attempts(), 2);
        assert_eq!(
            db.location(),
            &StoreLocation::File(missing_dir.join("hyperhold.db"))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_shares_failed_open() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing").join("hyperhold.db");
        let manager = Arc::new(ConnectionManager::new(StoreLocation::File(missing)));

        // Hold the gate so every caller queues behind one attempt
        let gate = manager.opening.lock().await;
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move { manager.acquire().await }));
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        drop(gate);

        for task in tasks {
            let err = task.await.unwrap().err().unwrap();
            assert!(matches!(err, StorageError::Unavailable { .. }));
        }
        assert_eq!(manager.open_attempts(), 1);
        assert!(!manager.is_open());

        // A call after the failure finished tries again
        assert!(manager.acquire().await.is_err());
        assert_eq!(manager.open_attempts(), 2);
    }

    #[tokio::test]
    async fn test_run_executes_on_shared_connection() {
        let manager = ConnectionManager::in_memory();
        let db = manager.acquire().await.unwrap();

        db.run(|conn| {
            conn.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (7);")
                .map_err(|e| StorageError::write("seed test table", e))
        })
        .await
        .unwrap();

        let again = manager.acquire().await.unwrap();
        let value: i64 = again
            .run(|conn| {
                conn.query_row("SELECT v FROM t", [], |row| row.get(0))
                    .map_err(|e| StorageError::read("read test table", e))
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_location_display() {
        assert_eq!(StoreLocation::Memory.to_string(), ":memory:");
        assert_eq!(
            StoreLocation::File(PathBuf::from("/data/hyperhold.db")).to_string(),
            "/data/hyperhold.db"
        );
    }
}
