//! SQLite connection pool configured from `database.*`.
//!
//! Open connections are bounded by a semaphore (`max_open_conns`), up to
//! `max_idle_conns` are kept for reuse, and connections older than
//! `conn_max_lifetime` are closed instead of being handed out again.

use crate::config::DatabaseConfig;
use crate::error::DbError;
use rusqlite::Connection;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

/// Drivers this pool can open.
const SQLITE_DRIVERS: [&str; 2] = ["sqlite", "sqlite3"];

struct IdleConn {
    conn: Connection,
    opened: Instant,
}

struct Pool {
    dsn: String,
    idle: Mutex<Vec<IdleConn>>,
    permits: Option<Arc<Semaphore>>,
    max_idle: usize,
    max_lifetime: Option<Duration>,
    closed: AtomicBool,
}

impl Pool {
    fn idle(&self) -> MutexGuard<'_, Vec<IdleConn>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expired(&self, opened: Instant) -> bool {
        self.max_lifetime
            .is_some_and(|lifetime| opened.elapsed() >= lifetime)
    }

    fn connect(&self) -> Result<Connection, DbError> {
        let conn = Connection::open(&self.dsn)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(conn)
    }

    fn take_idle(&self) -> Option<IdleConn> {
        let mut idle = self.idle();
        while let Some(candidate) = idle.pop() {
            if !self.expired(candidate.opened) {
                return Some(candidate);
            }
            debug!("Closing connection past conn_max_lifetime");
        }
        None
    }

    fn release(&self, conn: Connection, opened: Instant) {
        if self.closed.load(Ordering::Acquire) || self.expired(opened) {
            return;
        }
        let mut idle = self.idle();
        if idle.len() < self.max_idle {
            idle.push(IdleConn { conn, opened });
        }
    }
}

/// Handle to the connection pool. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    pool: Arc<Pool>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("max_idle", &self.pool.max_idle)
            .field("max_lifetime", &self.pool.max_lifetime)
            .field("idle", &self.idle_count())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Validate the settings and open the first connection.
    pub fn open(config: &DatabaseConfig) -> Result<Self, DbError> {
        let driver = config.driver.trim().to_ascii_lowercase();
        if !SQLITE_DRIVERS.contains(&driver.as_str()) {
            return Err(DbError::UnsupportedDriver(config.driver.clone()));
        }
        if config.dsn.expose().trim().is_empty() {
            return Err(DbError::MissingDsn);
        }

        let permits = match config.max_open_conns {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n as usize))),
        };
        let max_lifetime = Some(config.conn_max_lifetime).filter(|d| !d.is_zero());

        let pool = Pool {
            dsn: config.dsn.expose().trim().to_string(),
            idle: Mutex::new(Vec::new()),
            permits,
            max_idle: config.max_idle_conns as usize,
            max_lifetime,
            closed: AtomicBool::new(false),
        };

        let first = pool.connect()?;
        first.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        pool.release(first, Instant::now());

        info!(
            driver = %driver,
            max_open_conns = config.max_open_conns,
            max_idle_conns = config.max_idle_conns,
            conn_max_lifetime = ?config.conn_max_lifetime,
            "Database pool ready"
        );

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Check out a connection, waiting while `max_open_conns` are in use.
    pub async fn acquire(&self) -> Result<PooledConnection, DbError> {
        if self.pool.closed.load(Ordering::Acquire) {
            return Err(DbError::Closed);
        }

        let permit = match &self.pool.permits {
            Some(semaphore) => Some(
                Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| DbError::Closed)?,
            ),
            None => None,
        };

        // Opening a connection can block on the filesystem or the busy timeout.
        let pool = Arc::clone(&self.pool);
        let (conn, opened) = tokio::task::spawn_blocking(move || match pool.take_idle() {
            Some(IdleConn { conn, opened }) => Ok((conn, opened)),
            None => pool.connect().map(|conn| (conn, Instant::now())),
        })
        .await??;

        Ok(PooledConnection {
            conn: Some(conn),
            opened,
            pool: Arc::clone(&self.pool),
            _permit: permit,
        })
    }

    /// Run `f` against a pooled connection on the blocking thread pool.
    /// The connection returns to the pool when `f` finishes.
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.acquire().await?;
        let value = tokio::task::spawn_blocking(move || f(&conn)).await??;
        Ok(value)
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), DbError> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|_| ())
    }

    /// Number of connections currently parked for reuse.
    pub fn idle_count(&self) -> usize {
        self.pool.idle().len()
    }

    /// Refuse new checkouts and drop idle connections. Checked-out
    /// connections close when returned.
    pub fn close(&self) {
        self.pool.closed.store(true, Ordering::Release);
        if let Some(semaphore) = &self.pool.permits {
            semaphore.close();
        }
        self.pool.idle().clear();
    }
}

/// A checked-out connection. Returns to the pool on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    opened: Instant,
    pool: Arc<Pool>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `None` after drop has run.
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.opened);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use tempfile::TempDir;

    fn sqlite_config(dsn: &str) -> DatabaseConfig {
        DatabaseConfig {
            dsn: Secret::new(dsn),
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn test_unsupported_driver() {
        let mut config = sqlite_config(":memory:");
        config.driver = "mysql".into();
        assert!(matches!(
            Database::open(&config),
            Err(DbError::UnsupportedDriver(d)) if d == "mysql"
        ));
    }

    #[test]
    fn test_missing_dsn() {
        let config = sqlite_config("  ");
        assert!(matches!(Database::open(&config), Err(DbError::MissingDsn)));
    }

    #[tokio::test]
    async fn test_ping_file_database() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.db");
        let db = Database::open(&sqlite_config(path.to_str().unwrap())).unwrap();
        db.ping().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_queries_run_off_the_runtime_thread() {
        let db = Database::open(&sqlite_config(":memory:")).unwrap();
        let caller = std::thread::current().id();

        let worker = db
            .with_conn(|_| Ok(std::thread::current().id()))
            .await
            .unwrap();

        assert_ne!(caller, worker);
        // Released from the worker thread back into the pool.
        assert_eq!(db.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_idle_connections_capped() {
        let mut config = sqlite_config(":memory:");
        config.max_idle_conns = 1;
        let db = Database::open(&config).unwrap();

        let a = db.acquire().await.unwrap();
        let b = db.acquire().await.unwrap();
        drop(a);
        drop(b);
        assert_eq!(db.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_idle_keeps_nothing() {
        let mut config = sqlite_config(":memory:");
        config.max_idle_conns = 0;
        let db = Database::open(&config).unwrap();
        db.ping().await.unwrap();
        assert_eq!(db.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_connections_not_reused() {
        let mut config = sqlite_config(":memory:");
        config.max_idle_conns = 2;
        config.conn_max_lifetime = Duration::from_millis(50);
        let db = Database::open(&config).unwrap();

        let a = db.acquire().await.unwrap();
        let b = db.acquire().await.unwrap();
        drop(a);
        drop(b);
        assert_eq!(db.idle_count(), 2);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let _fresh = db.acquire().await.unwrap();
        // Both parked connections were past their lifetime and got closed.
        assert_eq!(db.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_max_open_blocks_until_release() {
        let mut config = sqlite_config(":memory:");
        config.max_open_conns = 1;
        let db = Database::open(&config).unwrap();

        let held = db.acquire().await.unwrap();
        let waiting = tokio::time::timeout(Duration::from_millis(50), db.acquire()).await;
        assert!(waiting.is_err(), "second checkout should wait");

        drop(held);
        let again = tokio::time::timeout(Duration::from_secs(1), db.acquire()).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_checkout() {
        let db = Database::open(&sqlite_config(":memory:")).unwrap();
        db.close();
        assert_eq!(db.idle_count(), 0);
        assert!(matches!(db.acquire().await, Err(DbError::Closed)));
    }
}
