use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use costkube_core::error::{CostError, Result};
use costkube_core::query::{StoreState, StoreStatus};
use costkube_core::time::{Clock, SystemClock, truncate_to_micros};
use duckdb::Connection;
use tracing::{debug, info};

use crate::schema::SCHEMA_SQL;

/// Append-only store of namespace and pod cost snapshots.
///
/// Cloning is cheap and every clone shares the same database. Each operation
/// opens its own connection from the shared handle and drops it before
/// returning, so readers never wait on each other or on writers. Writers are
/// serialized through `write_gate` for the duration of one batch.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<Inner>>,
    write_gate: Arc<Mutex<()>>,
    clock: Arc<dyn Clock>,
    db_path: String,
}

struct Inner {
    conn: Option<Connection>,
    state: StoreState,
    last_ts: Option<DateTime<Utc>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| CostError::Io(format!("failed to create db dir: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| CostError::StorageFailure(format!("failed to open duckdb: {e}")))?;
        conn.execute_batch("PRAGMA threads=4;")
            .map_err(|e| CostError::StorageFailure(format!("failed to set pragmas: {e}")))?;

        Ok(Self::from_connection(conn, path.display().to_string()))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CostError::StorageFailure(format!("failed to open in-memory db: {e}")))?;
        Ok(Self::from_connection(conn, ":memory:".to_string()))
    }

    fn from_connection(conn: Connection, db_path: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                conn: Some(conn),
                state: StoreState::Uninitialized,
                last_ts: None,
            })),
            write_gate: Arc::new(Mutex::new(())),
            clock: Arc::new(SystemClock),
            db_path,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create both record families and their indexes. Safe to call again.
    pub fn initialize(&self) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.state == StoreState::Closed {
            return Err(CostError::StoreNotReady("store is closed".to_string()));
        }
        let conn = inner
            .conn
            .as_ref()
            .ok_or_else(|| CostError::StoreNotReady("store has no connection".to_string()))?;
        conn.execute_batch(SCHEMA_SQL).map_err(|e| {
            CostError::StorageFailure(format!("failed to initialize schema: {e}"))
        })?;

        // Resume the timestamp floor from disk so restarts stay monotonic.
        let newest = scalar_ts(
            conn,
            "SELECT MAX(ts) FROM (
               SELECT MAX(ts) AS ts FROM namespace_metrics
               UNION ALL
               SELECT MAX(ts) AS ts FROM pod_metrics
             )",
        )?;
        inner.last_ts = inner.last_ts.max(newest);

        if inner.state != StoreState::Ready {
            info!(db_path = %self.db_path, "metrics store ready");
        }
        inner.state = StoreState::Ready;
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.state = StoreState::Closed;
        inner.conn = None;
        debug!(db_path = %self.db_path, "metrics store closed");
        Ok(())
    }

    pub fn state(&self) -> StoreState {
        self.lock()
            .map(|inner| inner.state)
            .unwrap_or(StoreState::Closed)
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| CostError::Internal("store mutex poisoned".to_string()))
    }

    /// A fresh connection for one operation. Dropping it releases it.
    pub(crate) fn conn(&self) -> Result<Connection> {
        let inner = self.lock()?;
        checkout(&inner)
    }

    /// Current time on this store's clock, never earlier than a timestamp
    /// it has already handed out.
    pub(crate) fn now(&self) -> Result<DateTime<Utc>> {
        let inner = self.lock()?;
        let now = truncate_to_micros(self.clock.now());
        Ok(inner.last_ts.map_or(now, |last| now.max(last)))
    }

    /// Connection plus the timestamp for one append batch. The caller must
    /// hold the write gate so timestamps are handed out in commit order.
    pub(crate) fn checkout_for_write(&self) -> Result<(Connection, DateTime<Utc>)> {
        let mut inner = self.lock()?;
        let conn = checkout(&inner)?;
        let now = truncate_to_micros(self.clock.now());
        let ts = inner.last_ts.map_or(now, |last| now.max(last));
        inner.last_ts = Some(ts);
        Ok((conn, ts))
    }

    pub(crate) fn write_gate(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_gate
            .lock()
            .map_err(|_| CostError::Internal("store write gate poisoned".to_string()))
    }

    pub fn status(&self) -> Result<StoreStatus> {
        let state = self.state();
        let db_size_bytes = if self.db_path == ":memory:" {
            0
        } else {
            fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0)
        };

        if state != StoreState::Ready {
            return Ok(StoreStatus {
                db_path: self.db_path.clone(),
                db_size_bytes,
                state,
                namespace_rows: 0,
                pod_rows: 0,
                oldest_ts: None,
                newest_ts: None,
            });
        }

        let conn = self.conn()?;
        let namespace_rows = scalar_usize(&conn, "SELECT COUNT(*) FROM namespace_metrics")?;
        let pod_rows = scalar_usize(&conn, "SELECT COUNT(*) FROM pod_metrics")?;
        let oldest_ts = scalar_ts(
            &conn,
            "SELECT MIN(ts) FROM (
               SELECT MIN(ts) AS ts FROM namespace_metrics
               UNION ALL
               SELECT MIN(ts) AS ts FROM pod_metrics
             )",
        )?;
        let newest_ts = scalar_ts(
            &conn,
            "SELECT MAX(ts) FROM (
               SELECT MAX(ts) AS ts FROM namespace_metrics
               UNION ALL
               SELECT MAX(ts) AS ts FROM pod_metrics
             )",
        )?;

        Ok(StoreStatus {
            db_path: self.db_path.clone(),
            db_size_bytes,
            state,
            namespace_rows,
            pod_rows,
            oldest_ts,
            newest_ts,
        })
    }
}

fn checkout(inner: &Inner) -> Result<Connection> {
    match (inner.state, inner.conn.as_ref()) {
        (StoreState::Ready, Some(conn)) => conn
            .try_clone()
            .map_err(|e| CostError::StorageFailure(format!("failed to open connection: {e}"))),
        (StoreState::Closed, _) => Err(CostError::StoreNotReady("store is closed".to_string())),
        _ => Err(CostError::StoreNotReady(
            "store has not been initialized".to_string(),
        )),
    }
}

pub(crate) fn naive_to_utc(ts: NaiveDateTime) -> DateTime<Utc> {
    ts.and_utc()
}

fn scalar_usize(conn: &Connection, sql: &str) -> Result<usize> {
    conn.query_row(sql, [], |row| row.get::<_, i64>(0))
        .map(|v| v as usize)
        .map_err(|e| CostError::StorageFailure(format!("query failed: {e}")))
}

fn scalar_ts(conn: &Connection, sql: &str) -> Result<Option<DateTime<Utc>>> {
    conn.query_row(sql, [], |row| row.get::<_, Option<NaiveDateTime>>(0))
        .map(|opt| opt.map(naive_to_utc))
        .map_err(|e| CostError::StorageFailure(format!("query failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_initializes() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.state(), StoreState::Uninitialized);
        store.initialize().unwrap();
        let status = store.status().unwrap();
        assert_eq!(status.state, StoreState::Ready);
        assert_eq!(status.namespace_rows, 0);
        assert_eq!(status.pod_rows, 0);
        assert_eq!(status.newest_ts, None);
    }

    #[test]
    fn initialize_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();
        store.initialize().unwrap();
        assert_eq!(store.state(), StoreState::Ready);
    }

    #[test]
    fn timestamp_indexes_exist_after_initialize() {
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();
        let conn = store.conn().unwrap();
        let mut names = conn
            .prepare("SELECT index_name FROM duckdb_indexes() WHERE index_name LIKE 'idx_%_ts'")
            .unwrap()
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<duckdb::Result<Vec<_>>>()
            .unwrap();
        names.sort();
        assert_eq!(names, vec!["idx_namespace_metrics_ts", "idx_pod_metrics_ts"]);
    }

    #[test]
    fn operations_before_initialize_fail() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(store.conn(), Err(CostError::StoreNotReady(_))));
        let status = store.status().unwrap();
        assert_eq!(status.state, StoreState::Uninitialized);
    }

    #[test]
    fn closed_store_rejects_work() {
        let store = Store::open_in_memory().unwrap();
        store.initialize().unwrap();
        store.close().unwrap();
        assert_eq!(store.state(), StoreState::Closed);
        assert!(matches!(store.conn(), Err(CostError::StoreNotReady(_))));
        assert!(matches!(store.initialize(), Err(CostError::StoreNotReady(_))));
    }
}
