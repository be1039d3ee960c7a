//! In-memory event log for testing and development.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{DbError, EventLogRow, EventLogStore};

#[derive(Default)]
struct Inner {
    rows: Mutex<Vec<EventLogRow>>,
    fail_begin: AtomicBool,
    fail_insert: AtomicBool,
    fail_commit: AtomicBool,
    begun: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
}

/// Event log that keeps committed rows in memory.
///
/// Clones share the same rows, so a test can keep one handle while the
/// recorder owns another.
#[derive(Clone, Default)]
pub struct MemoryEventLog {
    inner: Arc<Inner>,
}

/// A pending in-memory transaction.
#[derive(Debug, Default)]
pub struct MemoryTx {
    rows: Vec<EventLogRow>,
}

impl MemoryEventLog {
    /// Create an empty event log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `begin` fail.
    pub fn fail_begin(&self, fail: bool) {
        self.inner.fail_begin.store(fail, Ordering::SeqCst);
    }

    /// Make every `insert_event` fail.
    pub fn fail_inserts(&self, fail: bool) {
        self.inner.fail_insert.store(fail, Ordering::SeqCst);
    }

    /// Make every `commit` fail.
    pub fn fail_commits(&self, fail: bool) {
        self.inner.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the committed rows.
    pub fn rows(&self) -> Vec<EventLogRow> {
        self.lock_rows().clone()
    }

    /// Number of transactions begun.
    pub fn transactions_begun(&self) -> usize {
        self.inner.begun.load(Ordering::SeqCst)
    }

    /// Number of transactions committed.
    pub fn transactions_committed(&self) -> usize {
        self.inner.committed.load(Ordering::SeqCst)
    }

    /// Number of transactions rolled back.
    pub fn transactions_rolled_back(&self) -> usize {
        self.inner.rolled_back.load(Ordering::SeqCst)
    }

    fn lock_rows(&self) -> std::sync::MutexGuard<'_, Vec<EventLogRow>> {
        // A poisoned lock only means a test panicked mid-append; the rows are still usable.
        self.inner
            .rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EventLogStore for MemoryEventLog {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, DbError> {
        if self.inner.fail_begin.load(Ordering::SeqCst) {
            return Err(DbError::Injected { operation: "begin" });
        }
        self.inner.begun.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryTx::default())
    }

    async fn insert_event(&self, tx: &mut Self::Tx, row: &EventLogRow) -> Result<(), DbError> {
        if self.inner.fail_insert.load(Ordering::SeqCst) {
            return Err(DbError::Injected { operation: "insert" });
        }
        tx.rows.push(row.clone());
        Ok(())
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), DbError> {
        if self.inner.fail_commit.load(Ordering::SeqCst) {
            return Err(DbError::Injected { operation: "commit" });
        }
        self.lock_rows().extend(tx.rows);
        self.inner.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, _tx: Self::Tx) -> Result<(), DbError> {
        self.inner.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
