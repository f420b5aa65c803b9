//! Transactions, segments, and the shared metrics collector handle.
//!
//! A [`Transaction`] is a cheap, clonable handle on one backend transaction.
//! It ends exactly once: on an explicit [`end`](Transaction::end), or when
//! the last handle is dropped. A transaction dropped while its thread is
//! unwinding from a panic records that panic as an error before ending, so
//! a crashing handler still shows up in metrics.
//!
//! Keyed transactions (see [`Collector::transaction`]) live in a concurrent
//! map of weak handles. An entry goes away when the last strong handle for
//! it does, which ties cleanup to the end of whatever request used it.

use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use http::StatusCode;
use tracing::debug;

use crate::backend::{
    DataStore, MetricsCollector, NoopSegment, NoopTransaction, SegmentRecorder, TransactionRecorder,
};
use crate::panic::Fault;

type Key = (String, String);
type OpenTransactions = DashMap<Key, Weak<Inner>>;

// ── Collector ─────────────────────────────────────────────────────────────────

/// Registry entry for the metrics backend: the backend itself plus the
/// table of open keyed transactions.
pub struct Collector {
    backend: Arc<dyn MetricsCollector>,
    open: Arc<OpenTransactions>,
}

impl Collector {
    pub fn new(backend: Arc<dyn MetricsCollector>) -> Self {
        Self { backend, open: Arc::new(DashMap::new()) }
    }

    /// Starts a transaction not tracked in the keyed table.
    pub fn start_transaction(&self, name: &str) -> Transaction {
        Transaction::new(name, self.backend.start_transaction(name), None)
    }

    /// Returns the open transaction registered under `(id, name)`, starting
    /// one if there is none. Concurrent callers with the same key get the
    /// same transaction.
    pub fn transaction(&self, id: &str, name: &str) -> Transaction {
        let key = (id.to_owned(), name.to_owned());
        let mut slot = self.open.entry(key.clone()).or_default();
        if let Some(inner) = slot.upgrade() {
            return Transaction(inner);
        }

        let store = Arc::downgrade(&self.open);
        let txn = Transaction::new(name, self.backend.start_transaction(name), Some((store, key)));
        *slot = Arc::downgrade(&txn.0);
        txn
    }

    /// Number of keyed transactions currently open.
    pub fn open_transactions(&self) -> usize {
        self.open.iter().filter(|e| e.value().strong_count() > 0).count()
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector").field("open", &self.open.len()).finish()
    }
}

// ── Transaction ───────────────────────────────────────────────────────────────

/// Handle on one metrics transaction.
#[derive(Clone)]
pub struct Transaction(Arc<Inner>);

struct Inner {
    name: Arc<str>,
    recorder: Box<dyn TransactionRecorder>,
    ended: AtomicBool,
    slot: Option<(Weak<OpenTransactions>, Key)>,
}

impl Transaction {
    fn new(
        name: &str,
        recorder: Box<dyn TransactionRecorder>,
        slot: Option<(Weak<OpenTransactions>, Key)>,
    ) -> Self {
        Self(Arc::new(Inner {
            name: Arc::from(name),
            recorder,
            ended: AtomicBool::new(false),
            slot,
        }))
    }

    /// A transaction that records nothing. Handed out when no metrics
    /// backend is available so callers never need to branch.
    pub fn noop(name: &str) -> Self {
        Self::new(name, Box::new(NoopTransaction), None)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_ended(&self) -> bool {
        self.0.ended.load(Ordering::Acquire)
    }

    pub fn start_segment(&self, name: &str) -> Segment {
        if self.is_ended() {
            return Segment(Some(Box::new(NoopSegment)));
        }
        Segment(Some(self.0.recorder.start_segment(name)))
    }

    pub fn start_datastore_segment(&self, datastore: &DataStore) -> Segment {
        if self.is_ended() {
            return Segment(Some(Box::new(NoopSegment)));
        }
        Segment(Some(self.0.recorder.start_datastore_segment(datastore)))
    }

    pub fn notice_error(&self, err: &(dyn StdError + 'static)) {
        if !self.is_ended() {
            self.0.recorder.notice_error(err);
        }
    }

    pub fn set_status(&self, status: StatusCode) {
        if !self.is_ended() {
            self.0.recorder.set_status(status);
        }
    }

    /// Ends the transaction. Later calls, on this or any clone, do nothing.
    pub fn end(&self) {
        self.0.finish();
    }
}

impl Inner {
    fn finish(&self) {
        if self.ended.swap(true, Ordering::AcqRel) {
            return;
        }
        self.recorder.end();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if !self.ended.load(Ordering::Acquire) {
            if std::thread::panicking() {
                let fault = Fault::new(format!("transaction `{}` unwound by a panic", self.name), None);
                self.recorder.notice_error(&fault);
            }
            debug!(transaction = %self.name, "ending dropped transaction");
            self.finish();
        }
        if let Some((store, key)) = &self.slot {
            if let Some(store) = store.upgrade() {
                store.remove_if(key, |_, weak| weak.strong_count() == 0);
            }
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("name", &self.0.name)
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// A running segment. Ends on [`end`](Segment::end) or drop.
pub struct Segment(Option<Box<dyn SegmentRecorder>>);

impl Segment {
    pub fn end(mut self) {
        if let Some(recorder) = self.0.take() {
            recorder.end();
        }
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if let Some(recorder) = self.0.take() {
            recorder.end();
        }
    }
}
