//! Commit notifications, one topic per table.
//!
//! The cache has no framework-level "auto-updating query" machinery, so
//! change propagation is explicit: every committed write announces itself on the
//! topic of each table it touched. Two kinds of consumer hang off a topic:
//!
//! - live queries subscribe to the broadcast channel and re-run their query
//!   on every event;
//! - pagers snapshot the generation counter at construction and refuse to
//!   serve pages once it has moved on.
//!
//! Writers follow a two-step protocol: bump the generation (`invalidate`)
//! before the COMMIT, send the event (`notify`) after it. A reader whose
//! SELECT observed the write's data therefore always finds the generation
//! already moved when it re-checks after the SELECT, while subscribers are
//! only ever woken for state that actually committed.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Tables a write can touch and a query can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Table {
    Albums,
    Photos,
}

/// A single table's notification topic.
#[derive(Debug)]
struct Topic {
    generation: AtomicU64,
    changed: broadcast::Sender<()>,
}

impl Topic {
    fn new() -> Self {
        // Receivers that fall behind see `Lagged` and recompute; a deep
        // buffer is pointless since events carry no payload.
        let (changed, _) = broadcast::channel(16);
        Self { generation: AtomicU64::new(0), changed }
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn notify(&self) {
        // No receivers is fine: nobody is watching right now.
        _ = self.changed.send(());
    }
}

/// Notification hub shared by every repository over one database.
#[derive(Debug)]
pub(crate) struct ChangeBus {
    albums: Topic,
    photos: Topic,
}

impl ChangeBus {
    pub(crate) fn new() -> Self {
        Self { albums: Topic::new(), photos: Topic::new() }
    }

    fn topic(&self, table: Table) -> &Topic {
        match table {
            Table::Albums => &self.albums,
            Table::Photos => &self.photos,
        }
    }

    /// Move `table` to a new generation. Called by writers before their
    /// COMMIT so no reader can observe the write under the old generation.
    pub(crate) fn invalidate(&self, table: Table) {
        self.topic(table).invalidate();
    }

    /// Wake subscribers of `table`. Called by writers after a successful
    /// COMMIT.
    pub(crate) fn notify(&self, table: Table) {
        self.topic(table).notify();
    }

    /// Current generation of `table`; bumped once per write.
    pub(crate) fn generation(&self, table: Table) -> u64 {
        self.topic(table).generation.load(Ordering::SeqCst)
    }

    /// Subscribe to commit events for `table`.
    pub(crate) fn subscribe(&self, table: Table) -> broadcast::Receiver<()> {
        self.topic(table).changed.subscribe()
    }
}
