use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, RwLock};

use super::events::Broadcast;

/// Bounded per-client delivery queue.
///
/// The hub pushes, the owning session's outbound task pops. A push onto a
/// full queue evicts the oldest undelivered frame, so a stalled consumer can
/// never hold up the dispatcher. The interior mutex is never held across an
/// await.
#[derive(Clone)]
pub struct Outbox {
    inner: Arc<OutboxInner>,
}

struct OutboxInner {
    capacity: usize,
    buf: Mutex<VecDeque<Broadcast>>,
    ready: Notify,
    dropped: AtomicU64,
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(OutboxInner {
                capacity: capacity.max(1),
                buf: Mutex::new(VecDeque::new()),
                ready: Notify::new(),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Queue a frame for delivery. Returns the evicted frame when the queue
    /// was already at capacity.
    pub fn push(&self, frame: Broadcast) -> Option<Broadcast> {
        let evicted = {
            let mut buf = self.inner.buf.lock().expect("outbox lock poisoned");
            let evicted = if buf.len() == self.inner.capacity {
                buf.pop_front()
            } else {
                None
            };
            buf.push_back(frame);
            evicted
        };
        if evicted.is_some() {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.ready.notify_one();
        evicted
    }

    /// Wait for the next frame.
    pub async fn pop(&self) -> Broadcast {
        loop {
            if let Some(frame) = self.try_pop() {
                return frame;
            }
            self.inner.ready.notified().await;
        }
    }

    /// Take the next frame if one is already queued.
    pub fn try_pop(&self) -> Option<Broadcast> {
        self.inner
            .buf
            .lock()
            .expect("outbox lock poisoned")
            .pop_front()
    }

    /// Total frames evicted from this queue since registration.
    pub fn drop_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    fn same_queue(&self, other: &Outbox) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Registered client delivery queues, one per attached session token.
///
/// One lock, shared for the fan-out snapshot and exclusive for
/// register/unregister.
#[derive(Default)]
pub struct ChannelTable {
    entries: RwLock<HashMap<String, Outbox>>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a fresh outbox for `token`, replacing any existing
    /// registration (at most one live queue per token).
    pub async fn register(&self, token: &str, capacity: usize) -> Outbox {
        let outbox = Outbox::new(capacity);
        self.entries
            .write()
            .await
            .insert(token.to_string(), outbox.clone());
        outbox
    }

    /// Drop a registration. Removes the entry only while it still belongs to
    /// `outbox`: a session whose queue was replaced by a reconnect must not
    /// take the replacement down with it. Idempotent.
    pub async fn unregister(&self, token: &str, outbox: &Outbox) {
        let mut entries = self.entries.write().await;
        if entries
            .get(token)
            .is_some_and(|current| current.same_queue(outbox))
        {
            entries.remove(token);
        }
    }

    /// Snapshot the registered queues for one fan-out pass. The read lock is
    /// released before the caller writes to any queue.
    pub async fn snapshot(&self) -> Vec<(String, Outbox)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(token, outbox)| (token.clone(), outbox.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
