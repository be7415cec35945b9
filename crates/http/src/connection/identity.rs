use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::protocol::HttpError;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one transport connection.
///
/// Clones share state, and every request served over a connection carries a clone in its
/// extensions. Two handles are equal only if they are clones of each other. Once closed, the
/// identity refuses further exchanges.
#[derive(Clone)]
pub struct ConnectionId {
    inner: Arc<Inner>,
}

struct Inner {
    id: u64,
    closed: AtomicBool,
    served: AtomicU64,
}

impl ConnectionId {
    pub fn new() -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self { inner: Arc::new(Inner { id, closed: AtomicBool::new(false), served: AtomicU64::new(0) }) }
    }

    /// Process-wide unique number, for logs.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn same_as(&self, other: &ConnectionId) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Marks the connection closed. Irreversible.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    /// Registers a new request/response exchange and returns its 1-based sequence number.
    pub fn begin_exchange(&self) -> Result<u64, HttpError> {
        if self.is_closed() {
            return Err(HttpError::ConnectionClosed { id: self.id() });
        }
        Ok(self.inner.served.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn requests_served(&self) -> u64 {
        self.inner.served.load(Ordering::Acquire)
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ConnectionId {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for ConnectionId {}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionId")
            .field("id", &self.id())
            .field("closed", &self.is_closed())
            .field("served", &self.requests_served())
            .finish()
    }
}
