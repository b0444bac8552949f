//! Per-server request admission.
//!
//! Tile requests are throttled per server: when too many requests to the
//! same host are in flight, new ones are refused rather than queued. The
//! caller is expected to retry on a later frame.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

/// Default number of concurrent requests allowed per server.
pub const DEFAULT_MAX_REQUESTS_PER_SERVER: usize = 6;

/// Decides whether a request to a server may start now.
pub trait Admission: Send + Sync + 'static {
    /// Try to reserve a slot for `server_key`. Returns `false` if the
    /// server is at capacity.
    fn try_acquire(&self, server_key: &str) -> bool;

    /// Give back a slot previously reserved with [`Admission::try_acquire`].
    fn release(&self, server_key: &str);
}

/// Counts in-flight requests per server key.
#[derive(Debug)]
pub struct RequestScheduler {
    max_requests_per_server: usize,
    active: Mutex<HashMap<String, usize>>,
}

impl RequestScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_requests_per_server(DEFAULT_MAX_REQUESTS_PER_SERVER)
    }

    #[must_use]
    pub fn with_max_requests_per_server(max_requests_per_server: usize) -> Self {
        Self {
            max_requests_per_server,
            active: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn max_requests_per_server(&self) -> usize {
        self.max_requests_per_server
    }

    /// Number of requests currently in flight to `server_key`.
    #[must_use]
    pub fn active_requests(&self, server_key: &str) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(server_key)
            .copied()
            .unwrap_or(0)
    }

    /// Number of servers with at least one request in flight.
    #[must_use]
    pub fn active_servers(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for RequestScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Admission for RequestScheduler {
    fn try_acquire(&self, server_key: &str) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.get_mut(server_key) {
            Some(count) if *count >= self.max_requests_per_server => false,
            Some(count) => {
                *count += 1;
                true
            }
            None if self.max_requests_per_server == 0 => false,
            None => {
                active.insert(server_key.to_string(), 1);
                true
            }
        }
    }

    fn release(&self, server_key: &str) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = active.get_mut(server_key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                active.remove(server_key);
            }
        }
    }
}

/// A reserved slot. The slot is released when the permit is dropped.
pub struct AdmissionPermit<A: Admission> {
    admission: Arc<A>,
    server_key: String,
}

impl<A: Admission> AdmissionPermit<A> {
    /// Reserve a slot for `server_key`, or `None` if the server is busy.
    pub fn try_acquire(admission: &Arc<A>, server_key: &str) -> Option<Self> {
        admission.try_acquire(server_key).then(|| Self {
            admission: Arc::clone(admission),
            server_key: server_key.to_string(),
        })
    }

    #[must_use]
    pub fn server_key(&self) -> &str {
        &self.server_key
    }
}

impl<A: Admission> Drop for AdmissionPermit<A> {
    fn drop(&mut self) {
        self.admission.release(&self.server_key);
    }
}

impl<A: Admission> std::fmt::Debug for AdmissionPermit<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPermit")
            .field("server_key", &self.server_key)
            .finish_non_exhaustive()
    }
}
