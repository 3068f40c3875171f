//! Fixed-capacity lending pool of connection handles.
//!
//! The pool is the only serialization point in the gateway: a semaphore with
//! one permit per slot bounds how many handles are out at once. Sessions are
//! created lazily, the first time a permit is held and no idle handle is
//! available. Idle handles are kept in a plain `Vec` behind a
//! `std::sync::Mutex` that is never held across an await point.
//!
//! Borrowers get a [`PooledHandle`] and must finish with either
//! [`PooledHandle::release`] (handle returns to the idle set) or
//! [`PooledHandle::discard`] (physical connection is torn down). A guard that
//! is simply dropped, e.g. because the borrowing future was cancelled, counts
//! as a discard: the session is dropped without a graceful close, which makes
//! the server roll back any transaction left open. A handle is never returned
//! to the idle set in an unknown state.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::db::session::{Connector, SqlSession};
use crate::error::{GatewayError, GatewayResult};

/// A pooled connection handle: the session plus the database it is
/// currently switched to, if any.
pub struct Handle<S> {
    session: S,
    bound_database: Option<String>,
}

impl<S> Handle<S> {
    pub(crate) fn new(session: S) -> Self {
        Self {
            session,
            bound_database: None,
        }
    }

    /// The database this handle is currently bound to.
    pub fn bound_database(&self) -> Option<&str> {
        self.bound_database.as_deref()
    }

    /// Record a new binding after a successful switch.
    pub fn set_bound_database(&mut self, database: impl Into<String>) {
        self.bound_database = Some(database.into());
    }

    /// Mutable access to the underlying session.
    pub fn session(&mut self) -> &mut S {
        &mut self.session
    }
}

struct PoolShared<S> {
    /// Idle handles. Sync mutex, never held across an await.
    idle: Mutex<Vec<Handle<S>>>,
    /// Total successful acquires, for observability and tests.
    acquires: AtomicU64,
    /// Total physical connections opened.
    connects: AtomicU64,
    /// Total handles discarded instead of returned.
    discards: AtomicU64,
}

/// Fixed-capacity connection pool over a [`Connector`].
pub struct ConnectionPool<C: Connector> {
    connector: C,
    capacity: usize,
    acquire_timeout: Option<Duration>,
    semaphore: Arc<Semaphore>,
    shared: Arc<PoolShared<C::Session>>,
}

impl<C: Connector> ConnectionPool<C> {
    /// Create a pool with `capacity` slots.
    ///
    /// `acquire_timeout` bounds how long [`acquire`](Self::acquire) waits for
    /// a free slot; `None` waits indefinitely.
    pub fn new(connector: C, capacity: usize, acquire_timeout: Option<Duration>) -> Self {
        assert!(capacity > 0, "pool capacity must be at least 1");
        Self {
            connector,
            capacity,
            acquire_timeout,
            semaphore: Arc::new(Semaphore::new(capacity)),
            shared: Arc::new(PoolShared {
                idle: Mutex::new(Vec::with_capacity(capacity)),
                acquires: AtomicU64::new(0),
                connects: AtomicU64::new(0),
                discards: AtomicU64::new(0),
            }),
        }
    }

    /// Borrow a handle, waiting for a free slot if the pool is saturated.
    ///
    /// Prefers an idle handle; opens a new session only when the permit is
    /// held and the idle set is empty. A connect failure surfaces as
    /// `Connection` and frees the slot (the permit drops with the error).
    /// Waiting callers that are cancelled consume nothing.
    pub async fn acquire(&self) -> GatewayResult<PooledHandle<C::Session>> {
        let permit = match self.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, self.semaphore.clone().acquire_owned())
                .await
                .map_err(|_| GatewayError::pool_exhausted(limit))?,
            None => self.semaphore.clone().acquire_owned().await,
        }
        .map_err(|_| GatewayError::connection("Connection pool is closed"))?;

        let idle_handle = {
            let mut idle = self.shared.idle.lock().expect("pool idle lock poisoned");
            idle.pop()
        };

        let handle = match idle_handle {
            Some(handle) => handle,
            None => {
                // Permit is dropped if connect fails, freeing the slot
                let session = self.connector.connect().await?;
                self.shared.connects.fetch_add(1, Ordering::AcqRel);
                debug!("Opened new database connection");
                Handle::new(session)
            }
        };

        self.shared.acquires.fetch_add(1, Ordering::AcqRel);
        Ok(PooledHandle {
            handle: Some(handle),
            shared: Arc::clone(&self.shared),
            _permit: permit,
        })
    }

    /// Drain in-flight work and close every physical connection.
    ///
    /// Waits until all lent handles have come back (by acquiring every
    /// permit), then closes the semaphore so later `acquire` calls fail
    /// fast, and finally closes the idle sessions.
    pub async fn close(&self) {
        match self
            .semaphore
            .acquire_many(self.capacity as u32)
            .await
        {
            Ok(permits) => permits.forget(),
            Err(_) => return, // already closed
        }
        self.semaphore.close();

        let drained: Vec<Handle<C::Session>> = {
            let mut idle = self.shared.idle.lock().expect("pool idle lock poisoned");
            idle.drain(..).collect()
        };

        let count = drained.len();
        for handle in drained {
            handle.session.close().await;
        }
        info!(closed = count, "Connection pool closed");
    }

    /// Number of handles currently in the idle set.
    pub fn idle_count(&self) -> usize {
        self.shared.idle.lock().expect("pool idle lock poisoned").len()
    }

    /// Total successful acquires since the pool was created.
    pub fn acquire_count(&self) -> u64 {
        self.shared.acquires.load(Ordering::Acquire)
    }

    /// Total physical connections opened since the pool was created.
    pub fn connect_count(&self) -> u64 {
        self.shared.connects.load(Ordering::Acquire)
    }

    /// Total handles discarded instead of returned.
    pub fn discard_count(&self) -> u64 {
        self.shared.discards.load(Ordering::Acquire)
    }
}

/// RAII guard for a borrowed handle.
///
/// Finish with [`release`](Self::release) to return the handle to the idle
/// set, or [`discard`](Self::discard) to tear the connection down. Dropping
/// the guard without either (cancellation, panic) discards the session
/// hard: the permit is freed, but the connection is closed rather than
/// re-lent in an unknown state.
pub struct PooledHandle<S: SqlSession> {
    handle: Option<Handle<S>>,
    shared: Arc<PoolShared<S>>,
    _permit: OwnedSemaphorePermit,
}

impl<S: SqlSession> std::fmt::Debug for PooledHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledHandle").finish_non_exhaustive()
    }
}

impl<S: SqlSession> PooledHandle<S> {
    /// Return the handle to the idle set.
    pub fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            let mut idle = self.shared.idle.lock().expect("pool idle lock poisoned");
            idle.push(handle);
        }
        // Permit drops with self, freeing the slot
    }

    /// Tear down the physical connection instead of re-pooling it.
    pub fn discard(mut self) {
        if let Some(handle) = self.handle.take() {
            self.shared.discards.fetch_add(1, Ordering::AcqRel);
            drop(handle);
        }
    }
}

impl<S: SqlSession> Deref for PooledHandle<S> {
    type Target = Handle<S>;

    fn deref(&self) -> &Handle<S> {
        self.handle.as_ref().expect("handle already taken")
    }
}

impl<S: SqlSession> DerefMut for PooledHandle<S> {
    fn deref_mut(&mut self) -> &mut Handle<S> {
        self.handle.as_mut().expect("handle already taken")
    }
}

impl<S: SqlSession> Drop for PooledHandle<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shared.discards.fetch_add(1, Ordering::AcqRel);
            warn!(
                bound_database = ?handle.bound_database,
                "Handle dropped without release, discarding connection"
            );
            drop(handle);
        }
    }
}
