//! # Pen contexts and workers
//!
//! A [`PenContext`] is one tablet's association with one window, created through the
//! [`TabletDriver`]. Contexts are serviced by [`PenThread`]s, background workers that poll the
//! driver and hand [`PenPacket`]s back over a channel. A context is attached to at most one
//! worker at a time, and a worker services a bounded number of contexts.
//!
//! Workers are handed out by a [`PenThreadPool`], which reuses workers with room before
//! spawning new ones.

mod pool;
mod thread;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use smallvec::SmallVec;
use tracing::debug;

use crate::{
    axis::StylusPoint,
    report::{RawStylusActions, Timestamp},
    tablet::{StylusDeviceInfo, TabletDeviceInfo},
    StylusDeviceId, TabletId, WindowId,
};
pub use pool::{PenThreadPool, PoolConfig};
pub use thread::PenThread;

crate::macro_bits::impl_id!(
    /// A native context handle issued by the driver.
    ContextHandle(u64)
);

/// Failures reported by a [`TabletDriver`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("tablet {0:?} is not connected")]
    TabletGone(TabletId),
    #[error("context {0:?} is locked by another owner")]
    Locked(ContextHandle),
    #[error("driver call failed: {0}")]
    Native(String),
}

#[derive(thiserror::Error, Debug)]
pub enum PenError {
    #[error("pen thread has been disposed")]
    Disposed,
    #[error("pen thread already services {0} contexts")]
    CapacityReached(usize),
    #[error("pen context is attached to another pen thread")]
    AlreadyAttached,
    #[error("pen thread pool has no free worker slots")]
    PoolExhausted,
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("failed to spawn pen worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// One batch of stylus data polled from a context.
#[derive(Clone, Debug, PartialEq)]
pub struct PenPacket {
    pub context: ContextHandle,
    pub window: WindowId,
    pub tablet: TabletId,
    pub stylus: StylusDeviceId,
    /// Exactly one action for a packet to be promotable.
    pub actions: RawStylusActions,
    pub inverted: bool,
    pub points: SmallVec<[StylusPoint; 4]>,
    pub timestamp: Timestamp,
}

/// The native tablet API. Implementations are called from both the UI thread (context
/// creation, locking) and pen worker threads (polling).
pub trait TabletDriver: Send + Sync {
    /// Describe every connected tablet.
    /// # Errors
    /// Driver specific.
    fn enumerate_tablets(&self) -> Result<Vec<TabletDeviceInfo>, DriverError>;
    /// # Errors
    /// Driver specific, usually [`DriverError::TabletGone`].
    fn create_context(
        &self,
        window: WindowId,
        tablet: TabletId,
    ) -> Result<ContextHandle, DriverError>;
    /// Called exactly once per handle returned from [`Self::create_context`].
    fn destroy_context(&self, handle: ContextHandle);
    /// Take exclusive access to the context's device for the calling worker.
    /// # Errors
    /// Fails if the device cannot be locked now.
    fn acquire_lock(&self, handle: ContextHandle) -> Result<(), DriverError>;
    fn release_lock(&self, handle: ContextHandle);
    /// Re-read the styluses (and their buttons) known to `tablet`.
    /// # Errors
    /// Driver specific.
    fn refresh_styluses(&self, tablet: TabletId) -> Result<Vec<StylusDeviceInfo>, DriverError>;
    /// Drain packets queued for a context. Called from a worker thread.
    /// # Errors
    /// Driver specific. Workers log and keep polling.
    fn poll(&self, handle: ContextHandle) -> Result<Vec<PenPacket>, DriverError>;
}

/// See [module level docs](`crate::pen`) for details.
///
/// The native context is destroyed when the last reference is dropped.
pub struct PenContext {
    driver: Arc<dyn TabletDriver>,
    handle: ContextHandle,
    window: WindowId,
    tablet: TabletId,
    /// Serial of the owning worker. Zero when unattached.
    owner: AtomicU64,
}
impl PenContext {
    /// # Errors
    /// Forwards the driver's failure to create a context.
    pub fn create(
        driver: Arc<dyn TabletDriver>,
        window: WindowId,
        tablet: TabletId,
    ) -> Result<Arc<Self>, DriverError> {
        let handle = driver.create_context(window, tablet)?;
        debug!(?handle, ?window, ?tablet, "pen context created");
        Ok(Arc::new(Self {
            driver,
            handle,
            window,
            tablet,
            owner: AtomicU64::new(0),
        }))
    }
    #[must_use]
    pub fn handle(&self) -> ContextHandle {
        self.handle
    }
    #[must_use]
    pub fn window(&self) -> WindowId {
        self.window
    }
    #[must_use]
    pub fn tablet(&self) -> TabletId {
        self.tablet
    }
    /// Serial of the [`PenThread`] servicing this context.
    #[must_use]
    pub fn owner(&self) -> Option<u64> {
        match self.owner.load(Ordering::Acquire) {
            0 => None,
            serial => Some(serial),
        }
    }
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.owner().is_some()
    }
    /// # Errors
    /// Forwards the driver's failure.
    pub fn refresh_styluses(&self) -> Result<Vec<StylusDeviceInfo>, DriverError> {
        self.driver.refresh_styluses(self.tablet)
    }
    pub(crate) fn try_claim(&self, serial: u64) -> bool {
        self.owner
            .compare_exchange(0, serial, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
    pub(crate) fn release_claim(&self, serial: u64) {
        let _ = self
            .owner
            .compare_exchange(serial, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}
impl Drop for PenContext {
    fn drop(&mut self) {
        debug!(handle = ?self.handle, "pen context destroyed");
        self.driver.destroy_context(self.handle);
    }
}
impl std::fmt::Debug for PenContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PenContext")
            .field("handle", &self.handle)
            .field("window", &self.window)
            .field("tablet", &self.tablet)
            .field("owner", &self.owner())
            .finish_non_exhaustive()
    }
}
