use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc, Arc, Mutex, PoisonError,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use smallvec::SmallVec;
use tracing::{debug, error, trace};

use super::{PenContext, PenError, PenPacket, TabletDriver};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

enum WorkerMessage {
    /// The context list changed, poll now.
    Wake,
    Shutdown,
}

/// State visible to both the owner and the worker thread.
struct Shared {
    contexts: Mutex<Vec<Arc<PenContext>>>,
    disposed: AtomicBool,
}
impl Shared {
    fn contexts(&self) -> std::sync::MutexGuard<'_, Vec<Arc<PenContext>>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A background worker polling a bounded set of [`PenContext`]s.
///
/// Disposal is explicit through [`Self::dispose`] and also happens on drop. Either way it
/// happens once: contexts are detached and unlocked, and the worker thread is joined.
pub struct PenThread {
    serial: u64,
    capacity: usize,
    driver: Arc<dyn TabletDriver>,
    shared: Arc<Shared>,
    commands: Mutex<Option<mpsc::Sender<WorkerMessage>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    idle_since: Mutex<Option<Instant>>,
}

impl PenThread {
    /// Start a worker servicing up to `capacity` contexts, polling every `poll_interval` and
    /// delivering packets to `packets`.
    /// # Errors
    /// Fails if the OS refuses to spawn a thread.
    pub fn spawn(
        driver: Arc<dyn TabletDriver>,
        capacity: usize,
        poll_interval: Duration,
        packets: mpsc::Sender<PenPacket>,
    ) -> Result<Self, PenError> {
        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(Shared {
            contexts: Mutex::new(Vec::with_capacity(capacity)),
            disposed: AtomicBool::new(false),
        });
        let (commands, receiver) = mpsc::channel();
        let worker = {
            let shared = shared.clone();
            let driver = driver.clone();
            std::thread::Builder::new()
                .name(format!("pen-thread-{serial}"))
                .spawn(move || {
                    run_worker(serial, &shared, &*driver, &receiver, &packets, poll_interval);
                })?
        };
        debug!(serial, capacity, "pen thread started");
        Ok(Self {
            serial,
            capacity,
            driver,
            shared,
            commands: Mutex::new(Some(commands)),
            worker: Mutex::new(Some(worker)),
            idle_since: Mutex::new(Some(Instant::now())),
        })
    }
    /// Unique among all pen threads of this process.
    #[must_use]
    pub fn serial(&self) -> u64 {
        self.serial
    }
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// Number of attached contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.contexts().len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }
    /// When the last context was removed, or the worker started. `None` while servicing contexts.
    #[must_use]
    pub fn idle_since(&self) -> Option<Instant> {
        *self.idle_since.lock().unwrap_or_else(PoisonError::into_inner)
    }
    #[must_use]
    pub fn contains(&self, context: &PenContext) -> bool {
        context.owner() == Some(self.serial)
    }
    /// Attach `context` to this worker and lock its device.
    ///
    /// Attaching a context this worker already services succeeds without effect.
    /// # Errors
    /// * [`PenError::Disposed`] after [`Self::dispose`].
    /// * [`PenError::CapacityReached`] if the worker is full.
    /// * [`PenError::AlreadyAttached`] if another worker services the context.
    /// * [`PenError::Driver`] if the device could not be locked.
    pub fn add_pen_context(&self, context: &Arc<PenContext>) -> Result<(), PenError> {
        let mut contexts = self.shared.contexts();
        // Checked under the lock: `dispose` drains the list after setting the flag.
        if self.is_disposed() {
            return Err(PenError::Disposed);
        }
        if contexts.iter().any(|c| Arc::ptr_eq(c, context)) {
            return Ok(());
        }
        if contexts.len() >= self.capacity {
            return Err(PenError::CapacityReached(self.capacity));
        }
        if !context.try_claim(self.serial) {
            return Err(PenError::AlreadyAttached);
        }
        if let Err(err) = self.driver.acquire_lock(context.handle()) {
            context.release_claim(self.serial);
            return Err(err.into());
        }
        contexts.push(context.clone());
        drop(contexts);
        *self.idle_since.lock().unwrap_or_else(PoisonError::into_inner) = None;
        debug!(serial = self.serial, handle = ?context.handle(), "pen context attached");
        self.wake();
        Ok(())
    }
    /// Detach `context`, unlocking its device. Returns whether it was attached here.
    pub fn remove_pen_context(&self, context: &PenContext) -> bool {
        let mut contexts = self.shared.contexts();
        let Some(index) = contexts.iter().position(|c| c.handle() == context.handle()) else {
            return false;
        };
        let removed = contexts.remove(index);
        let now_empty = contexts.is_empty();
        drop(contexts);
        self.detach(&removed);
        if now_empty {
            *self.idle_since.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        }
        debug!(serial = self.serial, handle = ?context.handle(), "pen context detached");
        self.wake();
        true
    }
    /// Stop the worker and release every context. Redundant calls do nothing.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(commands) = self
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            // Fails only if the worker already exited.
            let _ = commands.send(WorkerMessage::Shutdown);
        }
        if let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            if worker.join().is_err() {
                error!(serial = self.serial, "pen worker panicked");
            }
        }
        let contexts = std::mem::take(&mut *self.shared.contexts());
        for context in &contexts {
            self.detach(context);
        }
        debug!(serial = self.serial, released = contexts.len(), "pen thread disposed");
    }
    fn detach(&self, context: &PenContext) {
        self.driver.release_lock(context.handle());
        context.release_claim(self.serial);
    }
    fn wake(&self) {
        if let Some(commands) = self
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            let _ = commands.send(WorkerMessage::Wake);
        }
    }
}
impl Drop for PenThread {
    fn drop(&mut self) {
        self.dispose();
    }
}
impl std::fmt::Debug for PenThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PenThread")
            .field("serial", &self.serial)
            .field("capacity", &self.capacity)
            .field("contexts", &self.len())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

fn run_worker(
    serial: u64,
    shared: &Shared,
    driver: &dyn TabletDriver,
    commands: &mpsc::Receiver<WorkerMessage>,
    packets: &mpsc::Sender<PenPacket>,
    poll_interval: Duration,
) {
    trace!(serial, "pen worker running");
    loop {
        match commands.recv_timeout(poll_interval) {
            Ok(WorkerMessage::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Ok(WorkerMessage::Wake) | Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
        if shared.disposed.load(Ordering::Acquire) {
            break;
        }
        let contexts: SmallVec<[Arc<PenContext>; 8]> = shared.contexts().iter().cloned().collect();
        for context in contexts {
            match driver.poll(context.handle()) {
                Ok(batch) => {
                    for packet in batch {
                        if packets.send(packet).is_err() {
                            debug!(serial, "pen packet receiver gone, worker exiting");
                            return;
                        }
                    }
                }
                Err(err) => {
                    error!(serial, handle = ?context.handle(), %err, "pen context poll failed");
                }
            }
        }
    }
    trace!(serial, "pen worker stopped");
}
