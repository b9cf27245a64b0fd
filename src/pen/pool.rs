use std::{
    sync::{mpsc, Arc},
    time::{Duration, Instant},
};

use smallvec::SmallVec;
use tracing::{debug, error, trace, warn};

use super::{PenContext, PenError, PenPacket, PenThread, TabletDriver};

/// Tuning for a [`PenThreadPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Contexts a single worker services before the pool spawns another.
    pub capacity: usize,
    /// Workers one request may create before giving up.
    pub max_attempts: usize,
    /// How long an unused, empty worker survives [`PenThreadPool::collect_idle`].
    pub idle_timeout: Duration,
    /// How often workers poll their contexts when not woken.
    pub poll_interval: Duration,
}
impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 31,
            max_attempts: 10,
            idle_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(8),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct SlotKey {
    index: u32,
    generation: u32,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    worker: Option<Arc<PenThread>>,
}

/// Hands out [`PenThread`]s for [`PenContext`]s.
///
/// Workers live in a generational arena. Entries whose worker has been disposed are pruned
/// before every lookup, so a dead worker is never returned. The pool is owned by whoever needs
/// pen input, there is no implicit per-thread instance.
///
/// Packets from every worker of the pool arrive on one channel, see [`Self::try_recv_packet`].
pub struct PenThreadPool {
    driver: Arc<dyn TabletDriver>,
    config: PoolConfig,
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Live workers, oldest first.
    order: Vec<SlotKey>,
    packets_tx: mpsc::Sender<PenPacket>,
    packets_rx: mpsc::Receiver<PenPacket>,
}

impl PenThreadPool {
    #[must_use]
    pub fn new(driver: Arc<dyn TabletDriver>, config: PoolConfig) -> Self {
        let (packets_tx, packets_rx) = mpsc::channel();
        Self {
            driver,
            config,
            slots: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
            packets_tx,
            packets_rx,
        }
    }
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
    /// Number of live workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
    /// Live workers, newest first.
    pub fn workers(&self) -> impl Iterator<Item = &Arc<PenThread>> + '_ {
        self.order.iter().rev().filter_map(|key| self.get(*key))
    }
    pub fn try_recv_packet(&self) -> Option<PenPacket> {
        self.packets_rx.try_recv().ok()
    }
    pub fn recv_packet_timeout(&self, timeout: Duration) -> Option<PenPacket> {
        self.packets_rx.recv_timeout(timeout).ok()
    }

    /// A worker servicing `context`, attaching it to one if needed. With no context, any worker
    /// with room.
    ///
    /// Live workers are tried newest first. A worker is spawned only when every live worker has
    /// rejected the context, and at most [`PoolConfig::max_attempts`] are spawned per call.
    /// Returns `None` when no worker could take the context now, which is not fatal: the caller
    /// may ask again later.
    pub fn get_pen_thread(&mut self, context: Option<&Arc<PenContext>>) -> Option<Arc<PenThread>> {
        self.prune();
        if let Some(owner) = context.and_then(|context| context.owner()) {
            if let Some(worker) = self.workers().find(|worker| worker.serial() == owner) {
                return Some(worker.clone());
            }
            warn!(owner, "pen context is serviced by a worker outside this pool");
            return None;
        }

        let mut tried: SmallVec<[u64; 8]> = SmallVec::new();
        let mut attempts = 0;
        loop {
            let candidate = self
                .order
                .iter()
                .rev()
                .copied()
                .find(|key| {
                    self.get(*key).is_some_and(|worker| {
                        !worker.is_disposed() && !tried.contains(&worker.serial())
                    })
                })
                .map(|key| (key, false));
            let (key, fresh) = match candidate {
                Some(found) => found,
                None => {
                    if attempts == self.config.max_attempts {
                        warn!(attempts, "pen thread retry limit reached, no worker available");
                        return None;
                    }
                    attempts += 1;
                    match self.spawn_worker() {
                        Ok(key) => (key, true),
                        Err(err) => {
                            error!(%err, attempts, "failed to spawn pen thread");
                            continue;
                        }
                    }
                }
            };
            let Some(worker) = self.get(key).cloned() else {
                continue;
            };
            let result = match context {
                Some(context) => worker.add_pen_context(context),
                None if worker.is_full() => Err(PenError::CapacityReached(worker.capacity())),
                None => Ok(()),
            };
            match result {
                Ok(()) => return Some(worker),
                Err(err) => {
                    trace!(serial = worker.serial(), %err, "pen thread rejected context");
                    tried.push(worker.serial());
                    if fresh && worker.is_empty() {
                        drop(worker);
                        self.retire(key);
                    }
                }
            }
        }
    }
    /// Detach `context` from whichever worker of this pool services it.
    pub fn remove_pen_context(&mut self, context: &PenContext) -> bool {
        let Some(owner) = context.owner() else {
            return false;
        };
        self.workers()
            .find(|worker| worker.serial() == owner)
            .is_some_and(|worker| worker.remove_pen_context(context))
    }
    /// Dispose workers that service no contexts, are not referenced outside the pool, and have
    /// been idle for at least the configured timeout. Returns how many were disposed.
    pub fn collect_idle(&mut self, now: Instant) -> usize {
        let idle: SmallVec<[SlotKey; 4]> = self
            .order
            .iter()
            .copied()
            .filter(|key| {
                self.get(*key).is_some_and(|worker| {
                    let idle_for = worker
                        .idle_since()
                        .map(|since| now.saturating_duration_since(since));
                    Arc::strong_count(worker) == 1
                        && worker.is_empty()
                        && idle_for.is_some_and(|idle| idle >= self.config.idle_timeout)
                })
            })
            .collect();
        for key in &idle {
            self.retire(*key);
        }
        if !idle.is_empty() {
            debug!(collected = idle.len(), "idle pen threads collected");
        }
        idle.len()
    }
    /// Dispose every worker.
    pub fn dispose(&mut self) {
        for key in std::mem::take(&mut self.order) {
            self.retire(key);
        }
    }

    fn get(&self, key: SlotKey) -> Option<&Arc<PenThread>> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.worker.as_ref())
    }
    fn spawn_worker(&mut self) -> Result<SlotKey, PenError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = slot_index(self.slots.len())?;
                self.slots.push(Slot::default());
                index
            }
        };
        let worker = match PenThread::spawn(
            self.driver.clone(),
            self.config.capacity,
            self.config.poll_interval,
            self.packets_tx.clone(),
        ) {
            Ok(worker) => worker,
            Err(err) => {
                self.free.push(index);
                return Err(err);
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.worker = Some(Arc::new(worker));
        let key = SlotKey {
            index,
            generation: slot.generation,
        };
        self.order.push(key);
        Ok(key)
    }
    /// Drop entries for workers disposed behind the pool's back.
    fn prune(&mut self) {
        let dead: SmallVec<[SlotKey; 4]> = self
            .order
            .iter()
            .copied()
            .filter(|key| self.get(*key).map_or(true, |worker| worker.is_disposed()))
            .collect();
        for key in dead {
            trace!(?key, "pruning disposed pen thread");
            self.retire(key);
        }
    }
    /// Dispose the worker under `key` and free its slot.
    fn retire(&mut self, key: SlotKey) {
        self.order.retain(|k| *k != key);
        let Some(slot) = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
        else {
            return;
        };
        if let Some(worker) = slot.worker.take() {
            worker.dispose();
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
    }
}
impl Drop for PenThreadPool {
    fn drop(&mut self) {
        self.dispose();
    }
}
impl std::fmt::Debug for PenThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PenThreadPool")
            .field("config", &self.config)
            .field("workers", &self.order.len())
            .field("free_slots", &self.free.len())
            .finish_non_exhaustive()
    }
}

/// Index of the next slot pushed onto an arena of `len` slots.
fn slot_index(len: usize) -> Result<u32, PenError> {
    u32::try_from(len).map_err(|_| PenError::PoolExhausted)
}
