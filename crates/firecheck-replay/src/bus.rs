//! In-process publish/subscribe bus with concurrent delivery.
//!
//! Published interactions are fanned out to every matching subscription
//! and queued on a channel drained by `workers` threads, so one listener
//! can be invoked from several threads at the same time.  Delivery faults
//! are drawn from a seeded ChaCha RNG: the same seed and publish sequence
//! reproduces the same duplicates and drops.

use crossbeam_channel::{Receiver, Sender};
use firecheck_protocol::{Interaction, InteractionBus, InteractionListener, SubscriptionId};
use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

const PPM: u32 = 1_000_000;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("a bus needs at least one delivery worker")]
    NoWorkers,

    #[error("fault rate {0} ppm exceeds 1000000")]
    RateOutOfRange(u32),

    #[error("failed to spawn delivery worker: {0}")]
    Spawn(#[from] std::io::Error),
}

// ═══════════════════════════════════════════════════════════════════════
//  Configuration
// ═══════════════════════════════════════════════════════════════════════

/// Seeded delivery faults, in parts per million of deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryFaults {
    pub seed: u64,
    /// Share of deliveries handed to the listener twice.
    pub duplicate_ppm: u32,
    /// Share of deliveries silently lost.
    pub drop_ppm: u32,
}

impl Default for DeliveryFaults {
    fn default() -> Self {
        Self {
            seed: 42,
            duplicate_ppm: 0,
            drop_ppm: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Number of delivery threads.
    pub workers: usize,
    pub faults: DeliveryFaults,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            faults: DeliveryFaults::default(),
        }
    }
}

/// Delivery counters since the bus was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    pub delivered: u64,
    pub duplicated: u64,
    pub dropped: u64,
}

// ═══════════════════════════════════════════════════════════════════════
//  Bus
// ═══════════════════════════════════════════════════════════════════════

struct Subscription {
    class: String,
    listener: Arc<dyn InteractionListener>,
}

struct Delivery {
    listener: Arc<dyn InteractionListener>,
    interaction: Arc<Interaction>,
}

struct Shared {
    subscriptions: RwLock<BTreeMap<SubscriptionId, Subscription>>,
    /// Deliveries queued but not yet handed to a listener.
    pending: Mutex<usize>,
    idle: Condvar,
    published: AtomicU64,
    delivered: AtomicU64,
    duplicated: AtomicU64,
    dropped: AtomicU64,
}

impl Shared {
    fn finish_delivery(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// Publish/subscribe bus living inside the test process.
///
/// # Example
///
/// ```
/// use firecheck_protocol::{Interaction, InteractionBus, InteractionListener, ParameterMap};
/// use firecheck_replay::bus::{BusConfig, LocalBus};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct Counter(AtomicUsize);
/// impl InteractionListener for Counter {
///     fn receive_interaction(&self, _: &Interaction) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let bus = LocalBus::new(BusConfig::default()).unwrap();
/// let counter = Arc::new(Counter(AtomicUsize::new(0)));
/// bus.subscribe("WeaponFire", counter.clone());
/// bus.publish(Interaction::new("WeaponFire", ParameterMap::new()));
/// assert!(bus.wait_idle(Duration::from_secs(5)));
/// assert_eq!(counter.0.load(Ordering::SeqCst), 1);
/// ```
pub struct LocalBus {
    shared: Arc<Shared>,
    sender: Option<Sender<Delivery>>,
    workers: Vec<JoinHandle<()>>,
    next_id: AtomicU64,
    faults: DeliveryFaults,
    rng: Mutex<ChaCha8Rng>,
}

impl LocalBus {
    pub fn new(config: BusConfig) -> Result<Self, BusError> {
        if config.workers == 0 {
            return Err(BusError::NoWorkers);
        }
        for rate in [config.faults.duplicate_ppm, config.faults.drop_ppm] {
            if rate > PPM {
                return Err(BusError::RateOutOfRange(rate));
            }
        }

        let shared = Arc::new(Shared {
            subscriptions: RwLock::new(BTreeMap::new()),
            pending: Mutex::new(0),
            idle: Condvar::new(),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            duplicated: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        });

        let (sender, receiver) = crossbeam_channel::unbounded();
        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let receiver = receiver.clone();
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("bus-delivery-{}", index))
                .spawn(move || delivery_loop(receiver, shared))?;
            workers.push(handle);
        }

        Ok(Self {
            shared,
            sender: Some(sender),
            workers,
            next_id: AtomicU64::new(1),
            faults: config.faults,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(config.faults.seed)),
        })
    }

    /// Block until every queued delivery has reached its listener.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            if self
                .shared
                .idle
                .wait_until(&mut pending, deadline)
                .timed_out()
            {
                return *pending == 0;
            }
        }
        true
    }

    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.read().len()
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.shared.published.load(Ordering::Relaxed),
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            duplicated: self.shared.duplicated.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }

    /// Roll the fault dice for one delivery: how many copies to send.
    fn copies(&self) -> usize {
        if self.faults.drop_ppm == 0 && self.faults.duplicate_ppm == 0 {
            return 1;
        }
        let mut rng = self.rng.lock();
        if rng.gen_range(0..PPM) < self.faults.drop_ppm {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return 0;
        }
        if rng.gen_range(0..PPM) < self.faults.duplicate_ppm {
            self.shared.duplicated.fetch_add(1, Ordering::Relaxed);
            return 2;
        }
        1
    }

    fn enqueue(&self, delivery: Delivery) {
        let Some(sender) = self.sender.as_ref() else {
            return;
        };
        *self.shared.pending.lock() += 1;
        if sender.send(delivery).is_err() {
            error!("Delivery workers are gone, dropping interaction");
            self.shared.finish_delivery();
        }
    }
}

impl InteractionBus for LocalBus {
    fn subscribe(&self, class: &str, listener: Arc<dyn InteractionListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared.subscriptions.write().insert(
            id,
            Subscription {
                class: class.to_string(),
                listener,
            },
        );
        debug!("{} subscribed to {}", id, class);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.shared.subscriptions.write().remove(&id).is_some();
        if !removed {
            warn!("Unsubscribe of unknown subscription {}", id);
        }
        removed
    }

    fn publish(&self, interaction: Interaction) {
        self.shared.published.fetch_add(1, Ordering::Relaxed);
        let interaction = Arc::new(interaction);
        let listeners: Vec<Arc<dyn InteractionListener>> = self
            .shared
            .subscriptions
            .read()
            .values()
            .filter(|s| s.class == interaction.class)
            .map(|s| Arc::clone(&s.listener))
            .collect();

        for listener in listeners {
            for _ in 0..self.copies() {
                self.enqueue(Delivery {
                    listener: Arc::clone(&listener),
                    interaction: Arc::clone(&interaction),
                });
            }
        }
    }
}

impl Drop for LocalBus {
    fn drop(&mut self) {
        // Closing the channel ends every delivery loop once the queue drains.
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Delivery worker panicked");
            }
        }
    }
}

fn delivery_loop(receiver: Receiver<Delivery>, shared: Arc<Shared>) {
    for delivery in receiver.iter() {
        delivery
            .listener
            .receive_interaction(&delivery.interaction);
        shared.delivered.fetch_add(1, Ordering::Relaxed);
        shared.finish_delivery();
    }
}
