//! Periodic republication of a reference dataset.
//!
//! Stands in for a scripted system under test: every `period` the whole
//! dataset is encoded and published on the bus, starting immediately.
//!
//! ```text
//!  t=0        t=P        t=2P
//!  │ round 1  │ round 2  │ round 3 ...     stop() interrupts the wait
//!  ▼          ▼          ▼
//!  publish    publish    publish
//! ```

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use firecheck_protocol::codec::encode_weapon_fire;
use firecheck_protocol::{Interaction, InteractionBus, WeaponFireEvent};
use log::{debug, error, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

/// Replay period used when none is configured.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(6);

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("nothing to replay: the event list is empty")]
    Empty,

    #[error("replay period must be non-zero")]
    ZeroPeriod,

    #[error("an unbounded replay never finishes on its own; stop it instead")]
    Unbounded,

    #[error("failed to spawn replay thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayConfig {
    pub period: Duration,
    /// Stop after this many rounds; `None` replays until stopped.
    pub rounds: Option<u32>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            rounds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub rounds: u64,
    pub published: u64,
}

#[derive(Default)]
struct Counters {
    rounds: AtomicU64,
    published: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ReplayStats {
        ReplayStats {
            rounds: self.rounds.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a running replay thread.
pub struct Replayer {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
    rounds: Option<u32>,
}

impl Replayer {
    /// Encode `events` once and start publishing them on `bus`.
    pub fn start(
        bus: Arc<dyn InteractionBus>,
        events: &[WeaponFireEvent],
        config: ReplayConfig,
    ) -> Result<Self, ReplayError> {
        if events.is_empty() {
            return Err(ReplayError::Empty);
        }
        if config.period.is_zero() {
            return Err(ReplayError::ZeroPeriod);
        }

        let interactions: Vec<Interaction> = events.iter().map(encode_weapon_fire).collect();
        let counters = Arc::new(Counters::default());
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread_counters = Arc::clone(&counters);
        let handle = std::thread::Builder::new()
            .name("weapon-fire-replay".into())
            .spawn(move || {
                let mut round: u32 = 0;
                loop {
                    round += 1;
                    for interaction in &interactions {
                        bus.publish(interaction.clone());
                        thread_counters.published.fetch_add(1, Ordering::Relaxed);
                    }
                    thread_counters.rounds.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "Replay round {} published {} events",
                        round,
                        interactions.len()
                    );

                    if config.rounds.is_some_and(|max| round >= max) {
                        break;
                    }
                    match stop_rx.recv_timeout(config.period) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        info!(
            "Replaying {} events every {:?}",
            events.len(),
            config.period
        );
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            counters,
            rounds: config.rounds,
        })
    }

    pub fn stats(&self) -> ReplayStats {
        self.counters.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Block until the configured number of rounds has been published.
    ///
    /// An unbounded replay is rejected with [`ReplayError::Unbounded`] and
    /// stopped when the handle drops.
    pub fn wait(mut self) -> Result<ReplayStats, ReplayError> {
        if self.rounds.is_none() {
            return Err(ReplayError::Unbounded);
        }
        self.join();
        Ok(self.counters.snapshot())
    }

    /// Interrupt the replay and wait for the thread to exit.
    pub fn stop(mut self) -> ReplayStats {
        self.signal_and_join();
        let stats = self.counters.snapshot();
        info!(
            "Replay stopped after {} rounds ({} events)",
            stats.rounds, stats.published
        );
        stats
    }

    fn signal_and_join(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // A full buffer or a finished thread both mean no signal is needed.
            let _ = tx.try_send(());
        }
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Replay thread panicked");
            }
        }
    }
}

impl Drop for Replayer {
    fn drop(&mut self) {
        self.signal_and_join();
    }
}
