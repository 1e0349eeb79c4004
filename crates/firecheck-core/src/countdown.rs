//! Interruptible countdown that gives the bus time to deliver events.
//!
//! The countdown runs on the calling thread and logs the remaining time
//! once per tick.  An [`Interrupt`] handle can end it early from any
//! thread; whatever was collected up to that point is what gets compared.
//!
//! The interrupt flag is a plain atomic so a signal handler may set it.
//! Waiters poll it at [`POLL_INTERVAL`] in addition to being woken by
//! [`Interrupt::trigger`].

use log::info;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on how long a set flag can go unnoticed.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a countdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    /// Ended early with `remaining` ticks left.
    Interrupted { remaining: u64 },
}

struct InterruptState {
    triggered: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Cloneable handle that ends a running countdown.
#[derive(Clone)]
pub struct Interrupt {
    state: Arc<InterruptState>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        Self {
            state: Arc::new(InterruptState {
                triggered: AtomicBool::new(false),
                lock: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    pub fn trigger(&self) {
        self.state.triggered.store(true, Ordering::SeqCst);
        let _guard = self.state.lock.lock();
        self.state.wake.notify_all();
    }

    pub fn clear(&self) {
        self.state.triggered.store(false, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.state.triggered.load(Ordering::SeqCst)
    }

    /// The raw flag, for contexts that may only touch atomics (signal
    /// handlers).  Storing `true` is equivalent to [`trigger`](Self::trigger)
    /// up to one [`POLL_INTERVAL`] of latency.
    pub fn flag(&self) -> &AtomicBool {
        &self.state.triggered
    }

    /// Sleep for `timeout` unless triggered first.  Returns `true` if
    /// triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.state.lock.lock();
        loop {
            if self.is_triggered() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let slice = (deadline - now).min(POLL_INTERVAL);
            self.state.wake.wait_for(&mut guard, slice);
        }
    }
}

/// Counts down from a configured number of ticks.
pub struct CountdownTimer {
    initial: u64,
    remaining: u64,
    tick: Duration,
    interrupt: Interrupt,
}

impl CountdownTimer {
    /// A countdown of `seconds` one-second ticks.
    pub fn new(seconds: u64) -> Self {
        Self {
            initial: seconds,
            remaining: seconds,
            tick: Duration::from_secs(1),
            interrupt: Interrupt::new(),
        }
    }

    /// Override the tick length.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Share an existing interrupt handle instead of a private one.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn initial(&self) -> u64 {
        self.initial
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Restore the configured count.  A pending interrupt stays pending
    /// until [`Interrupt::clear`] is called.
    pub fn reset(&mut self) {
        self.remaining = self.initial;
    }

    /// Time left on the clock at the current tick length.
    pub fn time_left(&self) -> Duration {
        let ticks = u32::try_from(self.remaining).unwrap_or(u32::MAX);
        self.tick.saturating_mul(ticks)
    }

    /// Block until the countdown reaches zero or is interrupted.
    pub fn run(&mut self) -> WaitOutcome {
        while self.remaining > 0 {
            info!("Listening for another {:?}.", self.time_left());
            if self.interrupt.wait_timeout(self.tick) {
                info!("Wait interrupted with {:?} remaining", self.time_left());
                return WaitOutcome::Interrupted {
                    remaining: self.remaining,
                };
            }
            self.remaining -= 1;
        }
        WaitOutcome::Elapsed
    }
}
