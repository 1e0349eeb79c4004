//! Phase-sequenced WeaponFire test case.
//!
//! ```text
//!            setup ok                 wait over            compared
//!  Setup ───────────▶ Observing ───────────────▶ Comparing ─────────▶ Done
//!    │                                                                 ▲ │
//!    └───────────── setup failed (INCONCLUSIVE) ───────────────────────┘ │
//!    ▲                                                                   │
//!    └──────────────────────────── run() again ──────────────────────────┘
//! ```
//!
//! Teardown (unsubscribing the collector) runs on every path into `Done`.

use crate::collector::EventCollector;
use crate::config::{AggregationMode, CheckConfig, ConfigError};
use crate::countdown::{CountdownTimer, Interrupt, WaitOutcome};
use crate::oracle::ConformanceReport;
use crate::reference::{ReferenceError, ReferenceSet};
use crate::verifier::{ConformanceVerifier, FULL_CHECK};
use firecheck_protocol::{InteractionBus, SubscriptionId, WEAPON_FIRE};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const PURPOSE: &str = "\
---------------------------------------------------------------------
TEST PURPOSE
Tests that the SUT federate publishes WeaponFire interactions whose
identifiers match the reference dataset, then compares their discrete
parameters exactly and their spatial parameters within tolerance.
---------------------------------------------------------------------";

#[derive(Error, Debug)]
pub enum RunError {
    #[error("invalid phase transition {from:?} -> {to:?}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("reference dataset: {0}")]
    Reference(#[from] ReferenceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Observing,
    Comparing,
    Done,
}

impl Phase {
    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Setup, Phase::Observing)
                | (Phase::Setup, Phase::Done)
                | (Phase::Observing, Phase::Comparing)
                | (Phase::Comparing, Phase::Done)
                | (Phase::Done, Phase::Setup)
        )
    }
}

/// Where the test case gets its parameters.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Loaded (and validated) at the start of every run.
    File(PathBuf),
    Inline(CheckConfig),
}

/// CLI-style overrides applied on top of the loaded config.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub mode: Option<AggregationMode>,
    pub waiting_period: Option<u64>,
}

/// State that only exists between a successful setup and teardown.
struct Session {
    config: CheckConfig,
    reference: ReferenceSet,
}

/// WeaponFire conformance test case bound to one bus.
pub struct WeaponFireTestCase {
    bus: Arc<dyn InteractionBus>,
    source: ConfigSource,
    overrides: Overrides,
    collector: Arc<EventCollector>,
    interrupt: Interrupt,
    tick: Duration,
    countdown: Option<CountdownTimer>,
    subscription: Option<SubscriptionId>,
    session: Option<Session>,
    phase: Phase,
    transitions: Vec<(Phase, Phase)>,
    runs: u32,
}

impl WeaponFireTestCase {
    pub fn new(bus: Arc<dyn InteractionBus>, source: ConfigSource) -> Self {
        Self {
            bus,
            source,
            overrides: Overrides::default(),
            collector: Arc::new(EventCollector::new()),
            interrupt: Interrupt::new(),
            tick: Duration::from_secs(1),
            countdown: None,
            subscription: None,
            session: None,
            phase: Phase::Setup,
            transitions: Vec::new(),
            runs: 0,
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Length of one countdown tick; one second unless overridden.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Handle that ends the observation window early.
    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn collector(&self) -> &Arc<EventCollector> {
        &self.collector
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every transition taken, across all runs.
    pub fn transitions(&self) -> &[(Phase, Phase)] {
        &self.transitions
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    fn transition(&mut self, to: Phase) -> Result<(), RunError> {
        let from = self.phase;
        if !from.can_transition_to(to) {
            return Err(RunError::InvalidTransition { from, to });
        }
        info!("Test case phase {:?} -> {:?}", from, to);
        self.transitions.push((from, to));
        self.phase = to;
        Ok(())
    }

    /// Run the test case once.
    ///
    /// Setup problems yield an INCONCLUSIVE report rather than an error;
    /// `Err` means the phase machine itself was misused.
    pub fn run(&mut self) -> Result<ConformanceReport, RunError> {
        if self.phase == Phase::Done {
            self.transition(Phase::Setup)?;
        }
        if self.phase != Phase::Setup {
            return Err(RunError::InvalidTransition {
                from: self.phase,
                to: Phase::Setup,
            });
        }
        self.runs += 1;
        info!("\n{}", PURPOSE);

        if let Err(e) = self.setup() {
            error!("Setup failed: {}", e);
            self.teardown();
            self.interrupt.clear();
            self.transition(Phase::Done)?;
            return Ok(ConformanceReport::inconclusive(
                FULL_CHECK,
                format!("setup failed: {}", e),
            ));
        }

        self.transition(Phase::Observing)?;
        self.observe();

        self.transition(Phase::Comparing)?;
        let report = self.compare();

        self.teardown();
        // Consumed by this window; the next run starts a fresh one.
        self.interrupt.clear();
        self.transition(Phase::Done)?;
        Ok(report)
    }

    fn setup(&mut self) -> Result<(), RunError> {
        self.collector.clear();

        let mut config = match &self.source {
            ConfigSource::File(path) => CheckConfig::load(path)?,
            ConfigSource::Inline(config) => {
                config.thresholds.validate()?;
                config.clone()
            }
        };
        if let Some(mode) = self.overrides.mode {
            config.mode = mode;
        }
        if let Some(waiting_period) = self.overrides.waiting_period {
            config.waiting_period = waiting_period;
        }

        let reference = ReferenceSet::load_dir(&config.reference_dir)?;
        info!(
            "Loaded {} reference events from {}",
            reference.len(),
            config.reference_dir.display()
        );

        let reusable = self
            .countdown
            .as_ref()
            .is_some_and(|timer| timer.initial() == config.waiting_period);
        if reusable {
            if let Some(timer) = self.countdown.as_mut() {
                timer.reset();
            }
        } else {
            self.countdown = Some(
                CountdownTimer::new(config.waiting_period)
                    .with_tick(self.tick)
                    .with_interrupt(self.interrupt.clone()),
            );
        }

        let listener: Arc<EventCollector> = Arc::clone(&self.collector);
        self.subscription = Some(self.bus.subscribe(WEAPON_FIRE, listener));
        self.session = Some(Session { config, reference });
        Ok(())
    }

    fn observe(&mut self) {
        if let Some(timer) = self.countdown.as_mut() {
            match timer.run() {
                WaitOutcome::Elapsed => info!("Observation window elapsed"),
                WaitOutcome::Interrupted { .. } => {
                    info!("Observation window cut short ({:?} left)", timer.time_left())
                }
            }
        }
    }

    fn compare(&mut self) -> ConformanceReport {
        let Some(session) = self.session.as_ref() else {
            return ConformanceReport::inconclusive(FULL_CHECK, "no active session");
        };
        let snapshot = self.collector.snapshot();
        let stats = self.collector.stats();
        info!(
            "Comparing {} discovered events ({} duplicates, {} rejected) against {} reference events",
            snapshot.len(),
            stats.duplicates,
            stats.rejected,
            session.reference.len()
        );
        ConformanceVerifier::from_config(&session.config).verify(
            &session.reference,
            &snapshot,
            session.config.mode,
        )
    }

    fn teardown(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.bus.unsubscribe(id);
        }
        self.session = None;
    }
}

impl Drop for WeaponFireTestCase {
    fn drop(&mut self) {
        self.teardown();
    }
}
