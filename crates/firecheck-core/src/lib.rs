//! WeaponFire conformance comparison engine.
//!
//! Observes `WeaponFire` interactions on a federation bus, deduplicates
//! them by event identifier and compares the result against a reference
//! dataset, producing a PASS / FAIL / INCONCLUSIVE verdict with
//! per-identifier diagnostics.
//!
//! # Architecture
//!
//! ```text
//! reference dir ──▶ ReferenceSet ─────────────────────────┐
//!                                                         ▼
//! bus ──▶ EventCollector ──snapshot──▶ DiscoveredSet ──▶ ConformanceVerifier
//!              ▲                                          │ cardinality
//!              │ while CountdownTimer runs                │ identity
//!                                                         │ parameters
//!                                                         │ spatial
//!                                                         ▼
//!                                              VerdictBuilder ──▶ ConformanceReport
//! ```
//!
//! # Modules
//!
//! - **[`collector`]**: first-arrival-wins event collection, safe under
//!   concurrent delivery.
//! - **[`countdown`]**: interruptible bounded wait.
//! - **[`config`]**: JSON test-case parameters and tolerances.
//! - **[`reference`]**: reference dataset loading.
//! - **[`capture`]**: save/load of discovered snapshots.
//! - **[`verifier`]**: the comparison passes.
//! - **[`oracle`]**: verdict state machine and report type.
//! - **[`report`]**: human-readable rendering.
//! - **[`runner`]**: phase-sequenced test case.

pub mod capture;
pub mod collector;
pub mod config;
pub mod countdown;
pub mod oracle;
pub mod reference;
pub mod report;
pub mod runner;
pub mod verifier;

#[cfg(test)]
mod fixtures;

pub use collector::{Admission, DiscoveredSet, EventCollector};
pub use config::{AggregationMode, CheckConfig, ThresholdConfig, VelocityPolicy};
pub use oracle::{ConformanceReport, Verdict};
pub use reference::ReferenceSet;
pub use runner::WeaponFireTestCase;
pub use verifier::ConformanceVerifier;
