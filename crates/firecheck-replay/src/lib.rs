//! Stand-in federation for exercising the conformance core in-process.
//!
//! - **[`bus`]**: [`LocalBus`](bus::LocalBus), a publish/subscribe bus that
//!   delivers interactions on a pool of worker threads, with optional
//!   seeded duplicate/drop faults to mimic an unreliable transport.
//! - **[`replay`]**: [`Replayer`](replay::Replayer), which republishes a
//!   reference dataset onto a bus at a fixed period, the way a scripted
//!   system under test would.

pub mod bus;
pub mod replay;
