//! Multi-cycle flaky-test runner.
//!
//! Runs a fixed list of pytest tests for several cycles, records each test's
//! outcome per cycle, and classifies every test as consistently passing,
//! failing, skipped, erroring, or mixed. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (selector translation, outcome
//!   store, classification, report assembly). No I/O.
//! - **[`io`]**: Side-effecting operations (test list and config files,
//!   pytest process, JSON reports). Isolated behind [`io::cycle::CycleRunner`]
//!   so the cycle loop can be tested without spawning processes.
//!
//! [`cycles`] drives the loop; [`present`] renders its result for the console.

pub mod core;
pub mod cycles;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod passthrough;
pub mod present;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
