//! Deterministic, pure logic shared by the cycle engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod report;
pub mod selector;
pub mod store;
pub mod types;
