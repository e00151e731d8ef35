//! Stable exit codes for the `testwang` binary.

/// Every test passed in every cycle it ran in, or there were no tests.
pub const OK: i32 = 0;
/// Bad input, bad config, or the runner could not be driven.
pub const INVALID: i32 = 1;
/// The run completed and at least one test needs attention.
pub const ATTENTION: i32 = 2;
