//! Typed failure kinds surfaced by the cycle engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::TestId;

/// Failure converting a test id into a runner selector.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    /// Fewer than two dot-separated segments, or an empty segment.
    #[error("malformed test id {id:?}: expected at least `module.test`")]
    MalformedTestId { id: String },

    /// No prefix of the id names an existing `.py` file under the root.
    #[error("test module not found for {id} under {}", root.display())]
    ModuleNotFound { id: String, root: PathBuf },
}

/// Fatal failure driving the external runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The runner process could not be started at all.
    #[error("failed to launch runner {program}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on or killing the runner process failed.
    #[error("runner process I/O failed during {action}")]
    Io {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Misuse of the outcome store (a sequencing defect, not a user error).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("cycle {cycle} reported unknown test {id}")]
    UnknownTest { cycle: u32, id: TestId },

    #[error("cycle {cycle} reported pruned test {id}")]
    InactiveTest { cycle: u32, id: TestId },
}

/// Classification defects.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("no outcomes recorded for {id}")]
    EmptyOutcomeSequence { id: String },
}
