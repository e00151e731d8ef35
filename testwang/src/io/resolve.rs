//! Filesystem-backed selector translation.
//!
//! Probes each prefix of the dotted id, shortest first, for an existing
//! `<prefix>.py` under `root`. The first hit is the module; the remaining
//! segments become the `::` suffix. This removes the class/function
//! ambiguity of the positional rule at the cost of touching the filesystem.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::selector::{checked_segments, join_selector, translate};
use crate::core::types::{Selector, TestId};
use crate::error::TranslateError;

/// How test ids become selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Positional class/method rule, no filesystem access.
    Positional,
    /// Probe module files under the given root.
    Filesystem(PathBuf),
}

impl Resolution {
    pub fn translate(&self, id: &TestId) -> Result<Selector, TranslateError> {
        match self {
            Resolution::Positional => translate(id),
            Resolution::Filesystem(root) => resolve_on_disk(root, id),
        }
    }
}

/// Resolve `id` against module files under `root`.
pub fn resolve_on_disk(root: &Path, id: &TestId) -> Result<Selector, TranslateError> {
    let segments = checked_segments(id)?;
    // At least one segment must remain for the test itself.
    for module_len in 1..segments.len() {
        let mut candidate = root.to_path_buf();
        for segment in &segments[..module_len] {
            candidate.push(segment);
        }
        candidate.set_extension("py");
        if candidate.is_file() {
            debug!(test = %id, module = %candidate.display(), "resolved test module");
            return Ok(join_selector(&segments, module_len));
        }
    }
    Err(TranslateError::ModuleNotFound {
        id: id.as_str().to_string(),
        root: root.to_path_buf(),
    })
}
