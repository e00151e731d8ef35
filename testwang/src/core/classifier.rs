//! Deterministic reduction of per-cycle outcomes into verdicts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::Outcome;
use crate::error::ClassifyError;

/// Verdict tag for one test across every cycle it ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictKind {
    ConsistentPassed,
    ConsistentFailed,
    ConsistentSkipped,
    ConsistentError,
    Mixed,
}

impl VerdictKind {
    fn consistent(outcome: Outcome) -> Self {
        match outcome.effective() {
            Outcome::Passed => VerdictKind::ConsistentPassed,
            Outcome::Failed => VerdictKind::ConsistentFailed,
            Outcome::Skipped => VerdictKind::ConsistentSkipped,
            Outcome::Error | Outcome::NotRun => VerdictKind::ConsistentError,
        }
    }
}

/// Classification result plus the detail needed to explain it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub kind: VerdictKind,
    /// Count per raw outcome, in the order each outcome was first observed.
    pub counts: Vec<(Outcome, usize)>,
    /// Raw outcomes in cycle order.
    pub sequence: Vec<Outcome>,
    /// Cycles in which the runner never reported this test.
    pub not_run: usize,
    /// Share of the most frequent effective outcome (1.0 when consistent).
    pub consistency: f64,
}

impl Verdict {
    pub fn is_clean(&self) -> bool {
        self.kind == VerdictKind::ConsistentPassed
    }

    /// Failed or errored in every cycle it ran in.
    pub fn is_broken(&self) -> bool {
        matches!(
            self.kind,
            VerdictKind::ConsistentFailed | VerdictKind::ConsistentError
        )
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.counts
            .iter()
            .find(|(candidate, _)| *candidate == outcome)
            .map_or(0, |(_, count)| *count)
    }
}

/// `PASSED`, `FAILED`, ..., or `MIXED (67%)`.
impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            VerdictKind::ConsistentPassed => f.write_str("PASSED"),
            VerdictKind::ConsistentFailed => f.write_str("FAILED"),
            VerdictKind::ConsistentSkipped => f.write_str("SKIPPED"),
            VerdictKind::ConsistentError => f.write_str("ERROR"),
            VerdictKind::Mixed => write!(f, "MIXED ({:.0}%)", self.consistency * 100.0),
        }
    }
}

/// Classify one test's outcome sequence.
///
/// `NOT_RUN` counts as `ERROR` when deciding consistency, but stays visible
/// in `counts`, `sequence` and `not_run`.
pub fn classify(id: &str, sequence: &[Outcome]) -> Result<Verdict, ClassifyError> {
    let first = sequence
        .first()
        .copied()
        .ok_or_else(|| ClassifyError::EmptyOutcomeSequence { id: id.to_string() })?;

    let counts = ordered_counts(sequence.iter().copied());
    let effective_counts = ordered_counts(sequence.iter().map(|outcome| outcome.effective()));
    let top = effective_counts
        .iter()
        .map(|(_, count)| *count)
        .max()
        .unwrap_or(0);

    let kind = if effective_counts.len() == 1 {
        VerdictKind::consistent(first)
    } else {
        VerdictKind::Mixed
    };

    Ok(Verdict {
        kind,
        not_run: sequence
            .iter()
            .filter(|outcome| **outcome == Outcome::NotRun)
            .count(),
        consistency: top as f64 / sequence.len() as f64,
        counts,
        sequence: sequence.to_vec(),
    })
}

fn ordered_counts<I: Iterator<Item = Outcome>>(outcomes: I) -> Vec<(Outcome, usize)> {
    let mut counts: Vec<(Outcome, usize)> = Vec::new();
    for outcome in outcomes {
        match counts.iter_mut().find(|(seen, _)| *seen == outcome) {
            Some((_, count)) => *count += 1,
            None => counts.push((outcome, 1)),
        }
    }
    counts
}

/// Roll-up over all verdicts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    /// `CONSISTENT_PASSED`.
    pub clean: usize,
    /// Everything that is not clean.
    pub needs_attention: usize,
    /// `MIXED`: flaky.
    pub mixed: usize,
    /// `CONSISTENT_FAILED` or `CONSISTENT_ERROR`: deterministically broken.
    pub broken: usize,
    /// `CONSISTENT_SKIPPED`.
    pub skipped: usize,
}

impl Summary {
    pub fn all_clean(&self) -> bool {
        self.needs_attention == 0
    }
}

pub fn summarize<'a, I>(verdicts: I) -> Summary
where
    I: IntoIterator<Item = &'a Verdict>,
{
    let mut summary = Summary::default();
    for verdict in verdicts {
        summary.total += 1;
        match verdict.kind {
            VerdictKind::ConsistentPassed => summary.clean += 1,
            VerdictKind::ConsistentFailed | VerdictKind::ConsistentError => summary.broken += 1,
            VerdictKind::ConsistentSkipped => summary.skipped += 1,
            VerdictKind::Mixed => summary.mixed += 1,
        }
    }
    summary.needs_attention = summary.total - summary.clean;
    summary
}
