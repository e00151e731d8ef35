//! Final, self-contained report of a multi-cycle run.

use serde::{Deserialize, Serialize};

use crate::core::classifier::{Summary, Verdict, classify, summarize};
use crate::core::selector::SelectorMap;
use crate::core::store::OutcomeStore;
use crate::core::types::{Selector, TestId, TestRun};
use crate::error::ClassifyError;

/// Why the cycle loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every requested cycle ran.
    Completed,
    /// No active tests were left (failure focus pruned all of them).
    AllPruned,
    /// The caller asked to stop after the current cycle.
    Cancelled,
}

/// Verdict and history for one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub test_id: TestId,
    pub selector: Selector,
    pub verdict: Verdict,
    pub runs: Vec<TestRun>,
}

impl TestReport {
    pub fn total_duration_secs(&self) -> f64 {
        self.runs.iter().map(|run| run.duration_secs).sum()
    }

    pub fn mean_duration_secs(&self) -> f64 {
        if self.runs.is_empty() {
            0.0
        } else {
            self.total_duration_secs() / self.runs.len() as f64
        }
    }
}

/// Consolidated result handed to presentation; holds no references into the
/// outcome store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub cycles_requested: u32,
    pub cycles_run: u32,
    pub stop: StopReason,
    pub elapsed_secs: f64,
    pub tests: Vec<TestReport>,
    pub summary: Summary,
}

impl RunReport {
    pub fn get(&self, id: &TestId) -> Option<&TestReport> {
        self.tests.iter().find(|test| &test.test_id == id)
    }
}

/// Cycle bookkeeping carried from the loop into the report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunTally {
    pub cycles_requested: u32,
    pub cycles_run: u32,
    pub stop: StopReason,
    pub elapsed_secs: f64,
}

/// Classify every record in the store, in input order.
pub fn build_report(
    store: &OutcomeStore,
    selectors: &SelectorMap,
    tally: RunTally,
) -> Result<RunReport, ClassifyError> {
    let mut tests = Vec::with_capacity(store.len());
    for record in store.records() {
        let verdict = classify(record.id.as_str(), &record.outcomes())?;
        let selector = selectors
            .selector(&record.id)
            .cloned()
            .unwrap_or_else(|| Selector::new(record.id.as_str()));
        tests.push(TestReport {
            test_id: record.id.clone(),
            selector,
            verdict,
            runs: record.runs.clone(),
        });
    }
    let summary = summarize(tests.iter().map(|test| &test.verdict));
    Ok(RunReport {
        cycles_requested: tally.cycles_requested,
        cycles_run: tally.cycles_run,
        stop: tally.stop,
        elapsed_secs: tally.elapsed_secs,
        tests,
        summary,
    })
}
