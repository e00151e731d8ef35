//! Shared deterministic types for the cycle engine.
//!
//! These types define stable contracts between core components. They do not
//! depend on external state or I/O and serialize to a stable JSON shape.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dotted test identifier as found in a Jenkins-style report
/// (`pkg.module.Class.method` or `pkg.module.function`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(String);

impl TestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dot-separated segments of the identifier.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Runner-native test reference (`path/to/module.py::Class::method`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(String);

impl Selector {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of one test in one cycle.
///
/// `NotRun` is recorded when the test was submitted but the runner produced
/// no record for it (crash, timeout, selection mismatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
    Error,
    NotRun,
}

impl Outcome {
    /// Map a runner outcome string (case-insensitive).
    ///
    /// Returns `None` for strings the runner is not documented to emit.
    pub fn from_runner(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "passed" | "xpassed" => Some(Outcome::Passed),
            "failed" => Some(Outcome::Failed),
            "skipped" | "xfailed" => Some(Outcome::Skipped),
            "error" => Some(Outcome::Error),
            _ => None,
        }
    }

    /// Outcome used for classification: an anomaly counts as an error.
    pub fn effective(self) -> Self {
        match self {
            Outcome::NotRun => Outcome::Error,
            other => other,
        }
    }

    /// Rank used when several runner records fold into one test.
    pub fn severity(self) -> u8 {
        match self {
            Outcome::Skipped => 0,
            Outcome::Passed => 1,
            Outcome::Failed => 2,
            Outcome::Error => 3,
            Outcome::NotRun => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed => "FAILED",
            Outcome::Skipped => "SKIPPED",
            Outcome::Error => "ERROR",
            Outcome::NotRun => "NOT_RUN",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One observation of a test in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestRun {
    pub outcome: Outcome,
    /// Seconds spent in setup, call and teardown as reported by the runner.
    pub duration_secs: f64,
}

impl TestRun {
    pub fn new(outcome: Outcome, duration_secs: f64) -> Self {
        Self {
            outcome,
            duration_secs,
        }
    }

    pub fn not_run() -> Self {
        Self::new(Outcome::NotRun, 0.0)
    }
}

/// Per-cycle outcomes for exactly the tests that were active in that cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleResult {
    /// 1-indexed cycle number.
    pub cycle: u32,
    /// Outcome per active test, in submission order.
    pub runs: Vec<(TestId, TestRun)>,
    /// Exit code of the runner process (`None` if killed by a signal).
    pub exit_code: Option<i32>,
    /// Wall-clock seconds the runner process took.
    pub elapsed_secs: f64,
}

impl CycleResult {
    pub fn get(&self, id: &TestId) -> Option<&TestRun> {
        self.runs
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, run)| run)
    }

    /// Tests the runner was asked to run but never reported.
    pub fn anomalies(&self) -> Vec<&TestId> {
        self.runs
            .iter()
            .filter(|(_, run)| run.outcome == Outcome::NotRun)
            .map(|(id, _)| id)
            .collect()
    }

    /// Tests whose outcome in this cycle was `PASSED`.
    pub fn passed(&self) -> impl Iterator<Item = &TestId> {
        self.runs
            .iter()
            .filter(|(_, run)| run.outcome == Outcome::Passed)
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_outcomes_map_case_insensitively() {
        assert_eq!(Outcome::from_runner("passed"), Some(Outcome::Passed));
        assert_eq!(Outcome::from_runner("FAILED"), Some(Outcome::Failed));
        assert_eq!(Outcome::from_runner("xfailed"), Some(Outcome::Skipped));
        assert_eq!(Outcome::from_runner("xpassed"), Some(Outcome::Passed));
        assert_eq!(Outcome::from_runner("Error"), Some(Outcome::Error));
        assert_eq!(Outcome::from_runner("rerun"), None);
    }

    #[test]
    fn not_run_is_an_error_for_classification() {
        assert_eq!(Outcome::NotRun.effective(), Outcome::Error);
        assert_eq!(Outcome::Skipped.effective(), Outcome::Skipped);
    }

    #[test]
    fn outcome_serializes_upper_case() {
        let json = serde_json::to_string(&Outcome::NotRun).expect("serialize");
        assert_eq!(json, "\"NOT_RUN\"");
        let id = serde_json::to_string(&TestId::new("a.b")).expect("serialize");
        assert_eq!(id, "\"a.b\"");
    }

    #[test]
    fn cycle_result_lists_anomalies_and_passes() {
        let result = CycleResult {
            cycle: 1,
            runs: vec![
                (TestId::new("a.x"), TestRun::new(Outcome::Passed, 0.1)),
                (TestId::new("a.y"), TestRun::not_run()),
            ],
            exit_code: Some(1),
            elapsed_secs: 0.5,
        };
        assert_eq!(result.anomalies(), vec![&TestId::new("a.y")]);
        assert_eq!(result.passed().collect::<Vec<_>>(), vec![&TestId::new("a.x")]);
        assert!(result.get(&TestId::new("a.z")).is_none());
    }
}
