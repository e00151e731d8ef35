//! Parser for the pytest-json result file (`pytest --json=<path>`).
//!
//! Only `report.tests[].name`, `.outcome` and the `duration` of each phase
//! section are read; everything else in the file is ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::types::{Outcome, Selector};

/// One per-test record from the runner's report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRecord {
    /// pytest node id, e.g. `pkg/mod.py::Class::test_it[param]`.
    pub name: Selector,
    pub outcome: Outcome,
    pub duration_secs: f64,
}

#[derive(Debug, Deserialize)]
struct ReportFile {
    report: ReportBody,
}

#[derive(Debug, Deserialize)]
struct ReportBody {
    #[serde(default)]
    tests: Vec<RawTest>,
}

#[derive(Debug, Deserialize)]
struct RawTest {
    name: String,
    outcome: String,
    #[serde(flatten)]
    sections: BTreeMap<String, Value>,
}

impl RawTest {
    fn into_record(self) -> ReportRecord {
        let outcome = Outcome::from_runner(&self.outcome).unwrap_or_else(|| {
            warn!(test = %self.name, outcome = %self.outcome, "unrecognized outcome, treating as error");
            Outcome::Error
        });
        // setup/call/teardown each carry their own duration.
        let duration_secs = self
            .sections
            .values()
            .filter_map(|section| section.as_object())
            .filter_map(|section| section.get("duration").and_then(Value::as_f64))
            .sum();
        ReportRecord {
            name: Selector::new(self.name),
            outcome,
            duration_secs,
        }
    }
}

/// Parse report contents.
pub fn parse_report(contents: &str) -> Result<Vec<ReportRecord>> {
    let file: ReportFile = serde_json::from_str(contents).context("parse runner report json")?;
    let records: Vec<ReportRecord> = file
        .report
        .tests
        .into_iter()
        .map(RawTest::into_record)
        .collect();
    debug!(records = records.len(), "runner report parsed");
    Ok(records)
}

/// Read and parse the report written by the runner.
pub fn load_report(path: &Path) -> Result<Vec<ReportRecord>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read runner report {}", path.display()))?;
    parse_report(&contents).with_context(|| format!("parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
  "report": {
    "environment": {"Python": "3.11"},
    "tests": [
      {
        "name": "a/b.py::C::test_x",
        "duration": 0.6,
        "run_index": 0,
        "setup": {"name": "setup", "duration": 0.1, "outcome": "passed"},
        "call": {"name": "call", "duration": 0.4, "outcome": "passed"},
        "teardown": {"name": "teardown", "duration": 0.1, "outcome": "passed"},
        "outcome": "passed"
      },
      {
        "name": "a.py::b::test_y",
        "setup": {"duration": 0.25, "outcome": "failed"},
        "outcome": "error"
      },
      {
        "name": "a.py::test_z",
        "outcome": "weird"
      }
    ],
    "summary": {"passed": 1, "error": 1}
  }
}"#;

    #[test]
    fn parses_names_outcomes_and_phase_durations() {
        let records = parse_report(SAMPLE).expect("parse");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].name.as_str(), "a/b.py::C::test_x");
        assert_eq!(records[0].outcome, Outcome::Passed);
        assert!((records[0].duration_secs - 0.6).abs() < 1e-9);
        assert_eq!(records[1].outcome, Outcome::Error);
        assert!((records[1].duration_secs - 0.25).abs() < 1e-9);
    }

    #[test]
    fn unknown_outcome_becomes_error() {
        let records = parse_report(SAMPLE).expect("parse");
        assert_eq!(records[2].outcome, Outcome::Error);
        assert_eq!(records[2].duration_secs, 0.0);
    }

    #[test]
    fn report_without_tests_is_empty() {
        let records = parse_report(r#"{"report": {"summary": {}}}"#).expect("parse");
        assert!(records.is_empty());
    }

    #[test]
    fn truncated_report_is_an_error() {
        assert!(parse_report(r#"{"report": {"tests": ["#).is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("report.json");
        fs::write(&path, SAMPLE).expect("write");
        assert_eq!(load_report(&path).expect("load").len(), 3);
        assert!(load_report(&temp.path().join("missing.json")).is_err());
    }
}
