//! JSON dump of the final run report.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::report::RunReport;

/// Atomically write the report as pretty JSON (temp file + rename).
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    debug!(path = %path.display(), tests = report.tests.len(), "writing run report");
    let mut buf = serde_json::to_string_pretty(report).context("serialize run report")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp report {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace report {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::{Summary, classify};
    use crate::core::report::{StopReason, TestReport};
    use crate::core::types::{Outcome, Selector, TestId, TestRun};

    fn load_report(path: &Path) -> RunReport {
        let contents = fs::read_to_string(path).expect("read report");
        serde_json::from_str(&contents).expect("parse report")
    }

    #[test]
    fn report_survives_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out/report.json");
        let runs = vec![
            TestRun::new(Outcome::Failed, 0.5),
            TestRun::new(Outcome::Passed, 0.25),
        ];
        let verdict = classify("a.test_y", &[Outcome::Failed, Outcome::Passed]).expect("verdict");
        let report = RunReport {
            cycles_requested: 2,
            cycles_run: 2,
            stop: StopReason::Completed,
            elapsed_secs: 3.0,
            tests: vec![TestReport {
                test_id: TestId::new("a.test_y"),
                selector: Selector::new("a.py::test_y"),
                verdict,
                runs,
            }],
            summary: Summary {
                total: 1,
                clean: 0,
                needs_attention: 1,
                mixed: 1,
                broken: 0,
                skipped: 0,
            },
        };

        write_report(&path, &report).expect("write");
        assert!(!temp.path().join("out/report.json.tmp").exists());
        let loaded = load_report(&path);
        assert_eq!(loaded, report);
    }
}
