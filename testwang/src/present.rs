//! Console rendering of progress events and the final report.

use crate::core::report::{RunReport, StopReason, TestReport};
use crate::cycles::CycleEvent;

/// Console presenter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Console {
    pub cycles: u32,
    /// List only tests that failed (or errored) in every cycle.
    pub failure_focus: bool,
    /// Print every cycle's outcome and duration under each test.
    pub report_cycles: bool,
}

impl Console {
    fn cycle_header(&self, cycle: u32) -> String {
        format!("Test cycle {cycle:2} of {:2}  --  ", self.cycles)
    }

    /// Progress line(s) for one orchestrator event.
    pub fn event_lines(&self, event: &CycleEvent) -> Vec<String> {
        match event {
            CycleEvent::Started { cycle, active, .. } => {
                vec![format!("{}{active} tests to run", self.cycle_header(*cycle))]
            }
            CycleEvent::Finished {
                cycle,
                elapsed_secs,
                anomalies,
                pruned,
            } => {
                let indent = " ".repeat(self.cycle_header(*cycle).len());
                let mut lines = vec![format!("{indent}{elapsed_secs:.2}s for cycle")];
                if !anomalies.is_empty() {
                    let ids: Vec<&str> = anomalies.iter().map(|id| id.as_str()).collect();
                    lines.push(format!("{indent}no result for: {}", ids.join(", ")));
                }
                if *pruned > 0 {
                    lines.push(format!("{indent}{pruned} passed, dropped from later cycles"));
                }
                lines
            }
        }
    }

    /// Full end-of-run report, newline terminated.
    pub fn render(&self, report: &RunReport) -> String {
        let unit = if report.cycles_requested == 1 {
            "cycle"
        } else {
            "cycles"
        };
        let mut out = format!(
            "\nRan {} {unit} of tests in {:5.2}s\n\n",
            report.cycles_run, report.elapsed_secs
        );

        let width = label_width(report);
        for test in &report.tests {
            if self.failure_focus && !test.verdict.is_broken() {
                continue;
            }
            let verdict = test.verdict.to_string();
            out.push_str(&format!("{verdict:<width$} {}\n", test.test_id));
            if self.report_cycles {
                out.push_str(&cycle_detail(test, width));
            }
        }

        match report.stop {
            StopReason::Completed => {}
            StopReason::AllPruned => out.push_str(&format!(
                "\nStopped after {} of {} cycles: every test has passed\n",
                report.cycles_run, report.cycles_requested
            )),
            StopReason::Cancelled => out.push_str(&format!(
                "\nCancelled after {} of {} cycles\n",
                report.cycles_run, report.cycles_requested
            )),
        }

        let summary = &report.summary;
        out.push_str(&format!(
            "\n{} tests: {} clean, {} need attention ({} mixed, {} broken, {} skipped)\n",
            summary.total,
            summary.clean,
            summary.needs_attention,
            summary.mixed,
            summary.broken,
            summary.skipped
        ));
        out
    }
}

fn cycle_detail(test: &TestReport, width: usize) -> String {
    let indent = " ".repeat(width + 1);
    let mut lines: String = test
        .runs
        .iter()
        .map(|run| {
            let outcome = run.outcome.label();
            format!("{indent}{outcome:<width$} {:5.2}s\n", run.duration_secs)
        })
        .collect();
    if test.runs.len() > 1 {
        lines.push_str(&format!(
            "{indent}{indent}{:5.2}s total, {:5.2}s mean\n\n",
            test.total_duration_secs(),
            test.mean_duration_secs()
        ));
    }
    lines
}

/// Widest verdict or per-cycle outcome label in the report.
fn label_width(report: &RunReport) -> usize {
    report
        .tests
        .iter()
        .flat_map(|test| {
            std::iter::once(test.verdict.to_string().len())
                .chain(test.runs.iter().map(|run| run.outcome.label().len()))
        })
        .max()
        .unwrap_or(0)
}
