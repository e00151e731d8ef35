//! Cycle runner abstraction and the pytest-backed implementation.
//!
//! The [`CycleRunner`] trait decouples the cycle loop from the actual test
//! runner process. Tests use scripted runners that return predetermined
//! outcomes without spawning processes.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::TempPath;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{CycleResult, Outcome, Selector, TestId, TestRun};
use crate::error::RunnerError;
use crate::io::process::{EchoSink, run_child};
use crate::io::report_json::{ReportRecord, load_report};

/// Parameters for one runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleRequest {
    /// 1-indexed cycle number.
    pub cycle: u32,
    /// Active tests and their selectors, in submission order.
    pub tests: Vec<(TestId, Selector)>,
    /// Whether the runner's raw output should be echoed this cycle.
    pub echo: bool,
}

/// Abstraction over test runner backends.
pub trait CycleRunner {
    /// Run every requested test once. Should return one entry per requested
    /// test; `run_cycles` records any it leaves out as `NOT_RUN`.
    fn run(&self, request: &CycleRequest) -> Result<CycleResult, RunnerError>;
}

/// Where pytest writes its JSON report.
#[derive(Debug)]
pub enum ReportLocation {
    /// Caller-chosen path, left in place after the run.
    Kept(PathBuf),
    /// Temp file removed when the runner is dropped.
    Temp(TempPath),
}

impl ReportLocation {
    pub fn temp() -> Result<Self> {
        let path = tempfile::Builder::new()
            .prefix("testwang-")
            .suffix(".json")
            .tempfile()
            .context("create temp report file")?
            .into_temp_path();
        Ok(ReportLocation::Temp(path))
    }

    pub fn path(&self) -> &Path {
        match self {
            ReportLocation::Kept(path) => path.as_path(),
            ReportLocation::Temp(path) => &**path,
        }
    }
}

/// Runs `<python> -m pytest <args> --json=<report> <selectors>`.
pub struct PytestCycleRunner {
    pub python: PathBuf,
    /// Pass-through arguments forwarded verbatim.
    pub pytest_args: Vec<String>,
    pub report: ReportLocation,
    pub timeout: Option<Duration>,
    pub sink: Arc<dyn EchoSink>,
}

impl PytestCycleRunner {
    /// Full argument vector, program first (for logging and tests).
    pub fn command_line(&self, selectors: &[&Selector]) -> Vec<OsString> {
        let mut line: Vec<OsString> = vec![
            self.python.clone().into_os_string(),
            "-m".into(),
            "pytest".into(),
        ];
        line.extend(self.pytest_args.iter().map(OsString::from));
        let mut json_flag = OsString::from("--json=");
        json_flag.push(self.report.path());
        line.push(json_flag);
        line.extend(selectors.iter().map(|selector| OsString::from(selector.as_str())));
        line
    }

    fn command(&self, selectors: &[&Selector]) -> Command {
        let line = self.command_line(selectors);
        let mut cmd = Command::new(&line[0]);
        // The child inherits the full parent environment unchanged.
        cmd.args(&line[1..]);
        cmd
    }

    fn clear_stale_report(&self) -> Result<(), RunnerError> {
        match fs::remove_file(self.report.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RunnerError::Io {
                action: "remove stale report",
                source,
            }),
        }
    }
}

impl CycleRunner for PytestCycleRunner {
    #[instrument(skip_all, fields(cycle = request.cycle, tests = request.tests.len(), echo = request.echo))]
    fn run(&self, request: &CycleRequest) -> Result<CycleResult, RunnerError> {
        self.clear_stale_report()?;
        let selectors: Vec<&Selector> =
            request.tests.iter().map(|(_, selector)| selector).collect();
        let cmd = self.command(&selectors);
        debug!(command = ?self.command_line(&selectors), "pytest command");

        let sink = request.echo.then(|| Arc::clone(&self.sink));
        let exit = run_child(cmd, sink, self.timeout)?;
        let exit_code = exit.status.code();

        let records = match load_report(self.report.path()) {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    exit_code = ?exit_code,
                    timed_out = exit.timed_out,
                    err = ?err,
                    "runner produced no usable report"
                );
                Vec::new()
            }
        };

        let result = collect_outcomes(
            request,
            &records,
            exit_code,
            exit.elapsed.as_secs_f64(),
        );
        info!(
            exit_code = ?exit_code,
            anomalies = result.anomalies().len(),
            elapsed_secs = result.elapsed_secs,
            "cycle finished"
        );
        Ok(result)
    }
}

/// Map runner records back onto the requested tests.
///
/// Parametrized records (`sel[param]`) fold into their base selector; when
/// several records land on one test the most severe outcome wins and the
/// durations add up. Requested tests without any record become `NOT_RUN`.
pub fn collect_outcomes(
    request: &CycleRequest,
    records: &[ReportRecord],
    exit_code: Option<i32>,
    elapsed_secs: f64,
) -> CycleResult {
    let index: HashMap<&str, usize> = request
        .tests
        .iter()
        .enumerate()
        .map(|(i, (_, selector))| (selector.as_str(), i))
        .collect();

    let mut found: Vec<Option<TestRun>> = vec![None; request.tests.len()];
    for record in records {
        let name = record.name.as_str();
        let Some(&i) = index
            .get(name)
            .or_else(|| strip_parametrization(name).and_then(|base| index.get(base)))
        else {
            debug!(record = %name, "report record matches no requested test");
            continue;
        };
        found[i] = Some(match found[i] {
            None => TestRun::new(record.outcome, record.duration_secs),
            Some(prev) => TestRun::new(
                worse(prev.outcome, record.outcome),
                prev.duration_secs + record.duration_secs,
            ),
        });
    }

    let runs = request
        .tests
        .iter()
        .zip(found)
        .map(|((id, _), run)| {
            let run = run.unwrap_or_else(|| {
                warn!(cycle = request.cycle, test = %id, "no result reported, recording NOT_RUN");
                TestRun::not_run()
            });
            (id.clone(), run)
        })
        .collect();

    CycleResult {
        cycle: request.cycle,
        runs,
        exit_code,
        elapsed_secs,
    }
}

fn strip_parametrization(name: &str) -> Option<&str> {
    if !name.ends_with(']') {
        return None;
    }
    name.find('[').map(|open| &name[..open])
}

fn worse(left: Outcome, right: Outcome) -> Outcome {
    if right.severity() > left.severity() {
        right
    } else {
        left
    }
}
