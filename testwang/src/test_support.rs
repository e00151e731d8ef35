//! Test-only helpers: a scripted cycle runner and a fake `python` script.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::core::types::{CycleResult, Outcome, TestRun};
use crate::error::RunnerError;
use crate::io::cycle::{CycleRequest, CycleRunner};

/// Returns predetermined outcomes without spawning processes.
///
/// Each test id maps to a per-cycle outcome list; the last entry repeats for
/// later cycles. Ids with no script are reported as `NOT_RUN`; omitted ids
/// get no entry at all.
#[derive(Debug, Default)]
pub struct ScriptedCycleRunner {
    outcomes: HashMap<String, Vec<Outcome>>,
    fail_on_cycle: Option<u32>,
    omitted: HashSet<(String, u32)>,
    calls: RefCell<Vec<CycleRequest>>,
}

impl ScriptedCycleRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always(self, id: &str, outcome: Outcome) -> Self {
        self.sequence(id, &[outcome])
    }

    pub fn sequence(mut self, id: &str, outcomes: &[Outcome]) -> Self {
        self.outcomes.insert(id.to_string(), outcomes.to_vec());
        self
    }

    /// Fail to "launch" on the given 1-indexed cycle.
    pub fn fail_on_cycle(mut self, cycle: u32) -> Self {
        self.fail_on_cycle = Some(cycle);
        self
    }

    /// Leave `id` out of the result entirely on the given cycle.
    pub fn omit_on_cycle(mut self, id: &str, cycle: u32) -> Self {
        self.omitted.insert((id.to_string(), cycle));
        self
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<CycleRequest> {
        self.calls.borrow().clone()
    }

    fn outcome_for(&self, id: &str, cycle: u32) -> Outcome {
        let Some(script) = self.outcomes.get(id) else {
            return Outcome::NotRun;
        };
        let index = (cycle as usize).saturating_sub(1).min(script.len().saturating_sub(1));
        script.get(index).copied().unwrap_or(Outcome::NotRun)
    }
}

impl CycleRunner for ScriptedCycleRunner {
    fn run(&self, request: &CycleRequest) -> Result<CycleResult, RunnerError> {
        self.calls.borrow_mut().push(request.clone());
        if self.fail_on_cycle == Some(request.cycle) {
            return Err(RunnerError::Launch {
                program: "scripted-python".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        let runs = request
            .tests
            .iter()
            .filter(|(id, _)| !self.omitted.contains(&(id.as_str().to_string(), request.cycle)))
            .map(|(id, _)| {
                let outcome = self.outcome_for(id.as_str(), request.cycle);
                let run = match outcome {
                    Outcome::NotRun => TestRun::not_run(),
                    outcome => TestRun::new(outcome, 0.01),
                };
                (id.clone(), run)
            })
            .collect();
        Ok(CycleResult {
            cycle: request.cycle,
            runs,
            exit_code: Some(0),
            elapsed_secs: 0.05,
        })
    }
}

/// Write an executable `python` stand-in into `dir`.
///
/// The script finds its `--json=<path>` argument and writes one record per
/// remaining selector argument. A selector whose text contains `fail`
/// fails, one containing `skip` is skipped, anything else passes.
#[cfg(unix)]
pub fn write_fake_python(dir: &Path) -> std::io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let script = r#"#!/bin/sh
report=""
tests=""
sep=""
for arg in "$@"; do
  case "$arg" in
    --json=*) report="${arg#--json=}" ;;
    -m|pytest|-*) ;;
    *)
      case "$arg" in
        *fail*) outcome="failed" ;;
        *skip*) outcome="skipped" ;;
        *) outcome="passed" ;;
      esac
      echo "$arg $outcome"
      tests="$tests$sep{\"name\": \"$arg\", \"outcome\": \"$outcome\", \"call\": {\"duration\": 0.01}}"
      sep=", "
      ;;
  esac
done
printf '{"report": {"tests": [%s]}}\n' "$tests" > "$report"
"#;
    let path = dir.join("python");
    std::fs::write(&path, script)?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}
