//! Multi-cycle driver: submit the active tests, record, prune, repeat.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::report::{RunReport, RunTally, StopReason, build_report};
use crate::core::selector::SelectorMap;
use crate::core::store::OutcomeStore;
use crate::core::types::{CycleResult, TestId, TestRun};
use crate::io::cycle::{CycleRequest, CycleRunner};

/// When the runner's raw output is echoed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Echo {
    #[default]
    None,
    All,
    /// Only the last requested cycle.
    Final,
}

impl Echo {
    fn applies_to(self, cycle: u32, cycles: u32) -> bool {
        match self {
            Echo::None => false,
            Echo::All => true,
            Echo::Final => cycle == cycles,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleConfig {
    pub cycles: u32,
    /// Drop a test from later cycles once it has passed.
    pub failure_focus: bool,
    pub echo: Echo,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            cycles: 1,
            failure_focus: false,
            echo: Echo::None,
        }
    }
}

/// Shared stop request, checked between cycles.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress notifications emitted by [`run_cycles`].
#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    Started {
        cycle: u32,
        of: u32,
        active: usize,
    },
    Finished {
        cycle: u32,
        elapsed_secs: f64,
        /// Tests submitted this cycle that the runner never reported.
        anomalies: Vec<TestId>,
        /// Tests pruned after this cycle under failure focus.
        pruned: usize,
    },
}

/// Run up to `config.cycles` cycles over the store's active tests and
/// classify the result.
///
/// Stops early when failure focus has pruned every test or `cancel` is set.
/// A runner failure aborts the whole run without a partial report.
#[instrument(skip_all, fields(cycles = config.cycles, failure_focus = config.failure_focus, tests = store.len()))]
pub fn run_cycles<R: CycleRunner, F: FnMut(&CycleEvent)>(
    store: &mut OutcomeStore,
    selectors: &SelectorMap,
    runner: &R,
    config: &CycleConfig,
    cancel: &CancelFlag,
    mut on_event: F,
) -> Result<RunReport> {
    if config.cycles == 0 {
        return Err(anyhow!("cycles must be > 0"));
    }
    let started = Instant::now();
    let mut cycles_run = 0u32;
    let mut stop = StopReason::Completed;

    for cycle in 1..=config.cycles {
        if cycle > 1 && cancel.is_cancelled() {
            info!(cycle, "cancelled before cycle");
            stop = StopReason::Cancelled;
            break;
        }

        let active = store.active_ids();
        if active.is_empty() {
            info!(cycle, "every test pruned, stopping early");
            stop = StopReason::AllPruned;
            break;
        }

        let tests = active
            .into_iter()
            .map(|id| {
                let selector = selectors
                    .selector(&id)
                    .cloned()
                    .ok_or_else(|| anyhow!("no selector for test {id}"))?;
                Ok((id, selector))
            })
            .collect::<Result<Vec<_>>>()?;
        let request = CycleRequest {
            cycle,
            echo: config.echo.applies_to(cycle, config.cycles),
            tests,
        };
        on_event(&CycleEvent::Started {
            cycle,
            of: config.cycles,
            active: request.tests.len(),
        });

        let result = runner
            .run(&request)
            .with_context(|| format!("cycle {cycle} of {}", config.cycles))?;
        let result = fill_missing(result, &request);
        store.record(&result)?;
        cycles_run += 1;

        let mut pruned = 0usize;
        if config.failure_focus {
            for id in result.passed() {
                debug!(cycle, test = %id, "passed, pruning");
                store.prune(id);
                pruned += 1;
            }
        }

        on_event(&CycleEvent::Finished {
            cycle,
            elapsed_secs: result.elapsed_secs,
            anomalies: result.anomalies().into_iter().cloned().collect(),
            pruned,
        });
    }

    let tally = RunTally {
        cycles_requested: config.cycles,
        cycles_run,
        stop,
        elapsed_secs: started.elapsed().as_secs_f64(),
    };
    let report = build_report(store, selectors, tally)?;
    info!(
        cycles_run,
        stop = ?report.stop,
        clean = report.summary.clean,
        needs_attention = report.summary.needs_attention,
        "run finished"
    );
    Ok(report)
}

/// Put the runner's entries in submission order, with `NOT_RUN` for every
/// requested test it left out. Entries for tests that were not requested are
/// kept at the end so the store rejects them.
fn fill_missing(mut result: CycleResult, request: &CycleRequest) -> CycleResult {
    let mut runs = Vec::with_capacity(request.tests.len());
    for (id, _) in &request.tests {
        match result.runs.iter().position(|(candidate, _)| candidate == id) {
            Some(index) => runs.push(result.runs.swap_remove(index)),
            None => {
                warn!(
                    cycle = request.cycle,
                    test = %id,
                    "runner returned no entry, recording NOT_RUN"
                );
                runs.push((id.clone(), TestRun::not_run()));
            }
        }
    }
    runs.append(&mut result.runs);
    result.runs = runs;
    result
}
