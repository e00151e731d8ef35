//! Per-test outcome history accumulated across cycles.

use serde::Serialize;

use crate::core::types::{CycleResult, Outcome, TestId, TestRun};
use crate::error::StoreError;

/// History of one test: one entry per cycle it was submitted to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRecord {
    pub id: TestId,
    pub runs: Vec<TestRun>,
    /// Whether the test is still submitted to future cycles.
    pub active: bool,
}

impl TestRecord {
    fn new(id: TestId) -> Self {
        Self {
            id,
            runs: Vec::new(),
            active: true,
        }
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.runs.iter().map(|run| run.outcome).collect()
    }
}

/// Owned, append-only store of test records in input order.
#[derive(Debug, Clone, Default)]
pub struct OutcomeStore {
    records: Vec<TestRecord>,
}

impl OutcomeStore {
    /// One active, empty record per distinct id.
    pub fn new<'a, I>(ids: I) -> Self
    where
        I: IntoIterator<Item = &'a TestId>,
    {
        let mut records: Vec<TestRecord> = Vec::new();
        for id in ids {
            if !records.iter().any(|record| &record.id == id) {
                records.push(TestRecord::new(id.clone()));
            }
        }
        Self { records }
    }

    /// Append a whole cycle's outcomes.
    ///
    /// Every entry is checked before anything is appended, so a rejected
    /// cycle leaves the store unchanged.
    pub fn record(&mut self, result: &CycleResult) -> Result<(), StoreError> {
        let mut targets = Vec::with_capacity(result.runs.len());
        for (id, run) in &result.runs {
            let index = self
                .position(id)
                .ok_or_else(|| StoreError::UnknownTest {
                    cycle: result.cycle,
                    id: id.clone(),
                })?;
            if !self.records[index].active {
                return Err(StoreError::InactiveTest {
                    cycle: result.cycle,
                    id: id.clone(),
                });
            }
            targets.push((index, *run));
        }
        for (index, run) in targets {
            self.records[index].runs.push(run);
        }
        Ok(())
    }

    /// Ids still requiring submission, in input order.
    pub fn active_ids(&self) -> Vec<TestId> {
        self.records
            .iter()
            .filter(|record| record.active)
            .map(|record| record.id.clone())
            .collect()
    }

    /// Stop submitting `id` to later cycles. Unknown ids are ignored.
    pub fn prune(&mut self, id: &TestId) {
        if let Some(index) = self.position(id) {
            self.records[index].active = false;
        }
    }

    pub fn sequence(&self, id: &TestId) -> Option<&[TestRun]> {
        self.position(id)
            .map(|index| self.records[index].runs.as_slice())
    }

    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, id: &TestId) -> Option<usize> {
        self.records.iter().position(|record| &record.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(cycle: u32, runs: &[(&str, Outcome)]) -> CycleResult {
        CycleResult {
            cycle,
            runs: runs
                .iter()
                .map(|(id, outcome)| (TestId::new(*id), TestRun::new(*outcome, 0.0)))
                .collect(),
            exit_code: Some(0),
            elapsed_secs: 0.0,
        }
    }

    #[test]
    fn record_appends_in_cycle_order() {
        let ids = [TestId::new("a.x"), TestId::new("a.y")];
        let mut store = OutcomeStore::new(&ids);
        store
            .record(&cycle(1, &[("a.x", Outcome::Failed), ("a.y", Outcome::Passed)]))
            .expect("cycle 1");
        store
            .record(&cycle(2, &[("a.x", Outcome::Passed)]))
            .expect("cycle 2");

        let x: Vec<Outcome> = store.records()[0].outcomes();
        assert_eq!(x, vec![Outcome::Failed, Outcome::Passed]);
        assert_eq!(store.sequence(&ids[1]).map(<[_]>::len), Some(1));
    }

    #[test]
    fn prune_removes_from_active_but_keeps_history() {
        let ids = [TestId::new("a.x"), TestId::new("a.y")];
        let mut store = OutcomeStore::new(&ids);
        store
            .record(&cycle(1, &[("a.x", Outcome::Passed), ("a.y", Outcome::Failed)]))
            .expect("cycle 1");
        store.prune(&ids[0]);

        assert_eq!(store.active_ids(), vec![ids[1].clone()]);
        assert_eq!(store.sequence(&ids[0]).map(<[_]>::len), Some(1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn rejected_cycle_leaves_store_untouched() {
        let ids = [TestId::new("a.x"), TestId::new("a.y")];
        let mut store = OutcomeStore::new(&ids);
        store.prune(&ids[1]);

        let err = store
            .record(&cycle(1, &[("a.x", Outcome::Passed), ("a.y", Outcome::Passed)]))
            .expect_err("inactive");
        assert_eq!(
            err,
            StoreError::InactiveTest {
                cycle: 1,
                id: ids[1].clone()
            }
        );
        assert_eq!(store.sequence(&ids[0]).map(<[_]>::len), Some(0));

        let err = store
            .record(&cycle(1, &[("a.z", Outcome::Passed)]))
            .expect_err("unknown");
        assert!(matches!(err, StoreError::UnknownTest { .. }));
    }

    #[test]
    fn duplicate_ids_collapse_to_one_record() {
        let ids = [TestId::new("a.x"), TestId::new("a.x")];
        let store = OutcomeStore::new(&ids);
        assert_eq!(store.len(), 1);
    }
}
