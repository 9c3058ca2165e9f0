//! Per-key memoization of windowed aggregates.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chart_core::{FunctionError, PassId, SeriesRead, MISSING};

use crate::kind::FunctionKind;
use crate::state::{make_state, WindowState};

/// Cache key: input column identity plus function kind and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionKey {
    pub input: String,
    pub kind: FunctionKind,
}

/// One memoized incremental aggregate.
///
/// Values computed under the current pass id are immutable and served
/// straight from the cache. Requesting the next index advances the
/// running state by one step; requesting an index further ahead forward
/// fills one step at a time, preserving the amortized O(1) cost.
/// Requesting any index under a *different* pass id discards the running
/// state and recomputes from index 0 — the state never rewinds mid-pass.
pub struct CachedFunction {
    input: String,
    kind: FunctionKind,
    pass: PassId,
    values: Vec<f64>,
    state: Box<dyn WindowState>,
    steps: u64,
}

impl CachedFunction {
    fn new(input: String, kind: FunctionKind) -> Self {
        let state = make_state(&kind);
        Self {
            input,
            kind,
            pass: 0,
            values: Vec::new(),
            state,
            steps: 0,
        }
    }

    /// Number of single-step advances performed over this entry's
    /// lifetime, across all passes. Lets tests observe cache sharing.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Last index computed in the current pass, if any.
    pub fn last_index(&self) -> Option<usize> {
        self.values.len().checked_sub(1)
    }

    /// Value at `index` under `pass`.
    ///
    /// Indices beyond the populated range of `series` return [`MISSING`]
    /// without touching the running state.
    pub fn value_at(&mut self, series: &dyn SeriesRead, pass: PassId, index: usize) -> f64 {
        if index >= series.len() {
            return MISSING;
        }
        if pass != self.pass {
            self.pass = pass;
            self.values.clear();
            self.state = make_state(&self.kind);
        }
        while self.values.len() <= index {
            let next = self.values.len();
            let value = self.state.step(series, &self.input, next);
            self.values.push(value);
            self.steps += 1;
        }
        self.values[index]
    }
}

/// Registry of memoized aggregates for one owner series.
///
/// Structurally identical `(input, kind)` requests share one entry, so N
/// indicators asking for the same 14-period moving sum of `close` pay for
/// one computation.
#[derive(Default)]
pub struct FunctionTable {
    entries: HashMap<FunctionKey, CachedFunction>,
}

impl FunctionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `kind` over `input` at `index` under `pass`, creating and
    /// validating the entry on first use.
    pub fn value_at(
        &mut self,
        series: &dyn SeriesRead,
        input: &str,
        kind: &FunctionKind,
        pass: PassId,
        index: usize,
    ) -> Result<f64, FunctionError> {
        let key = FunctionKey {
            input: input.to_string(),
            kind: kind.clone(),
        };
        let entry = match self.entries.entry(key) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                kind.validate()?;
                vacant.insert(CachedFunction::new(input.to_string(), kind.clone()))
            }
        };
        Ok(entry.value_at(series, pass, index))
    }

    /// Step counter of an entry, if it exists.
    pub fn steps(&self, input: &str, kind: &FunctionKind) -> Option<u64> {
        let key = FunctionKey {
            input: input.to_string(),
            kind: kind.clone(),
        };
        self.entries.get(&key).map(CachedFunction::steps)
    }

    /// Number of memoized entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and its running state.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart_core::{ColumnSet, ColumnsView};

    fn closes(values: &[f64]) -> ColumnSet {
        let mut set = ColumnSet::new();
        let column = set.ensure("close");
        for &v in values {
            column.push(v);
        }
        set
    }

    const SUM3: FunctionKind = FunctionKind::Sum { period: 3 };

    #[test]
    fn test_moving_sum_scenario() {
        // 5 daily closes; the 3-period moving sum at index 4 is 9+12+13
        let mut set = closes(&[10.0, 11.0, 9.0, 12.0, 13.0]);
        let mut table = FunctionTable::new();

        let view = ColumnsView { columns: &set, len: 5 };
        let v = table.value_at(&view, "close", &SUM3, 1, 4).unwrap();
        assert_eq!(v, 34.0);
        assert_eq!(table.steps("close", &SUM3), Some(5));

        // Append a 6th close; the same pass only steps the new suffix
        set.ensure("close").push(14.0);
        let view = ColumnsView { columns: &set, len: 6 };
        let v = table.value_at(&view, "close", &SUM3, 1, 5).unwrap();
        assert_eq!(v, 39.0);
        assert_eq!(table.steps("close", &SUM3), Some(6));
    }

    #[test]
    fn test_cache_hit_does_not_step() {
        let set = closes(&[1.0, 2.0, 3.0, 4.0]);
        let view = ColumnsView { columns: &set, len: 4 };
        let mut table = FunctionTable::new();

        table.value_at(&view, "close", &SUM3, 1, 3).unwrap();
        let steps = table.steps("close", &SUM3).unwrap();

        // Revisiting earlier indices in the same pass is a pure cache hit
        let v = table.value_at(&view, "close", &SUM3, 1, 1).unwrap();
        assert_eq!(v, 3.0);
        assert_eq!(table.steps("close", &SUM3), Some(steps));
    }

    #[test]
    fn test_pass_change_discards_running_state() {
        let set = closes(&[1.0, 2.0, 3.0]);
        let view = ColumnsView { columns: &set, len: 3 };
        let mut table = FunctionTable::new();

        table.value_at(&view, "close", &SUM3, 1, 2).unwrap();
        assert_eq!(table.steps("close", &SUM3), Some(3));

        // New pass: same indices recompute from scratch
        let v = table.value_at(&view, "close", &SUM3, 2, 2).unwrap();
        assert_eq!(v, 6.0);
        assert_eq!(table.steps("close", &SUM3), Some(6));
    }

    #[test]
    fn test_forward_fill_far_ahead() {
        let set = closes(&[1.0; 100]);
        let view = ColumnsView { columns: &set, len: 100 };
        let mut table = FunctionTable::new();

        // Random access far ahead fills every intermediate index once
        let v = table.value_at(&view, "close", &SUM3, 1, 99).unwrap();
        assert_eq!(v, 3.0);
        assert_eq!(table.steps("close", &SUM3), Some(100));
    }

    #[test]
    fn test_beyond_populated_range_is_missing() {
        let set = closes(&[1.0, 2.0]);
        let view = ColumnsView { columns: &set, len: 2 };
        let mut table = FunctionTable::new();

        let v = table.value_at(&view, "close", &SUM3, 1, 10).unwrap();
        assert!(chart_core::is_missing(v));
        assert_eq!(table.steps("close", &SUM3), Some(0));
    }

    #[test]
    fn test_structurally_equal_requests_share_one_entry() {
        let set = closes(&[1.0, 2.0, 3.0]);
        let view = ColumnsView { columns: &set, len: 3 };
        let mut table = FunctionTable::new();

        // Built independently, with equal parameter values
        let a = FunctionKind::Average { period: 2 };
        let b = FunctionKind::Average { period: 2 };
        table.value_at(&view, "close", &a, 1, 2).unwrap();
        table.value_at(&view, "close", &b, 1, 2).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.steps("close", &b), Some(3));
    }

    #[test]
    fn test_invalid_period_rejected_on_first_use() {
        let set = closes(&[1.0]);
        let view = ColumnsView { columns: &set, len: 1 };
        let mut table = FunctionTable::new();

        let bad = FunctionKind::Average { period: 0 };
        assert!(table.value_at(&view, "close", &bad, 1, 0).is_err());
        assert!(table.is_empty());
    }
}
