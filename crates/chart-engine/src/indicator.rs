//! Derived series with incremental recomputation.

use std::sync::{Arc, Mutex, RwLock, Weak};

use chart_core::{
    ColumnSet, ColumnsView, EventKind, IndicatorError, PassId, SeriesEvent, SeriesId, SeriesRead,
    MISSING,
};
use chart_functions::{FunctionKind, FunctionTable};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::base::{BaseSeries, SeriesData};
use crate::events::{EventHub, SeriesListener};
use crate::sync;

/// A pluggable per-indicator computation.
///
/// `compute` writes the declared output columns for indices
/// `from..len`. By convention the value at `i` may only read base or
/// derived data at indices `<= i`; suffix-only recomputation relies on
/// this. Implementations must be total over the range — reads near the
/// origin yield MISSING rather than failing, so no index arithmetic
/// needs guarding.
pub trait Formula: Send + Sync {
    /// Stable formula name.
    fn name(&self) -> &str;

    /// Output columns this formula writes.
    fn outputs(&self) -> &[&'static str];

    /// Compute output values for indices `from..len`.
    fn compute(
        &self,
        ctx: &mut ComputeContext<'_>,
        from: usize,
        len: usize,
    ) -> Result<(), IndicatorError>;
}

/// Everything a formula may touch during one compute pass: base columns,
/// upstream outputs, the shared function cache, and its own outputs.
pub struct ComputeContext<'a> {
    base: &'a BaseSeries,
    data: &'a SeriesData,
    upstream: Option<ColumnsView<'a>>,
    outputs: &'a mut ColumnSet,
    local_functions: &'a mut FunctionTable,
    pass: PassId,
}

impl ComputeContext<'_> {
    /// Number of rows in the shared time index.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check whether the series holds no rows.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The recomputation wave this pass belongs to.
    pub fn pass(&self) -> PassId {
        self.pass
    }

    /// Timestamp at `index`, if populated.
    pub fn time_at(&self, index: usize) -> Option<i64> {
        self.data.index().time_at(index)
    }

    /// Input value at `index`: the upstream indicator's output when it
    /// declares `column`, the base column otherwise.
    pub fn value(&self, column: &str, index: usize) -> f64 {
        if let Some(upstream) = &self.upstream {
            if upstream.columns.contains(column) {
                return upstream.value(column, index);
            }
        }
        self.data.value(column, index)
    }

    /// Shared windowed aggregate over a base column.
    pub fn function(
        &self,
        input: &str,
        kind: &FunctionKind,
        index: usize,
    ) -> Result<f64, IndicatorError> {
        self.base
            .function_value(self.data, input, kind, self.pass, index)
            .map_err(IndicatorError::from)
    }

    /// This indicator's own output at `index`.
    pub fn output(&self, column: &str, index: usize) -> f64 {
        self.outputs.get(column, index)
    }

    /// Write this indicator's output at `index`.
    pub fn set_output(&mut self, column: &str, index: usize, value: f64) {
        self.outputs.set(column, index, value);
    }

    /// Windowed aggregate over one of this indicator's own output
    /// columns (for second-stage smoothing such as a signal line).
    pub fn output_function(
        &mut self,
        input: &str,
        kind: &FunctionKind,
        index: usize,
    ) -> Result<f64, IndicatorError> {
        let view = ColumnsView {
            columns: &*self.outputs,
            len: self.data.len(),
        };
        self.local_functions
            .value_at(&view, input, kind, self.pass, index)
            .map_err(IndicatorError::from)
    }
}

struct IndicatorState {
    /// Latest timestamp up to which outputs are valid; `i64::MIN` before
    /// the first completed pass.
    computed_time: i64,
    outputs: ColumnSet,
    /// Aggregates over this indicator's own outputs.
    functions: FunctionTable,
}

/// A derived series.
///
/// Subscribes to its input series (the base, or another indicator for
/// second-order derivations), tracks a computed-time high-water mark,
/// recomputes only the affected suffix, and republishes `Computed` so
/// that indicators layered on top cascade.
pub struct Indicator {
    id: SeriesId,
    name: String,
    base: Arc<BaseSeries>,
    upstream: Option<Arc<Indicator>>,
    formula: Box<dyn Formula>,
    state: RwLock<IndicatorState>,
    /// Serializes compute passes per instance.
    gate: Mutex<()>,
    hub: EventHub,
}

impl Indicator {
    /// Create an indicator over a base series and subscribe it to the
    /// base's notifications.
    pub fn spawn(
        base: Arc<BaseSeries>,
        name: impl Into<String>,
        formula: Box<dyn Formula>,
    ) -> Arc<Self> {
        Self::spawn_inner(base, None, name.into(), formula)
    }

    /// Create an indicator whose input is another indicator's outputs;
    /// subscribes to the upstream's notifications so recomputation
    /// cascades in dependency order.
    pub fn spawn_on(
        upstream: Arc<Indicator>,
        name: impl Into<String>,
        formula: Box<dyn Formula>,
    ) -> Arc<Self> {
        let base = upstream.base.clone();
        Self::spawn_inner(base, Some(upstream), name.into(), formula)
    }

    fn spawn_inner(
        base: Arc<BaseSeries>,
        upstream: Option<Arc<Indicator>>,
        name: String,
        formula: Box<dyn Formula>,
    ) -> Arc<Self> {
        let mut outputs = ColumnSet::new();
        for output in formula.outputs() {
            outputs.ensure(output);
        }
        let indicator = Arc::new(Self {
            id: Uuid::new_v4(),
            name,
            base,
            upstream,
            formula,
            state: RwLock::new(IndicatorState {
                computed_time: i64::MIN,
                outputs,
                functions: FunctionTable::new(),
            }),
            gate: Mutex::new(()),
            hub: EventHub::new(),
        });
        let listener = Arc::downgrade(&indicator) as Weak<dyn SeriesListener>;
        match &indicator.upstream {
            Some(upstream) => upstream.hub.subscribe(listener),
            None => indicator.base.hub().subscribe(listener),
        }
        indicator
    }

    /// Series identity, used as the event source tag.
    pub fn id(&self) -> SeriesId {
        self.id
    }

    /// Indicator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The base series this indicator is ultimately derived from.
    pub fn base(&self) -> &Arc<BaseSeries> {
        &self.base
    }

    /// Event hub for second-order dependents.
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Latest timestamp up to which outputs are valid; `i64::MIN` before
    /// the first completed pass.
    pub fn computed_time(&self) -> i64 {
        sync::read(&self.state).computed_time
    }

    /// Output value at `index`.
    pub fn output(&self, column: &str, index: usize) -> f64 {
        sync::read(&self.state).outputs.get(column, index)
    }

    /// Output value at `time`, resolved through the shared index.
    pub fn output_at_time(&self, column: &str, time: i64) -> f64 {
        let data = self.base.read();
        match data.index().position_of(time) {
            Some(index) => sync::read(&self.state).outputs.get(column, index),
            None => MISSING,
        }
    }

    /// Recompute outputs from `from_time` under `pass`. Returns the
    /// number of indices written.
    ///
    /// `from_time <= 0` forces a full recompute; a `from_time` below the
    /// high-water mark re-validates forward from that point (a past
    /// edit); otherwise the pass continues from the high-water mark, and
    /// is a no-op when no rows exist beyond it. The high-water mark only
    /// advances when the formula returns `Ok`, so a failed pass retries
    /// from the same point on the next notification.
    pub fn compute_from(&self, from_time: i64, pass: PassId) -> Result<usize, IndicatorError> {
        let _gate = sync::lock(&self.gate);
        let data = self.base.read();
        let len = data.len();
        let upstream_guard = self.upstream.as_ref().map(|u| sync::read(&u.state));
        let mut state = sync::write(&self.state);

        let from_index = if from_time <= 0 || state.computed_time == i64::MIN {
            0
        } else if from_time < state.computed_time {
            // Past edit: re-validate forward from the edited time
            data.index().lower_bound(from_time)
        } else {
            if from_time > state.computed_time {
                let next = data.index().lower_bound(state.computed_time.saturating_add(1));
                if next >= len {
                    return Ok(0); // no rows beyond the high-water mark
                }
            }
            // Incremental continuation: recompute from the bar holding the
            // high-water mark, which may still be forming
            data.index().lower_bound(state.computed_time)
        };
        if len == 0 || from_index >= len {
            return Ok(0);
        }

        let upstream_view = upstream_guard.as_ref().map(|guard| ColumnsView {
            columns: &guard.outputs,
            len,
        });
        let IndicatorState {
            outputs, functions, ..
        } = &mut *state;
        let mut ctx = ComputeContext {
            base: &self.base,
            data: &*data,
            upstream: upstream_view,
            outputs,
            local_functions: functions,
            pass,
        };
        self.formula.compute(&mut ctx, from_index, len)?;

        let to_time = data.index().time_at(len - 1).unwrap_or(from_time);
        let event_from = data.index().time_at(from_index).unwrap_or(to_time);
        state.computed_time = to_time;
        debug!(
            indicator = %self.name,
            from = from_index,
            len,
            pass,
            "pass complete"
        );

        drop(state);
        drop(upstream_guard);
        drop(data);
        drop(_gate);

        self.hub.publish(&SeriesEvent {
            source: self.id,
            kind: EventKind::Computed,
            from_time: event_from,
            to_time,
            pass,
        });
        Ok(len - from_index)
    }

    /// Recompute from `from_time` outside any notification cascade
    /// (explicit host-driven recomputation). The data has not changed,
    /// so the pass that matches it is reused and shared caches stay
    /// warm.
    pub fn refresh_from(&self, from_time: i64) -> Result<usize, IndicatorError> {
        self.compute_from(from_time, self.base.current_pass())
    }

    fn on_cleared(&self, event: &SeriesEvent) -> Result<usize, IndicatorError> {
        {
            let _gate = sync::lock(&self.gate);
            let data = self.base.read();
            let len = data.len();
            let mut state = sync::write(&self.state);
            state.outputs.truncate_all(len);
            state.functions.clear();
            state.computed_time = match data.index().last_time() {
                Some(last) => state.computed_time.min(last),
                None => i64::MIN,
            };
        }
        self.compute_from(event.from_time, event.pass)
    }
}

impl SeriesListener for Indicator {
    fn on_series_event(&self, event: &SeriesEvent) {
        if event.source == self.id {
            return; // never self-trigger
        }
        let result = match event.kind {
            EventKind::Cleared => self.on_cleared(event),
            _ => self.compute_from(event.from_time, event.pass),
        };
        if let Err(error) = result {
            warn!(
                indicator = %self.name,
                %error,
                "compute pass aborted; outputs retry from the previous high-water mark"
            );
        }
    }
}
