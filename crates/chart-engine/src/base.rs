//! The base series: root of change notification.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

use chart_core::{
    cols, Bar, ColumnSet, EventKind, FunctionError, PassId, SeriesError, SeriesEvent, SeriesId,
    SeriesRead, TimeIndex, Timeframe,
};
use chart_functions::{FunctionKind, FunctionTable};
use tracing::debug;
use uuid::Uuid;

use crate::events::EventHub;
use crate::sync;

/// The time index plus the standard OHLCV columns, guarded as one unit so
/// a compute pass sees a consistent, unmoving snapshot.
pub struct SeriesData {
    index: TimeIndex,
    columns: ColumnSet,
}

impl SeriesData {
    fn new() -> Self {
        let mut columns = ColumnSet::new();
        for name in cols::ALL {
            columns.ensure(name);
        }
        Self {
            index: TimeIndex::new(),
            columns,
        }
    }

    /// The shared time index.
    pub fn index(&self) -> &TimeIndex {
        &self.index
    }

    /// The standard columns.
    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// Value of `column` at `time`, resolved through the index. MISSING
    /// when `time` is not a populated timestamp.
    pub fn value_at_time(&self, column: &str, time: i64) -> f64 {
        match self.index.position_of(time) {
            Some(index) => self.columns.get(column, index),
            None => chart_core::MISSING,
        }
    }

    fn write_row(&mut self, index: usize, bar: &Bar) {
        self.columns.set(cols::OPEN, index, bar.open);
        self.columns.set(cols::HIGH, index, bar.high);
        self.columns.set(cols::LOW, index, bar.low);
        self.columns.set(cols::CLOSE, index, bar.close);
        self.columns.set(cols::VOLUME, index, bar.volume);
        self.columns.set(cols::AMOUNT, index, bar.amount);
        self.columns
            .set(cols::CLOSED, index, if bar.closed { 1.0 } else { 0.0 });
    }

    /// Insert or overwrite the row for `bar.timestamp`. Returns whether a
    /// new slot was created (shifting later indices).
    fn upsert(&mut self, bar: &Bar) -> bool {
        let (index, created) = self.index.insert(bar.timestamp);
        if created && index + 1 < self.index.len() {
            // Past-range insert: shift every column in step with the index
            for name in cols::ALL {
                self.columns.ensure(name).insert(index, 0.0);
            }
        }
        self.write_row(index, bar);
        created
    }

    fn reload(&mut self, bars: &[Bar]) -> Result<(), SeriesError> {
        self.index = TimeIndex::new();
        self.columns = ColumnSet::new();
        for name in cols::ALL {
            self.columns.ensure(name);
        }
        for bar in bars {
            let index = self.index.push(bar.timestamp)?;
            self.write_row(index, bar);
        }
        Ok(())
    }

    fn truncate_from(&mut self, time: i64) -> usize {
        let keep = self.index.truncate_from(time);
        self.columns.truncate_all(keep);
        keep
    }
}

impl SeriesRead for SeriesData {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn value(&self, column: &str, index: usize) -> f64 {
        if index >= self.index.len() {
            return chart_core::MISSING;
        }
        self.columns.get(column, index)
    }
}

/// The root time series.
///
/// Owns the shared time index and standard columns, the memoized function
/// cache shared by every dependent indicator, the pass counter, and the
/// event hub that dependents subscribe to. Mutations take the write lock,
/// then publish one notification carrying the affected time range and the
/// pass id it belongs to; compute passes hold the read lock for their
/// duration.
pub struct BaseSeries {
    id: SeriesId,
    symbol: String,
    timeframe: Timeframe,
    data: RwLock<SeriesData>,
    functions: Mutex<FunctionTable>,
    hub: EventHub,
    passes: AtomicU64,
}

impl BaseSeries {
    /// Create an empty series. Returned in an [`Arc`] because dependents
    /// hold weak references through the event hub.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            timeframe,
            data: RwLock::new(SeriesData::new()),
            functions: Mutex::new(FunctionTable::new()),
            hub: EventHub::new(),
            passes: AtomicU64::new(0),
        })
    }

    /// Series identity, used as the event source tag.
    pub fn id(&self) -> SeriesId {
        self.id
    }

    /// Symbol this series tracks.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Sampling frequency.
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Event hub dependents subscribe to.
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Acquire the read lock for the duration of a compute pass.
    pub fn read(&self) -> RwLockReadGuard<'_, SeriesData> {
        sync::read(&self.data)
    }

    /// Start a new recomputation wave, invalidating cached function
    /// state computed under earlier waves.
    pub fn next_pass(&self) -> PassId {
        self.passes.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The wave that matches the current data. Cached function values
    /// computed under it remain valid; pure appends extend it instead of
    /// starting a new one, so incremental continuation stays O(1) per
    /// new row.
    pub fn current_pass(&self) -> PassId {
        self.passes.load(Ordering::Relaxed)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check whether the series holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First timestamp, if any.
    pub fn first_time(&self) -> Option<i64> {
        self.read().index().first_time()
    }

    /// Last timestamp, if any.
    pub fn last_time(&self) -> Option<i64> {
        self.read().index().last_time()
    }

    /// Shared windowed aggregate over a base column. `data` must be the
    /// guard of the current compute pass.
    pub fn function_value(
        &self,
        data: &SeriesData,
        input: &str,
        kind: &FunctionKind,
        pass: PassId,
        index: usize,
    ) -> Result<f64, FunctionError> {
        sync::lock(&self.functions).value_at(data, input, kind, pass, index)
    }

    /// Step counter of a cached function, if the entry exists.
    pub fn function_steps(&self, input: &str, kind: &FunctionKind) -> Option<u64> {
        sync::lock(&self.functions).steps(input, kind)
    }

    /// Replace the whole content with `bars` (initial population).
    /// Emits `Loaded` over the full range under a fresh pass.
    pub fn load(&self, bars: &[Bar]) -> Result<SeriesEvent, SeriesError> {
        let (from, to) = {
            let mut data = sync::write(&self.data);
            data.reload(bars)?;
            (
                data.index.first_time().unwrap_or(0),
                data.index.last_time().unwrap_or(0),
            )
        };
        debug!(symbol = %self.symbol, rows = bars.len(), "series loaded");
        Ok(self.publish(EventKind::Loaded, from, to, self.next_pass()))
    }

    /// Append or revise a range of rows. Emits `Refreshed` when rows were
    /// appended or inserted, `Updated` when only existing rows changed.
    ///
    /// A batch of pure tip appends extends the current pass, so function
    /// caches keep their running state and step only over the new rows.
    /// Any revision of or insert below the previous last timestamp
    /// invalidates computed history and starts a fresh pass.
    pub fn refresh(&self, bars: &[Bar]) -> Result<SeriesEvent, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }
        let mut added = false;
        let mut invalidating = false;
        let mut from = i64::MAX;
        let mut to = i64::MIN;
        {
            let mut data = sync::write(&self.data);
            for bar in bars {
                let is_append = data
                    .index
                    .last_time()
                    .map_or(true, |last| bar.timestamp > last);
                added |= data.upsert(bar);
                invalidating |= !is_append;
                from = from.min(bar.timestamp);
                to = to.max(bar.timestamp);
            }
        }
        let kind = if added {
            EventKind::Refreshed
        } else {
            EventKind::Updated
        };
        let pass = if invalidating {
            self.next_pass()
        } else {
            self.current_pass()
        };
        debug!(symbol = %self.symbol, rows = bars.len(), from, to, ?kind, "series refreshed");
        Ok(self.publish(kind, from, to, pass))
    }

    /// Truncate all rows at or after `time`. Emits `Cleared` under a
    /// fresh pass.
    pub fn clear_from(&self, time: i64) -> SeriesEvent {
        let old_last = {
            let mut data = sync::write(&self.data);
            let old_last = data.index.last_time();
            data.truncate_from(time);
            old_last
        };
        debug!(symbol = %self.symbol, time, "series cleared");
        self.publish(
            EventKind::Cleared,
            time,
            old_last.unwrap_or(time),
            self.next_pass(),
        )
    }

    fn publish(&self, kind: EventKind, from_time: i64, to_time: i64, pass: PassId) -> SeriesEvent {
        let event = SeriesEvent {
            source: self.id,
            kind,
            from_time,
            to_time,
            pass,
        };
        self.hub.publish(&event);
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new((i as i64 + 1) * 1000, c, c + 1.0, c - 1.0, c, 100.0))
            .collect()
    }

    #[test]
    fn test_load_emits_full_range() {
        let series = BaseSeries::new("AAPL", Timeframe::Daily);
        let event = series.load(&daily_bars(&[1.0, 2.0, 3.0])).unwrap();

        assert_eq!(event.kind, EventKind::Loaded);
        assert_eq!(event.from_time, 1000);
        assert_eq!(event.to_time, 3000);
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn test_load_rejects_out_of_order() {
        let series = BaseSeries::new("AAPL", Timeframe::Daily);
        let mut bars = daily_bars(&[1.0, 2.0]);
        bars[1].timestamp = bars[0].timestamp;

        assert!(series.load(&bars).is_err());
    }

    #[test]
    fn test_refresh_appends_and_revises() {
        let series = BaseSeries::new("AAPL", Timeframe::Daily);
        series.load(&daily_bars(&[1.0, 2.0])).unwrap();

        // Append: Refreshed
        let event = series
            .refresh(&[Bar::new(3000, 3.0, 4.0, 2.0, 3.0, 100.0)])
            .unwrap();
        assert_eq!(event.kind, EventKind::Refreshed);
        assert_eq!(series.len(), 3);

        // In-place revision: Updated
        let event = series
            .refresh(&[Bar::new(3000, 3.0, 5.0, 2.0, 4.0, 150.0)])
            .unwrap();
        assert_eq!(event.kind, EventKind::Updated);
        assert_eq!(series.len(), 3);
        assert_eq!(series.read().value(cols::CLOSE, 2), 4.0);
    }

    #[test]
    fn test_refresh_past_insert_shifts_rows() {
        let series = BaseSeries::new("AAPL", Timeframe::Daily);
        series.load(&daily_bars(&[1.0, 3.0])).unwrap();

        // Insert a bar between the two loaded ones
        series
            .refresh(&[Bar::new(1500, 2.0, 3.0, 1.0, 2.0, 100.0)])
            .unwrap();

        let data = series.read();
        assert_eq!(data.index().times(), &[1000, 1500, 2000]);
        assert_eq!(data.value(cols::CLOSE, 1), 2.0);
        assert_eq!(data.value(cols::CLOSE, 2), 3.0);
    }

    #[test]
    fn test_clear_from_truncates() {
        let series = BaseSeries::new("AAPL", Timeframe::Daily);
        series.load(&daily_bars(&[1.0, 2.0, 3.0])).unwrap();

        let event = series.clear_from(2000);
        assert_eq!(event.kind, EventKind::Cleared);
        assert_eq!(event.to_time, 3000);
        assert_eq!(series.len(), 1);
        assert_eq!(series.last_time(), Some(1000));
    }

    #[test]
    fn test_value_at_time_translates_via_index() {
        let series = BaseSeries::new("AAPL", Timeframe::Daily);
        series.load(&daily_bars(&[1.0, 2.0])).unwrap();

        let data = series.read();
        assert_eq!(data.value_at_time(cols::CLOSE, 2000), 2.0);
        assert!(chart_core::is_missing(data.value_at_time(cols::CLOSE, 1500)));
    }

    #[test]
    fn test_append_extends_pass_and_edits_invalidate() {
        let series = BaseSeries::new("AAPL", Timeframe::Daily);
        let loaded = series.load(&daily_bars(&[1.0, 2.0])).unwrap();

        // Pure tip append continues the wave
        let appended = series
            .refresh(&[Bar::new(3000, 3.0, 4.0, 2.0, 3.0, 100.0)])
            .unwrap();
        assert_eq!(appended.pass, loaded.pass);

        // Revising an existing row starts a new one
        let revised = series
            .refresh(&[Bar::new(3000, 3.0, 5.0, 2.0, 4.0, 100.0)])
            .unwrap();
        assert!(revised.pass > loaded.pass);

        // So does a past insert, even when the batch also appends
        let inserted = series
            .refresh(&[
                Bar::new(1500, 1.5, 2.5, 0.5, 1.5, 100.0),
                Bar::new(4000, 4.0, 5.0, 3.0, 4.0, 100.0),
            ])
            .unwrap();
        assert!(inserted.pass > revised.pass);
        assert_eq!(inserted.kind, EventKind::Refreshed);
    }
}
