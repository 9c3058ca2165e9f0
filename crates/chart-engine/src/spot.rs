//! Pull-computed spot indicators.

use std::sync::{Arc, Mutex, Weak};

use chart_core::{cols, is_missing, IndicatorError, SeriesEvent, SeriesRead, SparseColumn};
use tracing::debug;

use crate::base::{BaseSeries, SeriesData};
use crate::events::SeriesListener;
use crate::sync;

/// Per-timestamp on-demand computation.
pub trait SpotFormula: Send + Sync {
    /// Stable formula name.
    fn name(&self) -> &str;

    /// Value at `time`, derived only from rows with timestamps `<= time`.
    fn compute_at(&self, data: &SeriesData, time: i64) -> Result<f64, IndicatorError>;
}

/// Lazily computed, time-keyed indicator.
///
/// For aggregates too expensive or rarely needed to precompute for every
/// bar. A miss computes synchronously and memoizes in a sparse
/// time-keyed column; base-series notifications are ignored entirely.
/// There is no eviction — memory grows with distinct timestamps queried.
pub struct SpotIndicator {
    name: String,
    base: Arc<BaseSeries>,
    formula: Box<dyn SpotFormula>,
    cache: Mutex<SparseColumn>,
}

impl SpotIndicator {
    /// Create a spot indicator and subscribe it to the base so its
    /// (deliberately empty) event handling mirrors eager indicators.
    pub fn spawn(
        base: Arc<BaseSeries>,
        name: impl Into<String>,
        formula: Box<dyn SpotFormula>,
    ) -> Arc<Self> {
        let indicator = Arc::new(Self {
            name: name.into(),
            base,
            formula,
            cache: Mutex::new(SparseColumn::new()),
        });
        indicator
            .base
            .hub()
            .subscribe(Arc::downgrade(&indicator) as Weak<dyn SeriesListener>);
        indicator
    }

    /// Indicator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value at `time`, computing and memoizing on a miss.
    pub fn value_at(&self, time: i64) -> Result<f64, IndicatorError> {
        if let Some(value) = sync::lock(&self.cache).get(time) {
            return Ok(value);
        }
        let value = {
            let data = self.base.read();
            self.formula.compute_at(&data, time)?
        };
        debug!(indicator = %self.name, time, value, "spot value computed");
        sync::lock(&self.cache).set(time, value);
        Ok(value)
    }

    /// Spot values are synthesized on demand, so every timestamp exists.
    pub fn exists(&self, _time: i64) -> bool {
        true
    }

    /// Number of memoized timestamps.
    pub fn cached_len(&self) -> usize {
        sync::lock(&self.cache).len()
    }
}

impl SeriesListener for SpotIndicator {
    /// Spot indicators never recompute eagerly.
    fn on_series_event(&self, _event: &SeriesEvent) {}
}

/// Share of all volume traded at or below the close of the bar at (or
/// just before) `time`, over the full history up to `time`.
///
/// O(n) per query over the whole history — the canonical aggregate that
/// is pulled on demand instead of precomputed per bar.
pub struct VolumeDistribution;

impl SpotFormula for VolumeDistribution {
    fn name(&self) -> &str {
        "volume_distribution"
    }

    fn compute_at(&self, data: &SeriesData, time: i64) -> Result<f64, IndicatorError> {
        let upto = data.index().lower_bound(time.saturating_add(1));
        if upto == 0 {
            return Ok(0.0);
        }
        let threshold = data.value(cols::CLOSE, upto - 1);
        let mut total = 0.0;
        let mut below = 0.0;
        for i in 0..upto {
            let volume = data.value(cols::VOLUME, i);
            if is_missing(volume) {
                continue;
            }
            total += volume;
            let close = data.value(cols::CLOSE, i);
            if !is_missing(close) && close <= threshold {
                below += volume;
            }
        }
        Ok(if total == 0.0 { 0.0 } else { below / total })
    }
}
