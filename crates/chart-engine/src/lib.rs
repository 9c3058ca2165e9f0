//! Incremental recompute engine for derived chart series.
//!
//! A [`BaseSeries`] owns the shared time index and the standard OHLCV
//! columns and is the root of change notification. [`Indicator`]s
//! subscribe to it (or to another indicator), track a computed-time
//! high-water mark, and recompute only the affected suffix, sharing
//! sliding-window aggregates through the base's memoized function cache.
//! [`SpotIndicator`] covers pull-computed per-timestamp aggregates,
//! [`SignalIndicator`] discrete trade signals with structural
//! de-duplication, and [`PanelIndicator`] batched cross-sectional
//! computation.

pub mod base;
pub mod events;
pub mod formulas;
pub mod indicator;
pub mod logging;
pub mod panel;
pub mod registry;
pub mod signal;
pub mod spot;
mod sync;

pub use base::{BaseSeries, SeriesData};
pub use events::{EventHub, SeriesListener};
pub use indicator::{ComputeContext, Formula, Indicator};
pub use panel::{PanelIndicator, PanelMember};
pub use registry::{FormulaInfo, FormulaRegistry};
pub use signal::{
    Signal, SignalEvent, SignalFilter, SignalIndicator, SignalKind, SignalListener,
};
pub use spot::{SpotFormula, SpotIndicator, VolumeDistribution};
