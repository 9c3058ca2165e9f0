//! Core data types for the chart series engine.

mod bar;
mod timeframe;

pub use bar::Bar;
pub use timeframe::Timeframe;
