//! Built-in formulas.
//!
//! Each formula is a thin plug-in over the engine's primitives: column
//! reads, output writes, and shared windowed-function lookups.

pub mod momentum;
pub mod moving_average;
pub mod trend;

pub use momentum::{Macd, MacdParams};
pub use moving_average::{MovingAverage, MovingAverageParams};
pub use trend::{AdxParams, DirectionalMovement};
