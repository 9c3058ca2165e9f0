//! Error types for the chart series engine.

use thiserror::Error;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Series error: {0}")]
    Series(#[from] SeriesError),

    #[error("Function error: {0}")]
    Function(#[from] FunctionError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Time index and column store errors.
#[derive(Error, Debug)]
pub enum SeriesError {
    #[error("Out-of-order timestamp: {time} arrived after {last}")]
    OutOfOrder { time: i64, last: i64 },

    #[error("Timestamp not found: {0}")]
    TimeNotFound(i64),

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Series is empty")]
    Empty,
}

/// Windowed function errors.
#[derive(Error, Debug)]
pub enum FunctionError {
    #[error("Invalid period: {0}")]
    InvalidPeriod(usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Indicator errors.
#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Formula not found: {0}")]
    FormulaNotFound(String),

    #[error("Unknown output column: {0}")]
    UnknownOutput(String),

    #[error("Timeframe mismatch: panel is {panel}, member is {member}")]
    TimeframeMismatch { panel: String, member: String },

    #[error("Compute failed: {0}")]
    ComputeFailed(String),

    #[error("Function error: {0}")]
    Function(#[from] FunctionError),
}

/// Data loading errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("No data available")]
    NoData,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for engine operations.
pub type ChartResult<T> = Result<T, ChartError>;
