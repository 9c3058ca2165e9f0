//! Core types for the chart series engine.
//!
//! This crate provides the foundational building blocks including:
//! - The time index shared between a base series and its derived series
//! - Dense and sparse columns with a MISSING sentinel
//! - Bar and timeframe types
//! - Change-notification event types
//! - The error taxonomy

pub mod column;
pub mod error;
pub mod event;
pub mod time_index;
pub mod types;

pub use column::{
    cols, is_missing, Column, ColumnSet, ColumnsView, SeriesRead, SparseColumn, MISSING,
};
pub use error::{ChartError, ChartResult, DataError, FunctionError, IndicatorError, SeriesError};
pub use event::{EventKind, PassId, SeriesEvent, SeriesId};
pub use time_index::TimeIndex;
pub use types::{Bar, Timeframe};
