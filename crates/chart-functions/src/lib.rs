//! Memoized incremental windowed aggregates.
//!
//! Many indicators need the same sliding-window computation over the same
//! input column: a 14-period moving sum of `close`, a smoothed directional
//! index chain, and so on. This crate computes each such aggregate once.
//! A [`FunctionTable`] memoizes one stateful incremental object per
//! `(input column, function kind)` key, advances it in amortized O(1) per
//! index, and discards its running state when a new recomputation pass
//! begins.

pub mod cache;
pub mod kind;
mod state;

pub use cache::{CachedFunction, FunctionKey, FunctionTable};
pub use kind::FunctionKind;
