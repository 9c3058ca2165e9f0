//! Column storage aligned with a time index.

use std::collections::{BTreeMap, HashMap};

/// Sentinel for absent values.
pub const MISSING: f64 = f64::NAN;

/// Check whether a value is the [`MISSING`] sentinel.
#[inline]
pub fn is_missing(value: f64) -> bool {
    value.is_nan()
}

/// Standard base-series column names.
pub mod cols {
    pub const OPEN: &str = "open";
    pub const HIGH: &str = "high";
    pub const LOW: &str = "low";
    pub const CLOSE: &str = "close";
    pub const VOLUME: &str = "volume";
    pub const AMOUNT: &str = "amount";
    pub const CLOSED: &str = "closed";

    /// All standard columns, in declaration order.
    pub const ALL: &[&str] = &[OPEN, HIGH, LOW, CLOSE, VOLUME, AMOUNT, CLOSED];
}

/// Dense column addressed by absolute position, parallel to a time index.
///
/// Reads beyond the populated range return [`MISSING`] rather than
/// failing, so formulas can freely reference `i - 1`, `i - 2`, ... near
/// the origin.
#[derive(Debug, Clone, Default)]
pub struct Column {
    values: Vec<f64>,
}

impl Column {
    /// Create an empty column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of populated slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether the column is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`, or [`MISSING`] beyond the populated range.
    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(MISSING)
    }

    /// Set the value at `index`, growing the column with [`MISSING`]
    /// slots as needed.
    pub fn set(&mut self, index: usize, value: f64) {
        if index >= self.values.len() {
            self.values.resize(index + 1, MISSING);
        }
        self.values[index] = value;
    }

    /// Append a value.
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Insert a value at `index`, shifting later values up by one.
    /// Gaps below `index` are filled with [`MISSING`].
    pub fn insert(&mut self, index: usize, value: f64) {
        if index >= self.values.len() {
            self.set(index, value);
        } else {
            self.values.insert(index, value);
        }
    }

    /// Keep only the first `len` values.
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// Drop all values.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Sparse column keyed by timestamp, for pull-computed values.
///
/// Trades O(1) positional access for O(log n) time-keyed access; used by
/// spot indicators whose values are synthesized on demand.
#[derive(Debug, Clone, Default)]
pub struct SparseColumn {
    values: BTreeMap<i64, f64>,
}

impl SparseColumn {
    /// Create an empty sparse column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Memoized value at `time`, if computed before.
    pub fn get(&self, time: i64) -> Option<f64> {
        self.values.get(&time).copied()
    }

    /// Memoize a value at `time`.
    pub fn set(&mut self, time: i64, value: f64) {
        self.values.insert(time, value);
    }

    /// Number of memoized timestamps.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether anything is memoized.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop all memoized values.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Named collection of dense columns sharing one time index.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    columns: HashMap<String, Column>,
}

impl ColumnSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the column `name`.
    pub fn ensure(&mut self, name: &str) -> &mut Column {
        self.columns.entry(name.to_string()).or_default()
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Whether a column named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Value of `name` at `index`; [`MISSING`] when the column does not
    /// exist or the slot is unpopulated.
    pub fn get(&self, name: &str, index: usize) -> f64 {
        self.columns.get(name).map(|c| c.get(index)).unwrap_or(MISSING)
    }

    /// Set the value of `name` at `index`, creating the column if needed.
    pub fn set(&mut self, name: &str, index: usize, value: f64) {
        self.ensure(name).set(index, value);
    }

    /// Truncate every column to `len` values.
    pub fn truncate_all(&mut self, len: usize) {
        for column in self.columns.values_mut() {
            column.truncate(len);
        }
    }

    /// Names of all columns, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

/// Read access to a set of named columns of known length.
///
/// Implementations return [`MISSING`] for unknown columns and for indices
/// beyond the populated range; they never fail.
pub trait SeriesRead {
    /// Number of indices in the shared time index.
    fn len(&self) -> usize;

    /// Value of `column` at `index`.
    fn value(&self, column: &str, index: usize) -> f64;

    /// Check whether the series holds no data.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`SeriesRead`] view over a [`ColumnSet`] with an explicit length.
pub struct ColumnsView<'a> {
    pub columns: &'a ColumnSet,
    pub len: usize,
}

impl SeriesRead for ColumnsView<'_> {
    fn len(&self) -> usize {
        self.len
    }

    fn value(&self, column: &str, index: usize) -> f64 {
        if index >= self.len {
            return MISSING;
        }
        self.columns.get(column, index)
    }
}
