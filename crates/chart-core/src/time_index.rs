//! The shared time index.

use crate::error::SeriesError;

/// Strictly increasing sequence of epoch-millisecond timestamps, shared by
/// a base series and every series derived from it.
///
/// Index `i` and timestamp `t` translate both ways via binary search in
/// O(log n). The sequence is append-heavy but may also receive past-range
/// inserts during a historical reload, which shift all indices at and
/// after the insert point.
#[derive(Debug, Clone, Default)]
pub struct TimeIndex {
    times: Vec<i64>,
}

impl TimeIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timestamps.
    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Check whether the index is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Timestamp at `index`, if populated.
    pub fn time_at(&self, index: usize) -> Option<i64> {
        self.times.get(index).copied()
    }

    /// First timestamp.
    pub fn first_time(&self) -> Option<i64> {
        self.times.first().copied()
    }

    /// Last timestamp.
    pub fn last_time(&self) -> Option<i64> {
        self.times.last().copied()
    }

    /// Exact position of `time`, if present. O(log n).
    pub fn position_of(&self, time: i64) -> Option<usize> {
        self.times.binary_search(&time).ok()
    }

    /// First index whose timestamp is `>= time` (the insertion point).
    /// Equals `len()` when every timestamp is smaller. O(log n).
    pub fn lower_bound(&self, time: i64) -> usize {
        self.times.partition_point(|&t| t < time)
    }

    /// Append a timestamp. It must be strictly greater than the last one.
    pub fn push(&mut self, time: i64) -> Result<usize, SeriesError> {
        if let Some(last) = self.last_time() {
            if time <= last {
                return Err(SeriesError::OutOfOrder { time, last });
            }
        }
        self.times.push(time);
        Ok(self.times.len() - 1)
    }

    /// Insert a timestamp keeping order. A duplicate is a no-op.
    ///
    /// Returns the index of the timestamp and whether a new slot was
    /// created (shifting every index at and after it).
    pub fn insert(&mut self, time: i64) -> (usize, bool) {
        match self.times.binary_search(&time) {
            Ok(index) => (index, false),
            Err(index) => {
                self.times.insert(index, time);
                (index, true)
            }
        }
    }

    /// Drop every timestamp at or after `time`. Returns the new length.
    pub fn truncate_from(&mut self, time: i64) -> usize {
        let keep = self.lower_bound(time);
        self.times.truncate(keep);
        keep
    }

    /// All timestamps, oldest first.
    pub fn times(&self) -> &[i64] {
        &self.times
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(times: &[i64]) -> TimeIndex {
        let mut index = TimeIndex::new();
        for &t in times {
            index.push(t).unwrap();
        }
        index
    }

    #[test]
    fn test_push_rejects_out_of_order() {
        let mut index = index_of(&[10, 20, 30]);

        assert!(index.push(30).is_err());
        assert!(index.push(25).is_err());
        assert_eq!(index.push(40).unwrap(), 3);
    }

    #[test]
    fn test_binary_search() {
        let index = index_of(&[10, 20, 30, 40]);

        assert_eq!(index.position_of(20), Some(1));
        assert_eq!(index.position_of(25), None);
        assert_eq!(index.lower_bound(25), 2);
        assert_eq!(index.lower_bound(10), 0);
        assert_eq!(index.lower_bound(41), 4);
    }

    #[test]
    fn test_insert_shifts_and_dedupes() {
        let mut index = index_of(&[10, 30]);

        // Past-range insert shifts later indices
        assert_eq!(index.insert(20), (1, true));
        assert_eq!(index.time_at(2), Some(30));

        // Duplicate is a no-op
        assert_eq!(index.insert(20), (1, false));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_truncate_from() {
        let mut index = index_of(&[10, 20, 30, 40]);

        assert_eq!(index.truncate_from(25), 2);
        assert_eq!(index.last_time(), Some(20));

        // Truncating past the end keeps everything
        assert_eq!(index.truncate_from(100), 2);
    }
}
