//! Windowed function kinds.

use chart_core::FunctionError;
use serde::{Deserialize, Serialize};

/// A windowed aggregate, identified by kind and parameter values.
///
/// Parameters are part of the value, so two structurally identical
/// requests hash to the same cache entry even when built independently.
///
/// Single-input kinds read the input column nominated at lookup time.
/// Bar-scoped kinds ([`TrueRange`](FunctionKind::TrueRange),
/// [`Atr`](FunctionKind::Atr) and the directional family) read the
/// `high`/`low`/`close` columns directly; for those the nominated input
/// only keys the cache entry, and callers pass the close column by
/// convention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "fn", rename_all = "snake_case")]
pub enum FunctionKind {
    /// Moving sum over a trailing window.
    Sum { period: usize },
    /// Arithmetic mean over a trailing window.
    Average { period: usize },
    /// Exponential moving average with multiplier `2 / (period + 1)`.
    Ema { period: usize },
    /// Wilder smoothing with multiplier `1 / period`.
    Wilder { period: usize },
    /// Highest value over a trailing window.
    Highest { period: usize },
    /// Lowest value over a trailing window.
    Lowest { period: usize },
    /// Population standard deviation over a trailing window.
    StdDev { period: usize },
    /// True range of the bar at each index.
    TrueRange,
    /// Wilder-smoothed true range.
    Atr { period: usize },
    /// Positive directional index (+DI).
    PlusDi { period: usize },
    /// Negative directional index (-DI).
    MinusDi { period: usize },
    /// Average directional index.
    Adx { period: usize },
}

impl FunctionKind {
    /// Validate parameter values.
    pub fn validate(&self) -> Result<(), FunctionError> {
        match *self {
            FunctionKind::TrueRange => Ok(()),
            FunctionKind::StdDev { period } => {
                if period < 2 {
                    Err(FunctionError::InvalidPeriod(period))
                } else {
                    Ok(())
                }
            }
            FunctionKind::Sum { period }
            | FunctionKind::Average { period }
            | FunctionKind::Ema { period }
            | FunctionKind::Wilder { period }
            | FunctionKind::Highest { period }
            | FunctionKind::Lowest { period }
            | FunctionKind::Atr { period }
            | FunctionKind::PlusDi { period }
            | FunctionKind::MinusDi { period }
            | FunctionKind::Adx { period } => {
                if period == 0 {
                    Err(FunctionError::InvalidPeriod(period))
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_degenerate_periods() {
        assert!(FunctionKind::Sum { period: 0 }.validate().is_err());
        assert!(FunctionKind::StdDev { period: 1 }.validate().is_err());
        assert!(FunctionKind::Sum { period: 1 }.validate().is_ok());
        assert!(FunctionKind::TrueRange.validate().is_ok());
    }

    #[test]
    fn test_structural_identity() {
        // Two independently built kinds with equal parameters are the
        // same hash key.
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(FunctionKind::Average { period: 14 });
        assert!(set.contains(&FunctionKind::Average { period: 14 }));
        assert!(!set.contains(&FunctionKind::Average { period: 15 }));
    }
}
