//! Incremental running state, one object per function kind.
//!
//! Each state advances one index at a time within a pass; the input
//! columns do not move underneath it for the duration of the pass, so
//! window eviction can re-read the value leaving the window instead of
//! keeping a ring buffer.

use std::collections::VecDeque;

use chart_core::{cols, is_missing, SeriesRead, MISSING};

use crate::kind::FunctionKind;

/// One-step advance of a windowed aggregate.
pub(crate) trait WindowState: Send + Sync {
    /// Value at `index`, which is exactly one past the previous call.
    fn step(&mut self, series: &dyn SeriesRead, input: &str, index: usize) -> f64;
}

/// Build the fresh running state for `kind`.
pub(crate) fn make_state(kind: &FunctionKind) -> Box<dyn WindowState> {
    match *kind {
        FunctionKind::Sum { period } => Box::new(SlidingSum::new(period, false)),
        FunctionKind::Average { period } => Box::new(SlidingSum::new(period, true)),
        FunctionKind::Ema { period } => Box::new(Recursive::ema(period)),
        FunctionKind::Wilder { period } => Box::new(Recursive::wilder(period)),
        FunctionKind::Highest { period } => Box::new(Extremum::new(period, true)),
        FunctionKind::Lowest { period } => Box::new(Extremum::new(period, false)),
        FunctionKind::StdDev { period } => Box::new(Moments::new(period)),
        FunctionKind::TrueRange => Box::new(TrueRange),
        FunctionKind::Atr { period } => Box::new(SmoothedTrueRange::new(period)),
        FunctionKind::PlusDi { period } => {
            Box::new(Directional::new(period, DirectionalOutput::PlusDi))
        }
        FunctionKind::MinusDi { period } => {
            Box::new(Directional::new(period, DirectionalOutput::MinusDi))
        }
        FunctionKind::Adx { period } => Box::new(Directional::new(period, DirectionalOutput::Adx)),
    }
}

/// Moving sum / moving average with O(1) eviction.
struct SlidingSum {
    period: usize,
    mean: bool,
    sum: f64,
    count: usize,
}

impl SlidingSum {
    fn new(period: usize, mean: bool) -> Self {
        Self {
            period,
            mean,
            sum: 0.0,
            count: 0,
        }
    }
}

impl WindowState for SlidingSum {
    fn step(&mut self, series: &dyn SeriesRead, input: &str, index: usize) -> f64 {
        let value = series.value(input, index);
        if !is_missing(value) {
            self.sum += value;
            self.count += 1;
        }
        if index >= self.period {
            let leaving = series.value(input, index - self.period);
            if !is_missing(leaving) {
                self.sum -= leaving;
                self.count -= 1;
            }
        }
        if self.count == 0 {
            return MISSING;
        }
        if self.mean {
            self.sum / self.count as f64
        } else {
            self.sum
        }
    }
}

/// Exponentially weighted recurrence, seeded with the first real value.
struct Recursive {
    multiplier: f64,
    prev: Option<f64>,
}

impl Recursive {
    fn ema(period: usize) -> Self {
        Self {
            multiplier: 2.0 / (period as f64 + 1.0),
            prev: None,
        }
    }

    fn wilder(period: usize) -> Self {
        Self {
            multiplier: 1.0 / period as f64,
            prev: None,
        }
    }

    fn update(&mut self, value: f64) -> f64 {
        if is_missing(value) {
            return self.prev.unwrap_or(MISSING);
        }
        let next = match self.prev {
            None => value,
            Some(prev) => value * self.multiplier + prev * (1.0 - self.multiplier),
        };
        self.prev = Some(next);
        next
    }
}

impl WindowState for Recursive {
    fn step(&mut self, series: &dyn SeriesRead, input: &str, index: usize) -> f64 {
        self.update(series.value(input, index))
    }
}

/// Highest/lowest over a trailing window via a monotonic deque.
struct Extremum {
    period: usize,
    max: bool,
    window: VecDeque<(usize, f64)>,
}

impl Extremum {
    fn new(period: usize, max: bool) -> Self {
        Self {
            period,
            max,
            window: VecDeque::new(),
        }
    }
}

impl WindowState for Extremum {
    fn step(&mut self, series: &dyn SeriesRead, input: &str, index: usize) -> f64 {
        while let Some(&(front, _)) = self.window.front() {
            if front + self.period <= index {
                self.window.pop_front();
            } else {
                break;
            }
        }
        let value = series.value(input, index);
        if !is_missing(value) {
            while let Some(&(_, back)) = self.window.back() {
                let dominated = if self.max { back <= value } else { back >= value };
                if dominated {
                    self.window.pop_back();
                } else {
                    break;
                }
            }
            self.window.push_back((index, value));
        }
        self.window.front().map(|&(_, v)| v).unwrap_or(MISSING)
    }
}

/// Rolling population standard deviation from sum and sum-of-squares.
struct Moments {
    period: usize,
    sum: f64,
    sum_sq: f64,
    count: usize,
}

impl Moments {
    fn new(period: usize) -> Self {
        Self {
            period,
            sum: 0.0,
            sum_sq: 0.0,
            count: 0,
        }
    }
}

impl WindowState for Moments {
    fn step(&mut self, series: &dyn SeriesRead, input: &str, index: usize) -> f64 {
        let value = series.value(input, index);
        if !is_missing(value) {
            self.sum += value;
            self.sum_sq += value * value;
            self.count += 1;
        }
        if index >= self.period {
            let leaving = series.value(input, index - self.period);
            if !is_missing(leaving) {
                self.sum -= leaving;
                self.sum_sq -= leaving * leaving;
                self.count -= 1;
            }
        }
        if self.count == 0 {
            return MISSING;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        // Accumulated rounding can push the variance slightly negative
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        variance.sqrt()
    }
}

/// True range of the bar at `index`.
fn true_range_at(series: &dyn SeriesRead, index: usize) -> f64 {
    let high = series.value(cols::HIGH, index);
    let low = series.value(cols::LOW, index);
    let prev_close = if index == 0 {
        MISSING
    } else {
        series.value(cols::CLOSE, index - 1)
    };
    if is_missing(prev_close) {
        high - low
    } else {
        let hl = high - low;
        let hc = (high - prev_close).abs();
        let lc = (low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Per-bar true range.
struct TrueRange;

impl WindowState for TrueRange {
    fn step(&mut self, series: &dyn SeriesRead, _input: &str, index: usize) -> f64 {
        true_range_at(series, index)
    }
}

/// Wilder-smoothed true range.
struct SmoothedTrueRange {
    smooth: Recursive,
}

impl SmoothedTrueRange {
    fn new(period: usize) -> Self {
        Self {
            smooth: Recursive::wilder(period),
        }
    }
}

impl WindowState for SmoothedTrueRange {
    fn step(&mut self, series: &dyn SeriesRead, _input: &str, index: usize) -> f64 {
        self.smooth.update(true_range_at(series, index))
    }
}

#[derive(Clone, Copy)]
enum DirectionalOutput {
    PlusDi,
    MinusDi,
    Adx,
}

/// The +DM / -DM / TR Wilder chain behind +DI, -DI and ADX.
///
/// All three outputs advance the same recurrences; each cache entry
/// selects one component.
struct Directional {
    output: DirectionalOutput,
    plus: Recursive,
    minus: Recursive,
    tr: Recursive,
    dx: Recursive,
}

impl Directional {
    fn new(period: usize, output: DirectionalOutput) -> Self {
        Self {
            output,
            plus: Recursive::wilder(period),
            minus: Recursive::wilder(period),
            tr: Recursive::wilder(period),
            dx: Recursive::wilder(period),
        }
    }
}

impl WindowState for Directional {
    fn step(&mut self, series: &dyn SeriesRead, _input: &str, index: usize) -> f64 {
        let (plus_dm, minus_dm) = if index == 0 {
            (0.0, 0.0)
        } else {
            let up = series.value(cols::HIGH, index) - series.value(cols::HIGH, index - 1);
            let down = series.value(cols::LOW, index - 1) - series.value(cols::LOW, index);
            if up > down && up > 0.0 {
                (up, 0.0)
            } else if down > up && down > 0.0 {
                (0.0, down)
            } else {
                (0.0, 0.0)
            }
        };

        let smoothed_plus = self.plus.update(plus_dm);
        let smoothed_minus = self.minus.update(minus_dm);
        let smoothed_tr = self.tr.update(true_range_at(series, index));

        let (plus_di, minus_di) = if is_missing(smoothed_tr) || smoothed_tr == 0.0 {
            (0.0, 0.0)
        } else {
            (
                100.0 * smoothed_plus / smoothed_tr,
                100.0 * smoothed_minus / smoothed_tr,
            )
        };
        let dx = if plus_di + minus_di == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / (plus_di + minus_di)
        };
        let adx = self.dx.update(dx);

        match self.output {
            DirectionalOutput::PlusDi => plus_di,
            DirectionalOutput::MinusDi => minus_di,
            DirectionalOutput::Adx => adx,
        }
    }
}
