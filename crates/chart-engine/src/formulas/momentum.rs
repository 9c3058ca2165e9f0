//! MACD formula.

use chart_core::{cols, IndicatorError};
use chart_functions::FunctionKind;
use serde::{Deserialize, Serialize};

use crate::indicator::{ComputeContext, Formula};

/// Configuration for [`Macd`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacdParams {
    /// Input column
    pub source: String,
    /// Fast EMA period
    pub fast: usize,
    /// Slow EMA period
    pub slow: usize,
    /// Signal-line EMA period
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            source: cols::CLOSE.to_string(),
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

impl MacdParams {
    /// Validate parameter values.
    pub fn validate(&self) -> Result<(), IndicatorError> {
        if self.fast == 0 || self.slow == 0 || self.signal == 0 {
            return Err(IndicatorError::InvalidConfig(
                "Periods must be greater than 0".into(),
            ));
        }
        if self.fast >= self.slow {
            return Err(IndicatorError::InvalidConfig(
                "Fast period must be less than slow period".into(),
            ));
        }
        Ok(())
    }
}

/// Writes `macd`, `signal` and `histogram` columns.
///
/// The fast and slow EMAs come from the shared cache over the source
/// column; the signal line is an EMA over this indicator's own `macd`
/// output, so it goes through the indicator-local cache instead.
pub struct Macd {
    params: MacdParams,
    fast: FunctionKind,
    slow: FunctionKind,
    signal: FunctionKind,
}

impl Macd {
    pub const MACD: &'static str = "macd";
    pub const SIGNAL: &'static str = "signal";
    pub const HISTOGRAM: &'static str = "histogram";

    /// Create the formula from validated parameters.
    pub fn new(params: MacdParams) -> Self {
        let fast = FunctionKind::Ema {
            period: params.fast,
        };
        let slow = FunctionKind::Ema {
            period: params.slow,
        };
        let signal = FunctionKind::Ema {
            period: params.signal,
        };
        Self {
            params,
            fast,
            slow,
            signal,
        }
    }
}

impl Formula for Macd {
    fn name(&self) -> &str {
        "macd"
    }

    fn outputs(&self) -> &[&'static str] {
        &[Self::MACD, Self::SIGNAL, Self::HISTOGRAM]
    }

    fn compute(
        &self,
        ctx: &mut ComputeContext<'_>,
        from: usize,
        len: usize,
    ) -> Result<(), IndicatorError> {
        for i in from..len {
            let fast = ctx.function(&self.params.source, &self.fast, i)?;
            let slow = ctx.function(&self.params.source, &self.slow, i)?;
            let macd = fast - slow;
            ctx.set_output(Self::MACD, i, macd);

            let signal = ctx.output_function(Self::MACD, &self.signal, i)?;
            ctx.set_output(Self::SIGNAL, i, signal);
            ctx.set_output(Self::HISTOGRAM, i, macd - signal);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BaseSeries;
    use crate::indicator::Indicator;
    use chart_core::{Bar, Timeframe};

    #[test]
    fn test_params_validation() {
        assert!(MacdParams::default().validate().is_ok());
        assert!(MacdParams {
            fast: 26,
            slow: 12,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(MacdParams {
            signal: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_signal_is_ema_of_macd_output() {
        let base = BaseSeries::new("AAPL", Timeframe::Daily);
        let params = MacdParams {
            fast: 2,
            slow: 4,
            signal: 3,
            ..Default::default()
        };
        let indicator = Indicator::spawn(base.clone(), "macd", Box::new(Macd::new(params)));

        let closes = [10.0, 12.0, 11.0, 14.0, 16.0, 15.0];
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new((i as i64 + 1) * 1000, c, c, c, c, 100.0))
            .collect();
        base.load(&bars).unwrap();

        // Replay the recurrences directly
        let (mf, ms, msig) = (2.0 / 3.0, 2.0 / 5.0, 0.5);
        let (mut fast, mut slow, mut signal) = (f64::NAN, f64::NAN, f64::NAN);
        for (i, &c) in closes.iter().enumerate() {
            fast = if i == 0 { c } else { c * mf + fast * (1.0 - mf) };
            slow = if i == 0 { c } else { c * ms + slow * (1.0 - ms) };
            let macd = fast - slow;
            signal = if i == 0 {
                macd
            } else {
                macd * msig + signal * (1.0 - msig)
            };

            assert!((indicator.output(Macd::MACD, i) - macd).abs() < 1e-12);
            assert!((indicator.output(Macd::SIGNAL, i) - signal).abs() < 1e-12);
            assert!(
                (indicator.output(Macd::HISTOGRAM, i) - (macd - signal)).abs() < 1e-12
            );
        }
    }
}
