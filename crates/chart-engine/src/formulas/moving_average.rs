//! Moving-average formula.

use chart_core::{cols, IndicatorError};
use chart_functions::FunctionKind;
use serde::{Deserialize, Serialize};

use crate::indicator::{ComputeContext, Formula};

/// Configuration for [`MovingAverage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovingAverageParams {
    /// Input column
    pub source: String,
    /// Window length
    pub period: usize,
    /// Use exponential instead of simple smoothing
    pub use_ema: bool,
}

impl Default for MovingAverageParams {
    fn default() -> Self {
        Self {
            source: cols::CLOSE.to_string(),
            period: 20,
            use_ema: false,
        }
    }
}

impl MovingAverageParams {
    /// Validate parameter values.
    pub fn validate(&self) -> Result<(), IndicatorError> {
        if self.period == 0 {
            return Err(IndicatorError::InvalidConfig(
                "Period must be greater than 0".into(),
            ));
        }
        if self.source.is_empty() {
            return Err(IndicatorError::InvalidConfig(
                "Source column required".into(),
            ));
        }
        Ok(())
    }
}

/// Writes one `ma` column: a simple or exponential moving average of the
/// source column, served from the shared function cache.
pub struct MovingAverage {
    params: MovingAverageParams,
    kind: FunctionKind,
}

impl MovingAverage {
    pub const OUTPUT: &'static str = "ma";

    /// Create the formula from validated parameters.
    pub fn new(params: MovingAverageParams) -> Self {
        let kind = if params.use_ema {
            FunctionKind::Ema {
                period: params.period,
            }
        } else {
            FunctionKind::Average {
                period: params.period,
            }
        };
        Self { params, kind }
    }
}

impl Formula for MovingAverage {
    fn name(&self) -> &str {
        "moving_average"
    }

    fn outputs(&self) -> &[&'static str] {
        &[Self::OUTPUT]
    }

    fn compute(
        &self,
        ctx: &mut ComputeContext<'_>,
        from: usize,
        len: usize,
    ) -> Result<(), IndicatorError> {
        for i in from..len {
            let value = ctx.function(&self.params.source, &self.kind, i)?;
            ctx.set_output(Self::OUTPUT, i, value);
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
        assert!(MovingAverageParams::default().validate().is_ok());
        assert!(MovingAverageParams {
            period: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_simple_average_over_closes() {
        let base = BaseSeries::new("AAPL", Timeframe::Daily);
        let params = MovingAverageParams {
            period: 3,
            ..Default::default()
        };
        let indicator = Indicator::spawn(base.clone(), "ma", Box::new(MovingAverage::new(params)));

        let bars: Vec<Bar> = [3.0, 6.0, 9.0, 12.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new((i as i64 + 1) * 1000, c, c, c, c, 100.0))
            .collect();
        base.load(&bars).unwrap();

        assert_eq!(indicator.output(MovingAverage::OUTPUT, 0), 3.0);
        assert_eq!(indicator.output(MovingAverage::OUTPUT, 2), 6.0);
        assert_eq!(indicator.output(MovingAverage::OUTPUT, 3), 9.0);
    }
}
