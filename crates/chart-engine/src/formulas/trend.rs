//! Directional-movement formula (ADX family).

use chart_core::{cols, IndicatorError};
use chart_functions::FunctionKind;
use serde::{Deserialize, Serialize};

use crate::indicator::{ComputeContext, Formula};

/// Configuration for [`DirectionalMovement`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdxParams {
    /// Wilder smoothing period
    pub period: usize,
}

impl Default for AdxParams {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl AdxParams {
    /// Validate parameter values.
    pub fn validate(&self) -> Result<(), IndicatorError> {
        if self.period == 0 {
            return Err(IndicatorError::InvalidConfig(
                "Period must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Writes `plus_di`, `minus_di` and `adx` columns from the shared
/// directional-movement chain, so any number of indicators over the same
/// base pay for the chain once.
pub struct DirectionalMovement {
    plus: FunctionKind,
    minus: FunctionKind,
    adx: FunctionKind,
}

impl DirectionalMovement {
    pub const PLUS_DI: &'static str = "plus_di";
    pub const MINUS_DI: &'static str = "minus_di";
    pub const ADX: &'static str = "adx";

    /// Create the formula from validated parameters.
    pub fn new(params: AdxParams) -> Self {
        Self {
            plus: FunctionKind::PlusDi {
                period: params.period,
            },
            minus: FunctionKind::MinusDi {
                period: params.period,
            },
            adx: FunctionKind::Adx {
                period: params.period,
            },
        }
    }
}

impl Formula for DirectionalMovement {
    fn name(&self) -> &str {
        "adx"
    }

    fn outputs(&self) -> &[&'static str] {
        &[Self::PLUS_DI, Self::MINUS_DI, Self::ADX]
    }

    fn compute(
        &self,
        ctx: &mut ComputeContext<'_>,
        from: usize,
        len: usize,
    ) -> Result<(), IndicatorError> {
        for i in from..len {
            let plus = ctx.function(cols::CLOSE, &self.plus, i)?;
            let minus = ctx.function(cols::CLOSE, &self.minus, i)?;
            let adx = ctx.function(cols::CLOSE, &self.adx, i)?;
            ctx.set_output(Self::PLUS_DI, i, plus);
            ctx.set_output(Self::MINUS_DI, i, minus);
            ctx.set_output(Self::ADX, i, adx);
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
    fn test_uptrend_favors_plus_di() {
        let base = BaseSeries::new("AAPL", Timeframe::Daily);
        let indicator = Indicator::spawn(
            base.clone(),
            "adx",
            Box::new(DirectionalMovement::new(AdxParams { period: 3 })),
        );

        // Steadily rising bars
        let bars: Vec<Bar> = (0..10)
            .map(|i| {
                let c = 100.0 + i as f64 * 2.0;
                Bar::new((i + 1) * 1000, c - 1.0, c + 1.0, c - 2.0, c, 100.0)
            })
            .collect();
        base.load(&bars).unwrap();

        let last = bars.len() - 1;
        let plus = indicator.output(DirectionalMovement::PLUS_DI, last);
        let minus = indicator.output(DirectionalMovement::MINUS_DI, last);
        let adx = indicator.output(DirectionalMovement::ADX, last);

        assert!(plus > minus, "uptrend should favor +DI: {plus} vs {minus}");
        assert!((0.0..=100.0).contains(&adx));
        assert!(adx > 50.0, "a clean trend should read as strong: {adx}");
    }
}
