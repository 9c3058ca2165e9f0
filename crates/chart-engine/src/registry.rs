//! Formula registry for name-keyed instantiation.

use std::collections::HashMap;

use chart_core::IndicatorError;
use serde::{Deserialize, Serialize};

use crate::formulas::{
    AdxParams, DirectionalMovement, Macd, MacdParams, MovingAverage, MovingAverageParams,
};
use crate::indicator::Formula;

/// Information about a registered formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaInfo {
    /// Formula name
    pub name: String,
    /// Formula description
    pub description: String,
    /// Default parameters as JSON
    pub default_params: serde_json::Value,
}

/// Registry of available formulas, keyed by a stable string.
///
/// The host selects a formula by key and supplies a JSON parameter set;
/// the registry deserializes, validates, and constructs the instance.
pub struct FormulaRegistry {
    formulas: HashMap<String, FormulaInfo>,
}

impl FormulaRegistry {
    /// Create a registry with all built-in formulas.
    pub fn new() -> Self {
        let mut formulas = HashMap::new();

        formulas.insert(
            "moving_average".to_string(),
            FormulaInfo {
                name: "Moving Average".to_string(),
                description: "Simple or exponential moving average of a source column"
                    .to_string(),
                default_params: serde_json::to_value(MovingAverageParams::default()).unwrap(),
            },
        );

        formulas.insert(
            "macd".to_string(),
            FormulaInfo {
                name: "MACD".to_string(),
                description: "Moving average convergence/divergence with signal line"
                    .to_string(),
                default_params: serde_json::to_value(MacdParams::default()).unwrap(),
            },
        );

        formulas.insert(
            "adx".to_string(),
            FormulaInfo {
                name: "Directional Movement".to_string(),
                description: "+DI, -DI and ADX from the shared directional chain".to_string(),
                default_params: serde_json::to_value(AdxParams::default()).unwrap(),
            },
        );

        Self { formulas }
    }

    /// List all available formulas.
    pub fn list(&self) -> Vec<&FormulaInfo> {
        self.formulas.values().collect()
    }

    /// Formula info by key.
    pub fn get(&self, key: &str) -> Option<&FormulaInfo> {
        self.formulas.get(key)
    }

    /// Check if a formula exists.
    pub fn exists(&self, key: &str) -> bool {
        self.formulas.contains_key(key)
    }

    /// All formula keys.
    pub fn keys(&self) -> Vec<&String> {
        self.formulas.keys().collect()
    }

    /// Create a formula instance from a JSON parameter set.
    pub fn create(
        &self,
        key: &str,
        params: serde_json::Value,
    ) -> Result<Box<dyn Formula>, IndicatorError> {
        match key {
            "moving_average" => {
                let params: MovingAverageParams = serde_json::from_value(params)
                    .map_err(|e| IndicatorError::InvalidConfig(e.to_string()))?;
                params.validate()?;
                Ok(Box::new(MovingAverage::new(params)))
            }
            "macd" => {
                let params: MacdParams = serde_json::from_value(params)
                    .map_err(|e| IndicatorError::InvalidConfig(e.to_string()))?;
                params.validate()?;
                Ok(Box::new(Macd::new(params)))
            }
            "adx" => {
                let params: AdxParams = serde_json::from_value(params)
                    .map_err(|e| IndicatorError::InvalidConfig(e.to_string()))?;
                params.validate()?;
                Ok(Box::new(DirectionalMovement::new(params)))
            }
            _ => Err(IndicatorError::FormulaNotFound(key.to_string())),
        }
    }
}

impl Default for FormulaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
