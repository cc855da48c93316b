use crate::aggregation::MAX_TRAILING_MONTHS;
use crate::cash::FamilyFactors;
use crate::error::{PlannerError, Result};
use crate::schema::{ForecastMethod, ForecastWeights};
use crate::utils::{normalize_factor, DEFAULT_FACTOR};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Months in an automatic window when none is configured.
pub const DEFAULT_TRAILING_MONTHS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PlannerConfig {
    #[schemars(
        description = "Markup factor (sale / cost) used when a supplier has none. Values above 10 are read as percentages (170 = 1.70)."
    )]
    pub default_factor: f64,

    #[schemars(description = "Per-family markup factors used by cash planning")]
    pub family_factors: FamilyFactors,

    #[schemars(description = "Number of months before the reference month in an automatic window")]
    pub trailing_months: u32,

    #[schemars(description = "Forecast method used when a request does not name one")]
    pub default_method: ForecastMethod,

    #[schemars(description = "Blend weights used when a request does not provide them")]
    pub default_weights: ForecastWeights,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_factor: DEFAULT_FACTOR,
            family_factors: FamilyFactors::default(),
            trailing_months: DEFAULT_TRAILING_MONTHS,
            default_method: ForecastMethod::default(),
            default_weights: ForecastWeights::default(),
        }
    }
}

impl PlannerConfig {
    /// Parses and validates a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// `default_factor` in decimal form; a legacy 170 reads as 1.70.
    pub fn normalized_default_factor(&self) -> f64 {
        normalize_factor(Some(self.default_factor), DEFAULT_FACTOR)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.default_factor.is_finite() && self.default_factor > 0.0) {
            return Err(PlannerError::InvalidConfig(format!(
                "default_factor must be positive, got {}",
                self.default_factor
            )));
        }

        let families = [
            ("cartridges", self.family_factors.cartridges),
            ("commercial", self.family_factors.commercial),
            ("imported", self.family_factors.imported),
        ];
        for (family, factor) in families {
            if !(factor.is_finite() && factor > 0.0) {
                return Err(PlannerError::InvalidConfig(format!(
                    "family factor for {} must be positive, got {}",
                    family, factor
                )));
            }
        }

        if self.trailing_months == 0 {
            return Err(PlannerError::InvalidConfig(
                "trailing_months must be at least 1".to_string(),
            ));
        }
        if self.trailing_months > MAX_TRAILING_MONTHS {
            return Err(PlannerError::InvalidConfig(format!(
                "trailing_months must be at most {}, got {}",
                MAX_TRAILING_MONTHS, self.trailing_months
            )));
        }

        if self.default_weights.as_array().iter().any(|w| w.is_nan()) {
            return Err(PlannerError::InvalidConfig(
                "default_weights must be numbers".to_string(),
            ));
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schema_for!(PlannerConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}
