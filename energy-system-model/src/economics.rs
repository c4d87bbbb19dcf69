use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// Upfront investment data used to derive an annualised capacity cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./economics.ts")]
#[serde(deny_unknown_fields)]
pub struct CapitalCost {
    /// Capital expenditure per unit of capacity. Differs per component, so it has no default.
    pub capex: f64,
    /// Economic lifetime in years.
    #[serde(default = "default_lifetime")]
    pub lifetime: u32,
    /// Weighted average cost of capital, as a fraction (0.05 = 5%).
    #[serde(default = "default_wacc")]
    pub wacc: f64,
}

pub const DEFAULT_LIFETIME: u32 = 20;
pub const DEFAULT_WACC: f64 = 0.05;

fn default_lifetime() -> u32 {
    DEFAULT_LIFETIME
}

fn default_wacc() -> f64 {
    DEFAULT_WACC
}

impl CapitalCost {
    pub fn new(capex: f64, lifetime: u32, wacc: f64) -> Self {
        Self {
            capex,
            lifetime,
            wacc,
        }
    }

    /// Checks the cost data can be annualised
    pub fn validate(&self) -> Result<(), String> {
        if !self.capex.is_finite() || self.capex < 0.0 {
            return Err(format!(
                "Invalid capex: {}. Must be a non-negative number",
                self.capex
            ));
        }
        if self.lifetime == 0 {
            return Err("Invalid lifetime: 0. Must be at least one year".to_string());
        }
        if !(0.0..1.0).contains(&self.wacc) {
            return Err(format!(
                "Invalid wacc: {}. Must be between 0 and 1",
                self.wacc
            ));
        }
        Ok(())
    }
}
