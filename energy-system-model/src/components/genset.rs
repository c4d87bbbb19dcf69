use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::components::{validate_efficiency, validate_non_negative};
use crate::economics::{CapitalCost, DEFAULT_LIFETIME, DEFAULT_WACC};

/// Diesel generator converting diesel into electricity.
///
/// The electrical output capacity is investable, with the existing capacity as a floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./components.ts")]
#[serde(default, deny_unknown_fields)]
pub struct GensetParams {
    /// Already installed electrical output capacity.
    pub existing_capacity: f64,
    /// Electricity produced per unit of diesel consumed.
    pub efficiency: f64,
    /// Investment cost of additional capacity.
    pub cost: CapitalCost,
}

impl Default for GensetParams {
    fn default() -> Self {
        Self {
            cost: CapitalCost::new(800.0, DEFAULT_LIFETIME, DEFAULT_WACC),
            existing_capacity: 10.0,
            efficiency: 0.33,
        }
    }
}

impl GensetParams {
    pub fn validate(&self) -> Result<(), String> {
        self.cost.validate()?;
        validate_non_negative("genset existing capacity", self.existing_capacity)?;
        validate_efficiency("genset efficiency", self.efficiency)
    }
}
