use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::components::validate_non_negative;
use crate::economics::{CapitalCost, DEFAULT_LIFETIME, DEFAULT_WACC};

/// Photovoltaic source. Output follows the normalised `pv` profile times the installed capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./components.ts")]
#[serde(default, deny_unknown_fields)]
pub struct PvParams {
    pub existing_capacity: f64,
    /// Investment cost of additional capacity.
    pub cost: CapitalCost,
}

impl Default for PvParams {
    fn default() -> Self {
        Self {
            cost: CapitalCost::new(1000.0, DEFAULT_LIFETIME, DEFAULT_WACC),
            existing_capacity: 0.0,
        }
    }
}

impl PvParams {
    pub fn validate(&self) -> Result<(), String> {
        self.cost.validate()?;
        validate_non_negative("pv existing capacity", self.existing_capacity)
    }
}
