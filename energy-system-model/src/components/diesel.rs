use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::components::validate_non_negative;

/// Diesel fuel resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./components.ts")]
#[serde(default, deny_unknown_fields)]
pub struct DieselParams {
    /// Fuel price per unit of diesel energy.
    pub price: f64,
}

impl Default for DieselParams {
    fn default() -> Self {
        Self { price: 0.04 }
    }
}

impl DieselParams {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_negative("diesel price", self.price)
    }
}
