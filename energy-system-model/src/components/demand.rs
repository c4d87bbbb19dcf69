use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::components::validate_non_negative;

/// Electricity demand sink. The hourly profile is scaled by the nominal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./components.ts")]
#[serde(default, deny_unknown_fields)]
pub struct DemandParams {
    /// Scaling factor applied to the demand profile (from the data survey).
    pub nominal_value: f64,
}

impl Default for DemandParams {
    fn default() -> Self {
        Self {
            nominal_value: 85.0,
        }
    }
}

impl DemandParams {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_negative("demand nominal value", self.nominal_value)
    }
}
