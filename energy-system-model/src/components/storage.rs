use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::components::{validate_efficiency, validate_non_negative};
use crate::economics::{CapitalCost, DEFAULT_LIFETIME, DEFAULT_WACC};

/// Electricity storage attached to the electricity bus on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./components.ts")]
#[serde(default, deny_unknown_fields)]
pub struct StorageParams {
    /// Already installed storage capacity.
    pub existing_capacity: f64,
    /// Fraction of the stored content lost per timestep.
    pub loss_rate: f64,
    /// Initial content as a fraction of capacity. `None` lets the solver choose.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_storage_level: Option<f64>,
    /// Charging power per unit of storage capacity.
    pub crate_charge: f64,
    /// Discharging power per unit of storage capacity.
    pub crate_discharge: f64,
    pub efficiency_charge: f64,
    pub efficiency_discharge: f64,
    /// Whether the content at the end of the horizon must equal the initial content.
    pub balanced: bool,
    /// Investment cost of additional capacity.
    pub cost: CapitalCost,
}

impl Default for StorageParams {
    fn default() -> Self {
        Self {
            cost: CapitalCost::new(1000.0, DEFAULT_LIFETIME, DEFAULT_WACC),
            existing_capacity: 1000.0,
            loss_rate: 0.02,
            initial_storage_level: None,
            crate_charge: 1.0 / 6.0,
            crate_discharge: 1.0 / 6.0,
            efficiency_charge: 1.0,
            efficiency_discharge: 0.8,
            balanced: true,
        }
    }
}

impl StorageParams {
    pub fn validate(&self) -> Result<(), String> {
        self.cost.validate()?;
        validate_non_negative("storage existing capacity", self.existing_capacity)?;
        if !(0.0..1.0).contains(&self.loss_rate) {
            return Err(format!(
                "Invalid storage loss rate: {}. Must be between 0 and 1",
                self.loss_rate
            ));
        }
        if let Some(level) = self.initial_storage_level {
            if !(0.0..=1.0).contains(&level) {
                return Err(format!(
                    "Invalid initial storage level: {}. Must be between 0 and 1",
                    level
                ));
            }
        }
        validate_non_negative("storage charge c-rate", self.crate_charge)?;
        validate_non_negative("storage discharge c-rate", self.crate_discharge)?;
        validate_efficiency("storage charge efficiency", self.efficiency_charge)?;
        validate_efficiency("storage discharge efficiency", self.efficiency_discharge)
    }
}
