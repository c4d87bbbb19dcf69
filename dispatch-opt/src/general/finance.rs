use energy_system_model::CapitalCost;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FinanceError {
    #[error("Cannot annualise over a lifetime of 0 years")]
    ZeroLifetime,
    #[error("Discount rate must be greater than -1, got {0}")]
    InvalidRate(f64),
}

/// Annualised equivalent of an upfront capital cost (capital recovery factor method):
///
/// epc = capex * wacc / (1 - (1 + wacc)^-n)
///
/// For a zero discount rate the limit `capex / n` is returned.
pub fn annuity(capex: f64, n: u32, wacc: f64) -> Result<f64, FinanceError> {
    if n == 0 {
        return Err(FinanceError::ZeroLifetime);
    }
    if wacc.is_nan() || wacc <= -1.0 {
        return Err(FinanceError::InvalidRate(wacc));
    }

    if wacc == 0.0 {
        return Ok(capex / n as f64);
    }

    let discount = (1.0 + wacc).powi(-(n as i32));
    Ok(capex * wacc / (1.0 - discount))
}

/// Equivalent periodical costs (epc) for a component's capital cost data
pub fn equivalent_periodical_costs(cost: &CapitalCost) -> Result<f64, FinanceError> {
    annuity(cost.capex, cost.lifetime, cost.wacc)
}
