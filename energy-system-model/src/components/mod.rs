pub mod demand;
pub mod diesel;
pub mod genset;
pub mod photovoltaic;
pub mod storage;

/// Checks that a conversion efficiency lies in (0, 1]
pub(crate) fn validate_efficiency(name: &str, value: f64) -> Result<(), String> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(format!(
            "Invalid {}: {}. Must be greater than 0 and at most 1",
            name, value
        ))
    }
}

/// Checks that a quantity is finite and non-negative
pub(crate) fn validate_non_negative(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("Invalid {}: {}. Must be non-negative", name, value))
    }
}
