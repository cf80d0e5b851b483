// Billing
pub mod meters;
pub mod readings;

// Inventory
pub mod ledger;
pub mod recognition;

// Identity and uploads
pub mod blob_storage;
pub mod users;

use crate::errors::ServiceError;

/// Trims `value` and rejects it when nothing is left
pub(crate) fn require_text(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "{} must not be blank",
            field
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn require_finite(field: &str, value: f64) -> Result<f64, ServiceError> {
    if !value.is_finite() {
        return Err(ServiceError::ValidationError(format!(
            "{} must be a finite number",
            field
        )));
    }
    Ok(value)
}
