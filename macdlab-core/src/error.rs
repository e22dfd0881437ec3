//! Indicator failure kinds.
//!
//! Every kind is recoverable: the bar that produced it is skipped and the
//! next bar is the natural retry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum IndicatorError {
    #[error("insufficient history: need {required} bars, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("invalid input: value {value} at index {index} is not finite")]
    InvalidInput { index: usize, value: f64 },

    #[error("computation error: {0}")]
    ComputationError(String),
}

impl IndicatorError {
    /// Short label used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            IndicatorError::InsufficientHistory { .. } => "insufficient_history",
            IndicatorError::InvalidInput { .. } => "invalid_input",
            IndicatorError::ComputationError(_) => "computation_error",
        }
    }
}

/// Check that `values` holds at least `required` finite numbers.
///
/// Length is checked before content so a short window is always reported as
/// `InsufficientHistory`, whatever it contains.
pub fn validate_window(values: &[f64], required: usize) -> Result<(), IndicatorError> {
    if values.len() < required {
        return Err(IndicatorError::InsufficientHistory {
            required,
            available: values.len(),
        });
    }
    if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(IndicatorError::InvalidInput { index, value });
    }
    Ok(())
}
