// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for pricefit operations
#[derive(Error, Debug, Diagnostic)]
pub enum CoreError {
    /// A CPU quantity could not be parsed
    #[error("Invalid CPU quantity '{value}': {reason}")]
    #[diagnostic(
        code(pricefit::invalid_quantity),
        help("CPU quantities are whole or fractional cores (\"2\", \"0.5\") or milli-cores (\"500m\")")
    )]
    InvalidQuantity {
        #[allow(unused)]
        value: String,
        #[allow(unused)]
        reason: String,
    },

    /// A cost annotation could not be parsed
    #[error("Invalid cost '{value}': {reason}")]
    #[diagnostic(
        code(pricefit::invalid_cost),
        help("Cost annotations must be non-negative decimals such as \"0.10\". Re-run `pricefit annotate` to reset them")
    )]
    InvalidCost {
        #[allow(unused)]
        value: String,
        #[allow(unused)]
        reason: String,
    },
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an InvalidQuantity error
    pub fn invalid_quantity(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidCost error
    pub fn invalid_cost(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCost {
            value: value.into(),
            reason: reason.into(),
        }
    }
}
