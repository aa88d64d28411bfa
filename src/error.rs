// ⚠️ Core Errors - failures local to a single engine call
// Storage and I/O keep using anyhow; these are the errors a caller is expected to inspect.

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Valuation method name is not one of the recognized formulas
    #[error("Unknown valuation method: {0}")]
    InvalidMethod(String),

    /// A caller-supplied field is missing, non-numeric or out of range
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    /// DCF assumptions that would divide by zero or produce a negative terminal value
    #[error("Invalid DCF assumptions: terminal growth {terminal_growth} must be below discount rate {discount_rate}")]
    InvalidAssumptions {
        discount_rate: f64,
        terminal_growth: f64,
    },

    /// Workflow action name the dispatcher does not route
    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

impl CoreError {
    pub fn invalid_input(field: &str, reason: impl Into<String>) -> Self {
        CoreError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code, used by the HTTP layer
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidMethod(_) => "INVALID_METHOD",
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
            CoreError::InvalidAssumptions { .. } => "INVALID_ASSUMPTIONS",
            CoreError::UnknownAction(_) => "UNKNOWN_ACTION",
        }
    }
}
