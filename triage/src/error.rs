//! Triage error taxonomy with failure classification.
//!
//! Every failure the triage core can surface is represented here. Callers
//! query `category()` / `is_retryable()` / `code()` instead of matching on
//! message text.
//!
//! ## Failure categories
//!
//! | Category     | Examples                                   | Retryable |
//! |--------------|--------------------------------------------|-----------|
//! | Precondition | no user id and no guest session            | no        |
//! | Validation   | missing quantity, oversized position       | no        |
//! | Store        | store rejected or failed a mutation        | I/O only  |
//! | Backend      | generative-language backend errored        | yes       |
//!
//! No category is retried inside the core. `retryable` only tells the caller
//! whether offering a retry affordance makes sense.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendError;
use crate::extractor::Action;
use crate::portfolio::StoreError;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Missing authentication/session context. Surfaced immediately.
    Precondition,
    /// The command is incomplete or refers to state that does not exist.
    Validation,
    /// The portfolio store failed or rejected a read/mutation.
    Store,
    /// The generative-language backend failed.
    Backend,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precondition => write!(f, "precondition"),
            Self::Validation => write!(f, "validation"),
            Self::Store => write!(f, "store"),
            Self::Backend => write!(f, "backend"),
        }
    }
}

/// Machine-distinguishable failure reason carried in result envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AuthenticationRequired,
    MissingQuantity,
    InvalidQuantity,
    AmountOutOfRange,
    MissingUpdateValue,
    IncompleteOption,
    IncompleteBond,
    MissingSymbol,
    PortfolioNotFound,
    HoldingNotFound,
    StoreFailure,
    BackendUnavailable,
}

impl ErrorCode {
    pub fn category(self) -> FailureCategory {
        match self {
            Self::AuthenticationRequired => FailureCategory::Precondition,
            Self::MissingQuantity
            | Self::InvalidQuantity
            | Self::AmountOutOfRange
            | Self::MissingUpdateValue
            | Self::IncompleteOption
            | Self::IncompleteBond
            | Self::MissingSymbol
            | Self::PortfolioNotFound
            | Self::HoldingNotFound => FailureCategory::Validation,
            Self::StoreFailure => FailureCategory::Store,
            Self::BackendUnavailable => FailureCategory::Backend,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AuthenticationRequired => "authentication_required",
            Self::MissingQuantity => "missing_quantity",
            Self::InvalidQuantity => "invalid_quantity",
            Self::AmountOutOfRange => "amount_out_of_range",
            Self::MissingUpdateValue => "missing_update_value",
            Self::IncompleteOption => "incomplete_option",
            Self::IncompleteBond => "incomplete_bond",
            Self::MissingSymbol => "missing_symbol",
            Self::PortfolioNotFound => "portfolio_not_found",
            Self::HoldingNotFound => "holding_not_found",
            Self::StoreFailure => "store_failure",
            Self::BackendUnavailable => "backend_unavailable",
        };
        write!(f, "{s}")
    }
}

/// Failure while validating or applying a structured command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// Add/update needs a positive quantity and none was given.
    #[error("Please specify how many shares of {symbol} to {action}.")]
    MissingQuantity { action: Action, symbol: String },

    #[error("Quantity for {symbol} must be greater than zero.")]
    InvalidQuantity { symbol: String },

    /// The resulting position would be too large to record.
    #[error("The resulting position in {symbol} is too large to record.")]
    AmountOutOfRange { symbol: String },

    /// Update named neither a quantity nor a cost.
    #[error("Please specify the new quantity or average cost for {symbol}.")]
    MissingUpdateValue { symbol: String },

    #[error("Option position {symbol} is missing: {missing}.")]
    IncompleteOption { symbol: String, missing: String },

    #[error("Bond position {symbol} is missing: {missing}.")]
    IncompleteBond { symbol: String, missing: String },

    #[error("Please specify a ticker symbol.")]
    MissingSymbol,

    #[error("Authentication required: sign in or start a guest session.")]
    AuthenticationRequired,

    #[error("Portfolio '{name}' was not found.")]
    PortfolioNotFound { name: String },

    #[error("{symbol} was not found in {portfolio}.")]
    HoldingNotFound { symbol: String, portfolio: String },

    /// The store failed for a reason other than a missing holding.
    #[error("Portfolio store error: {0}")]
    Store(StoreError),
}

impl ExecutionError {
    /// Map a store failure, lifting "holding not found" into the validation
    /// category so callers see the same outcome whether the executor or the
    /// store detected it.
    pub fn from_store(err: StoreError, portfolio: &str) -> Self {
        match err {
            StoreError::HoldingNotFound(symbol) => Self::HoldingNotFound {
                symbol,
                portfolio: portfolio.to_string(),
            },
            StoreError::PortfolioNotFound(name) => Self::PortfolioNotFound { name },
            StoreError::AmountOutOfRange(symbol) => Self::AmountOutOfRange { symbol },
            other => Self::Store(other),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingQuantity { .. } => ErrorCode::MissingQuantity,
            Self::InvalidQuantity { .. } => ErrorCode::InvalidQuantity,
            Self::AmountOutOfRange { .. } => ErrorCode::AmountOutOfRange,
            Self::MissingUpdateValue { .. } => ErrorCode::MissingUpdateValue,
            Self::IncompleteOption { .. } => ErrorCode::IncompleteOption,
            Self::IncompleteBond { .. } => ErrorCode::IncompleteBond,
            Self::MissingSymbol => ErrorCode::MissingSymbol,
            Self::AuthenticationRequired => ErrorCode::AuthenticationRequired,
            Self::PortfolioNotFound { .. } => ErrorCode::PortfolioNotFound,
            Self::HoldingNotFound { .. } => ErrorCode::HoldingNotFound,
            Self::Store(_) => ErrorCode::StoreFailure,
        }
    }

    pub fn category(&self) -> FailureCategory {
        self.code().category()
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

/// Failure of a whole triage call.
#[derive(Debug, Clone, Error)]
pub enum TriageError {
    #[error("Authentication required: sign in or start a guest session.")]
    AuthenticationRequired,

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Assistant backend unavailable: {0}")]
    Backend(#[from] BackendError),
}

impl TriageError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthenticationRequired => ErrorCode::AuthenticationRequired,
            Self::Execution(e) => e.code(),
            Self::Backend(_) => ErrorCode::BackendUnavailable,
        }
    }

    pub fn category(&self) -> FailureCategory {
        self.code().category()
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AuthenticationRequired => false,
            Self::Execution(e) => e.is_retryable(),
            Self::Backend(_) => true,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

/// Serializable error shape returned in result envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub retryable: bool,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
