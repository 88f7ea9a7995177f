use thiserror::Error;

use crate::core::GenericError;
use crate::types::{Date, Decimal};

/// Engine error taxonomy. See [`Error::class`] for the caller-visible
/// classification.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to parse the statement: {0}")]
    ParsingFailed(String),

    #[error("No {currency} exchange rate is available on or before {date}")]
    RateUnavailable {
        currency: String,
        date: Date,
    },

    #[error("Not enough open position to close {quantity} {symbol} on {date}")]
    InsufficientLot {
        symbol: String,
        date: Date,
        quantity: Decimal,
    },

    #[error("Unsupported {action} corporate action for {symbol} on {date}")]
    UnsupportedCorporateAction {
        symbol: String,
        date: Date,
        action: String,
    },

    /// The user has no computed result yet. A legitimate empty state, not a failure.
    #[error("No results are available")]
    NotFound,

    #[error("Storage error: {0}")]
    Storage(#[source] GenericError),

    #[error("Internal error: {0}")]
    Internal(#[source] GenericError),
}

/// What the caller should tell the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The uploaded data is invalid or inconsistent.
    InvalidInput,
    /// Missing external data or a backing service. Worth a retry.
    Unavailable,
    /// A legitimate empty state.
    Empty,
    /// We have a bug.
    Internal,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::ParsingFailed(_) |
            Error::InsufficientLot {..} |
            Error::UnsupportedCorporateAction {..} => ErrorClass::InvalidInput,
            Error::RateUnavailable {..} | Error::Storage(_) => ErrorClass::Unavailable,
            Error::NotFound => ErrorClass::Empty,
            Error::Internal(_) => ErrorClass::Internal,
        }
    }
}

impl From<GenericError> for Error {
    fn from(err: GenericError) -> Error {
        Error::Internal(err)
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Error {
        Error::Storage(Box::new(err))
    }
}
