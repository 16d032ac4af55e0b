use thiserror::Error;

use crate::RejectionReason;

#[derive(Debug, Error)]
pub enum Error {
    /// Sizing inputs out of range. A tick hitting this must not trade.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Cash, price or news could not be fetched. The tick is skipped.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Order rejected: {reason}")]
    OrderRejected { reason: RejectionReason },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn rejected(reason: RejectionReason) -> Self {
        Error::OrderRejected { reason }
    }

    /// Tag a failed fetch of `what` as `DataUnavailable`.
    pub fn into_unavailable(self, what: &str) -> Self {
        match self {
            Error::DataUnavailable(_) => self,
            other => Error::DataUnavailable(format!("{what}: {other}")),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
