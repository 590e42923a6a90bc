// src/error.rs
use crate::types::OrderErrorKind;
use thiserror::Error;

/// Failure talking to the exchange, already classified for retry decisions.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExchangeError {
    /// Timeouts, connection failures, 5xx, rate limits. Safe to retry.
    #[error("transient exchange error: {0}")]
    Transient(String),

    /// The exchange refused the request (balance, filters, bad params).
    #[error("rejected by exchange (code {code}): {msg}")]
    Rejected { code: i64, msg: String },

    /// The request may or may not have executed. Needs a human.
    #[error("ambiguous order outcome: {0}")]
    Ambiguous(String),

    /// A response came back but could not be understood.
    #[error("malformed exchange response: {0}")]
    Decode(String),
}

impl ExchangeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExchangeError::Transient(_))
    }

    pub fn order_error_kind(&self) -> OrderErrorKind {
        match self {
            ExchangeError::Transient(_) => OrderErrorKind::Transient,
            ExchangeError::Rejected { .. } => OrderErrorKind::Rejected,
            // a 2xx we can't read may still have filled
            ExchangeError::Ambiguous(_) | ExchangeError::Decode(_) => OrderErrorKind::Ambiguous,
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            ExchangeError::Transient(e.to_string())
        } else if e.is_decode() || e.is_body() {
            ExchangeError::Decode(e.to_string())
        } else {
            ExchangeError::Transient(e.to_string())
        }
    }
}

/// Illegal use of the position state machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("cannot confirm entry: already long")]
    AlreadyLong,
    #[error("cannot confirm exit: no open position")]
    NotLong,
}
