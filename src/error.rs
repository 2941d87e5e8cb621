use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::ids::{AgentId, TokenAddress};
use crate::domain::money::{Lamports, TokenAmount};

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Failures a trade request can surface, one variant per contract class.
///
/// Each variant carries the figures the caller needs; nothing has to be
/// re-derived from message strings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradeError {
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    #[error("token not found: {address}")]
    TokenNotFound { address: TokenAddress },

    #[error("agent not found: {agent_id}")]
    AgentNotFound { agent_id: AgentId },

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Lamports,
        available: Lamports,
    },

    #[error("insufficient position: requested {requested}, held {held}")]
    InsufficientPosition {
        requested: TokenAmount,
        held: TokenAmount,
    },

    #[error("slippage too high: {actual}% > {max}%")]
    SlippageExceeded {
        actual: rust_decimal::Decimal,
        max: rust_decimal::Decimal,
    },

    #[error("concurrent trade in flight for token {token_address}")]
    ConcurrencyConflict { token_address: TokenAddress },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl TradeError {
    /// Whether the caller may safely resubmit the identical request.
    ///
    /// Only conflicts qualify; every other variant is a terminal verdict on
    /// the request as submitted.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

impl From<DomainError> for TradeError {
    fn from(err: DomainError) -> Self {
        Self::Validation {
            reason: err.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Trade(#[from] TradeError),
}

pub type Result<T> = std::result::Result<T, Error>;
