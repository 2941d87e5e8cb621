//! Domain validation errors for core domain types.
//!
//! This module defines errors that occur when domain invariants are violated.
//! These errors are returned by `try_new` constructors, the pure curve math,
//! and the position accounting transitions.

use thiserror::Error;

use crate::domain::money::{Lamports, TokenAmount};

/// Errors that occur when domain invariants are violated.
///
/// These errors are returned by validating constructors and by methods that
/// would otherwise move a quantity outside its legal range.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Base price must be strictly positive.
    #[error("base price must be positive, got {base_price}")]
    NonPositiveBasePrice {
        /// The invalid base price that was provided.
        base_price: rust_decimal::Decimal,
    },

    /// Slope may be flat but never negative.
    #[error("slope must not be negative, got {slope}")]
    NegativeSlope {
        /// The invalid slope that was provided.
        slope: rust_decimal::Decimal,
    },

    /// Trades must move a positive quantity.
    #[error("amount must be positive")]
    ZeroAmount,

    /// The payment is too small to mint a single token unit at the
    /// current price.
    #[error("payment of {sol_in} lamports buys less than one token unit")]
    DustPayment { sol_in: Lamports },

    /// A redemption cannot exceed the circulating supply.
    #[error("redemption of {requested} exceeds circulating supply {supply}")]
    RedemptionExceedsSupply {
        requested: TokenAmount,
        supply: TokenAmount,
    },

    /// A sell cannot exceed the held amount.
    #[error("sell of {requested} exceeds held amount {held}")]
    SellExceedsHolding {
        requested: TokenAmount,
        held: TokenAmount,
    },

    /// Arithmetic left the representable range.
    #[error("numeric overflow in {context}")]
    NumericOverflow { context: &'static str },
}
