//! Monetary and quantity types for curve settlement.
//!
//! Lamport amounts and token amounts are separate integer newtypes so the two
//! legs of a trade can never be swapped silently. Prices stay [`Decimal`] for
//! precision; converting a decimal quantity back into an integer unit always
//! floors, which is what keeps the curve reserve solvent.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Price in lamports per token unit.
pub type Price = Decimal;

/// Number of lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// A non-negative amount of lamports, the smallest SOL unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Lamports(u64);

impl Lamports {
    pub const ZERO: Self = Self(0);

    /// Create from a raw lamport count.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw lamport count.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Decimal view for price math.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::from(self.0)
    }

    /// Floor a decimal lamport quantity to whole lamports.
    ///
    /// # Errors
    /// Fails on negative or unrepresentably large values.
    pub fn from_decimal_floor(value: Decimal) -> Result<Self, DomainError> {
        value
            .floor()
            .to_u64()
            .map(Self)
            .ok_or(DomainError::NumericOverflow {
                context: "lamports from decimal",
            })
    }

    /// Convert a whole-SOL amount to lamports, flooring fractional dust.
    ///
    /// # Errors
    /// Fails on negative or unrepresentably large amounts.
    pub fn from_sol(sol: Decimal) -> Result<Self, DomainError> {
        let lamports = sol
            .checked_mul(Decimal::from(LAMPORTS_PER_SOL))
            .ok_or(DomainError::NumericOverflow {
                context: "sol to lamports",
            })?;
        Self::from_decimal_floor(lamports)
    }

    /// This amount expressed in whole SOL.
    #[must_use]
    pub fn to_sol(self) -> Decimal {
        self.to_decimal() / Decimal::from(LAMPORTS_PER_SOL)
    }

    /// Checked addition.
    ///
    /// # Errors
    /// Fails when the sum overflows.
    pub fn checked_add(self, rhs: Self) -> Result<Self, DomainError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(DomainError::NumericOverflow {
                context: "lamport addition",
            })
    }

    /// Checked subtraction.
    ///
    /// # Errors
    /// Fails when `rhs` exceeds `self`.
    pub fn checked_sub(self, rhs: Self) -> Result<Self, DomainError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(DomainError::NumericOverflow {
                context: "lamport subtraction",
            })
    }

    /// Signed difference `self - other`, for PnL where either side may be
    /// the larger one.
    ///
    /// # Errors
    /// Fails when the difference does not fit a signed 64-bit value.
    pub fn signed_diff(self, other: Self) -> Result<SignedLamports, DomainError> {
        let diff = i128::from(self.0) - i128::from(other.0);
        i64::try_from(diff)
            .map(SignedLamports)
            .map_err(|_| DomainError::NumericOverflow {
                context: "lamport difference",
            })
    }
}

impl fmt::Display for Lamports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed lamport delta. Realized and unrealized PnL live here; plain
/// balances and trade legs never do.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SignedLamports(i64);

impl SignedLamports {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// True for a strictly positive delta.
    #[must_use]
    pub const fn is_gain(self) -> bool {
        self.0 > 0
    }

    /// True for a strictly negative delta.
    #[must_use]
    pub const fn is_loss(self) -> bool {
        self.0 < 0
    }

    /// Checked addition.
    ///
    /// # Errors
    /// Fails when the sum overflows.
    pub fn checked_add(self, rhs: Self) -> Result<Self, DomainError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(DomainError::NumericOverflow {
                context: "signed lamport addition",
            })
    }
}

impl fmt::Display for SignedLamports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative amount of token units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TokenAmount(u64);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    /// Create from a raw unit count.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw unit count.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Decimal view for price math.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::from(self.0)
    }

    /// Floor a decimal token quantity to whole units.
    ///
    /// # Errors
    /// Fails on negative or unrepresentably large values.
    pub fn from_decimal_floor(value: Decimal) -> Result<Self, DomainError> {
        value
            .floor()
            .to_u64()
            .map(Self)
            .ok_or(DomainError::NumericOverflow {
                context: "token amount from decimal",
            })
    }

    /// Checked addition.
    ///
    /// # Errors
    /// Fails when the sum overflows.
    pub fn checked_add(self, rhs: Self) -> Result<Self, DomainError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(DomainError::NumericOverflow {
                context: "token amount addition",
            })
    }

    /// Checked subtraction.
    ///
    /// # Errors
    /// Fails when `rhs` exceeds `self`.
    pub fn checked_sub(self, rhs: Self) -> Result<Self, DomainError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(DomainError::NumericOverflow {
                context: "token amount subtraction",
            })
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
