//! Token curve state and the trade transitions that move it.
//!
//! A [`TokenCurve`] bundles the validated curve parameters with the
//! supply/reserve pair every settled trade mutates. Quoting is read-only;
//! applying a quote moves supply and reserve in lockstep so the solvency
//! relation between them survives every transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::curve::CurveParams;
use crate::domain::error::DomainError;
use crate::domain::ids::TokenAddress;
use crate::domain::money::{Lamports, Price, SignedLamports, TokenAmount};

/// A buy or sell priced against the curve at a specific supply.
///
/// `tokens` and `lamports` are the two legs of the trade; `execution_price`
/// is their ratio, the average price actually paid per unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    tokens: TokenAmount,
    lamports: Lamports,
    execution_price: Price,
    marginal_before: Price,
}

impl Quote {
    /// Token leg of the quoted trade.
    #[must_use]
    pub const fn tokens(&self) -> TokenAmount {
        self.tokens
    }

    /// Lamport leg of the quoted trade.
    #[must_use]
    pub const fn lamports(&self) -> Lamports {
        self.lamports
    }

    /// Average lamports per unit actually paid.
    #[must_use]
    pub const fn execution_price(&self) -> Price {
        self.execution_price
    }

    /// Marginal price at the supply the quote was taken against.
    #[must_use]
    pub const fn marginal_before(&self) -> Price {
        self.marginal_before
    }
}

/// Aggregate state of one launched token.
///
/// Created once at launch with zero supply and an empty reserve, then mutated
/// by every settled trade for the rest of its life. Fields are private; all
/// movement goes through [`apply_buy`](Self::apply_buy) and
/// [`apply_sell`](Self::apply_sell).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCurve {
    address: TokenAddress,
    params: CurveParams,
    total_supply: TokenAmount,
    reserve: Lamports,
    created_at: DateTime<Utc>,
}

impl TokenCurve {
    /// A freshly launched token: zero supply, empty reserve.
    #[must_use]
    pub fn launch(address: TokenAddress, params: CurveParams, created_at: DateTime<Utc>) -> Self {
        Self {
            address,
            params,
            total_supply: TokenAmount::ZERO,
            reserve: Lamports::ZERO,
            created_at,
        }
    }

    /// Rehydrate persisted curve state.
    #[must_use]
    pub fn from_parts(
        address: TokenAddress,
        params: CurveParams,
        total_supply: TokenAmount,
        reserve: Lamports,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            address,
            params,
            total_supply,
            reserve,
            created_at,
        }
    }

    #[must_use]
    pub fn address(&self) -> &TokenAddress {
        &self.address
    }

    #[must_use]
    pub const fn params(&self) -> CurveParams {
        self.params
    }

    #[must_use]
    pub const fn total_supply(&self) -> TokenAmount {
        self.total_supply
    }

    #[must_use]
    pub const fn reserve(&self) -> Lamports {
        self.reserve
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Marginal price at the current supply.
    ///
    /// # Errors
    /// Fails when the price leaves the representable range.
    pub fn spot_price(&self) -> Result<Price, DomainError> {
        self.params.marginal_price(self.total_supply)
    }

    /// Price a buy of `sol_in` lamports at the current supply.
    ///
    /// # Errors
    /// Propagates curve rejections (zero or dust payments).
    pub fn quote_buy(&self, sol_in: Lamports) -> Result<Quote, DomainError> {
        let marginal_before = self.spot_price()?;
        let tokens = self.params.tokens_out_for_sol(self.total_supply, sol_in)?;
        Ok(Quote {
            tokens,
            lamports: sol_in,
            execution_price: sol_in.to_decimal() / tokens.to_decimal(),
            marginal_before,
        })
    }

    /// Price a sell of `tokens_in` units at the current supply.
    ///
    /// # Errors
    /// Propagates curve rejections (zero amount, redemption beyond supply).
    pub fn quote_sell(&self, tokens_in: TokenAmount) -> Result<Quote, DomainError> {
        let marginal_before = self.spot_price()?;
        let lamports = self.params.sol_out_for_tokens(self.total_supply, tokens_in)?;
        Ok(Quote {
            tokens: tokens_in,
            lamports,
            execution_price: lamports.to_decimal() / tokens_in.to_decimal(),
            marginal_before,
        })
    }

    /// Apply a committed buy: mint the quoted tokens, bank the payment.
    ///
    /// # Errors
    /// Fails on supply or reserve overflow; state is untouched on error.
    pub fn apply_buy(&mut self, quote: &Quote) -> Result<(), DomainError> {
        let total_supply = self.total_supply.checked_add(quote.tokens)?;
        let reserve = self.reserve.checked_add(quote.lamports)?;
        self.total_supply = total_supply;
        self.reserve = reserve;
        Ok(())
    }

    /// Apply a committed sell: burn the quoted tokens, pay out of the reserve.
    ///
    /// # Errors
    /// Fails if the burn exceeds supply or the payout exceeds the reserve;
    /// state is untouched on error.
    pub fn apply_sell(&mut self, quote: &Quote) -> Result<(), DomainError> {
        let total_supply = self.total_supply.checked_sub(quote.tokens)?;
        let reserve = self.reserve.checked_sub(quote.lamports)?;
        self.total_supply = total_supply;
        self.reserve = reserve;
        Ok(())
    }

    /// Lamports held beyond what the pricing integral requires.
    ///
    /// Both directions floor in the reserve's favor, so the drift is never
    /// negative: a sell strands under one lamport, a buy strands the value
    /// of the fractional token its payment covered but did not mint.
    ///
    /// # Errors
    /// Fails only when the integral leaves the representable range.
    pub fn solvency_drift(&self) -> Result<SignedLamports, DomainError> {
        let required = self.params.reserve_for_supply(self.total_supply)?;
        self.reserve.signed_diff(required)
    }
}
