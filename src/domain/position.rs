//! Open holdings and weighted-average cost accounting.
//!
//! A [`Position`] tracks how many units of one token an agent holds and what
//! was paid for them in aggregate. Cost basis is a single weighted-average
//! bucket: buys pour the full payment in, sells drain it proportionally to
//! the amount sold. Per-lot history is deliberately not kept.
//!
//! Realized PnL comes out of [`record_sell`](Position::record_sell);
//! unrealized PnL is always computed fresh against a live marginal price and
//! never persisted, so it cannot drift from the curve.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::ids::{AgentId, TokenAddress};
use crate::domain::money::{Lamports, Price, SignedLamports, TokenAmount};

/// Result of applying a sell to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellOutcome {
    /// Sale proceeds minus the sold share of the cost basis.
    pub realized_pnl: SignedLamports,
    /// The share of the cost basis consumed by this sell.
    pub sold_cost_basis: Lamports,
    /// True when the sell emptied the position; the row must be deleted,
    /// zero-amount positions are never stored.
    pub closes_position: bool,
}

/// An agent's open holding in one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    agent_id: AgentId,
    token_address: TokenAddress,
    amount: TokenAmount,
    cost_basis: Lamports,
    opened_at: DateTime<Utc>,
    last_trade_at: DateTime<Utc>,
}

impl Position {
    /// Open a position with its first buy.
    #[must_use]
    pub fn open(
        agent_id: AgentId,
        token_address: TokenAddress,
        amount: TokenAmount,
        paid: Lamports,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            agent_id,
            token_address,
            amount,
            cost_basis: paid,
            opened_at: at,
            last_trade_at: at,
        }
    }

    /// Rehydrate a persisted position.
    #[must_use]
    pub fn from_parts(
        agent_id: AgentId,
        token_address: TokenAddress,
        amount: TokenAmount,
        cost_basis: Lamports,
        opened_at: DateTime<Utc>,
        last_trade_at: DateTime<Utc>,
    ) -> Self {
        Self {
            agent_id,
            token_address,
            amount,
            cost_basis,
            opened_at,
            last_trade_at,
        }
    }

    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    #[must_use]
    pub fn token_address(&self) -> &TokenAddress {
        &self.token_address
    }

    #[must_use]
    pub const fn amount(&self) -> TokenAmount {
        self.amount
    }

    #[must_use]
    pub const fn cost_basis(&self) -> Lamports {
        self.cost_basis
    }

    #[must_use]
    pub const fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    #[must_use]
    pub const fn last_trade_at(&self) -> DateTime<Utc> {
        self.last_trade_at
    }

    /// Average lamports paid per held unit, `None` on an empty position.
    #[must_use]
    pub fn avg_buy_price(&self) -> Option<Price> {
        if self.amount.is_zero() {
            None
        } else {
            Some(self.cost_basis.to_decimal() / self.amount.to_decimal())
        }
    }

    /// Fold a buy in: the amount grows, the basis absorbs the full payment.
    ///
    /// # Errors
    /// Fails on amount or basis overflow; state is untouched on error.
    pub fn record_buy(
        &mut self,
        tokens: TokenAmount,
        paid: Lamports,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let amount = self.amount.checked_add(tokens)?;
        let cost_basis = self.cost_basis.checked_add(paid)?;
        self.amount = amount;
        self.cost_basis = cost_basis;
        self.last_trade_at = at;
        Ok(())
    }

    /// Apply a sell: drain the holding proportionally and realize PnL.
    ///
    /// The sold share of the basis is `cost_basis * tokens / amount`, floored
    /// in 128-bit arithmetic. Selling the whole holding makes the ratio
    /// exactly one, so a full close always zeroes the basis.
    ///
    /// # Errors
    /// Rejects zero amounts and sells beyond the held amount.
    pub fn record_sell(
        &mut self,
        tokens: TokenAmount,
        sol_out: Lamports,
        at: DateTime<Utc>,
    ) -> Result<SellOutcome, DomainError> {
        if tokens.is_zero() {
            return Err(DomainError::ZeroAmount);
        }
        if tokens > self.amount {
            return Err(DomainError::SellExceedsHolding {
                requested: tokens,
                held: self.amount,
            });
        }

        let scaled = u128::from(self.cost_basis.get()) * u128::from(tokens.get())
            / u128::from(self.amount.get());
        let sold_cost_basis =
            Lamports::new(
                u64::try_from(scaled).map_err(|_| DomainError::NumericOverflow {
                    context: "sold cost basis",
                })?,
            );

        let realized_pnl = sol_out.signed_diff(sold_cost_basis)?;
        self.amount = self.amount.checked_sub(tokens)?;
        self.cost_basis = self.cost_basis.checked_sub(sold_cost_basis)?;
        self.last_trade_at = at;

        Ok(SellOutcome {
            realized_pnl,
            sold_cost_basis,
            closes_position: self.amount.is_zero(),
        })
    }

    /// Mark-to-market PnL at the given marginal price.
    ///
    /// # Errors
    /// Fails when the market value leaves the representable range.
    pub fn unrealized_pnl(&self, marginal_price: Price) -> Result<SignedLamports, DomainError> {
        let marked = self
            .amount
            .to_decimal()
            .checked_mul(marginal_price)
            .ok_or(DomainError::NumericOverflow {
                context: "mark to market",
            })?;
        let market_value = Lamports::from_decimal_floor(marked)?;
        market_value.signed_diff(self.cost_basis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_position(amount: u64, cost: u64) -> Position {
        Position::open(
            AgentId::new("agent-1"),
            TokenAddress::new("tok-a"),
            TokenAmount::new(amount),
            Lamports::new(cost),
            Utc::now(),
        )
    }

    #[test]
    fn open_sets_basis_to_first_payment() {
        let position = open_position(10, 1_000);
        assert_eq!(position.amount(), TokenAmount::new(10));
        assert_eq!(position.cost_basis(), Lamports::new(1_000));
        assert_eq!(position.avg_buy_price(), Some(dec!(100)));
    }

    #[test]
    fn record_buy_weights_the_average() {
        let mut position = open_position(10, 1_000);
        position
            .record_buy(TokenAmount::new(30), Lamports::new(6_000), Utc::now())
            .unwrap();

        // (10*100 + 30*200) / 40 = 175
        assert_eq!(position.amount(), TokenAmount::new(40));
        assert_eq!(position.cost_basis(), Lamports::new(7_000));
        assert_eq!(position.avg_buy_price(), Some(dec!(175)));
    }

    #[test]
    fn record_sell_drains_basis_proportionally() {
        let mut position = open_position(40, 7_000);
        let outcome = position
            .record_sell(TokenAmount::new(10), Lamports::new(2_500), Utc::now())
            .unwrap();

        // sold share of basis: 7000 * 10 / 40 = 1750
        assert_eq!(outcome.sold_cost_basis, Lamports::new(1_750));
        assert_eq!(outcome.realized_pnl, SignedLamports::new(750));
        assert!(!outcome.closes_position);
        assert_eq!(position.amount(), TokenAmount::new(30));
        assert_eq!(position.cost_basis(), Lamports::new(5_250));
        // the average survives a partial sell
        assert_eq!(position.avg_buy_price(), Some(dec!(175)));
    }

    #[test]
    fn record_sell_can_realize_a_loss() {
        let mut position = open_position(10, 1_000);
        let outcome = position
            .record_sell(TokenAmount::new(5), Lamports::new(300), Utc::now())
            .unwrap();

        assert_eq!(outcome.realized_pnl, SignedLamports::new(-200));
        assert!(outcome.realized_pnl.is_loss());
    }

    #[test]
    fn full_close_zeroes_the_basis_exactly() {
        let mut position = open_position(7, 999);
        let outcome = position
            .record_sell(TokenAmount::new(7), Lamports::new(1_200), Utc::now())
            .unwrap();

        assert_eq!(outcome.sold_cost_basis, Lamports::new(999));
        assert_eq!(outcome.realized_pnl, SignedLamports::new(201));
        assert!(outcome.closes_position);
        assert_eq!(position.amount(), TokenAmount::ZERO);
        assert_eq!(position.cost_basis(), Lamports::ZERO);
        assert_eq!(position.avg_buy_price(), None);
    }

    #[test]
    fn record_sell_rejects_overdraw() {
        let mut position = open_position(5, 500);
        assert!(matches!(
            position.record_sell(TokenAmount::new(6), Lamports::new(600), Utc::now()),
            Err(DomainError::SellExceedsHolding { .. })
        ));
        // rejected sell leaves the position untouched
        assert_eq!(position.amount(), TokenAmount::new(5));
        assert_eq!(position.cost_basis(), Lamports::new(500));
    }

    #[test]
    fn record_sell_rejects_zero_amount() {
        let mut position = open_position(5, 500);
        assert!(matches!(
            position.record_sell(TokenAmount::ZERO, Lamports::ZERO, Utc::now()),
            Err(DomainError::ZeroAmount)
        ));
    }

    #[test]
    fn unrealized_pnl_marks_to_the_given_price() {
        let position = open_position(10, 1_000);

        let up = position.unrealized_pnl(dec!(150)).unwrap();
        assert_eq!(up, SignedLamports::new(500));

        let down = position.unrealized_pnl(dec!(60)).unwrap();
        assert_eq!(down, SignedLamports::new(-400));
    }

    #[test]
    fn uneven_proportional_basis_floors() {
        let mut position = open_position(3, 100);
        let outcome = position
            .record_sell(TokenAmount::new(1), Lamports::new(40), Utc::now())
            .unwrap();

        // 100 * 1 / 3 floors to 33
        assert_eq!(outcome.sold_cost_basis, Lamports::new(33));
        assert_eq!(position.cost_basis(), Lamports::new(67));

        // the remainder still closes out exactly
        let rest = position
            .record_sell(TokenAmount::new(2), Lamports::new(80), Utc::now())
            .unwrap();
        assert_eq!(rest.sold_cost_basis, Lamports::new(67));
        assert!(rest.closes_position);
        assert_eq!(position.cost_basis(), Lamports::ZERO);
    }
}
