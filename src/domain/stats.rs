//! Portfolio statistics types.
//!
//! DTOs for realized/unrealized PnL reporting.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::error::DomainError;
use crate::domain::money::SignedLamports;

/// Fold of an agent's sell history: realized PnL plus win/loss counts.
///
/// A sell with positive realized PnL counts as a win, a negative one as a
/// loss; breakeven sells count in neither column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RealizedPnlSummary {
    pub total_realized_pnl: SignedLamports,
    pub winning_trades: i64,
    pub losing_trades: i64,
}

impl RealizedPnlSummary {
    /// Win rate over decided sells as a percentage, `None` when no sell has
    /// decided either way yet.
    #[must_use]
    pub fn win_rate(&self) -> Option<Decimal> {
        let decided = self.winning_trades + self.losing_trades;
        if decided == 0 {
            None
        } else {
            Some(Decimal::from(self.winning_trades) / Decimal::from(decided) * Decimal::ONE_HUNDRED)
        }
    }

    /// Fold one sell's realized PnL into the summary.
    ///
    /// # Errors
    /// Fails when the running total overflows.
    pub fn record(&mut self, realized_pnl: SignedLamports) -> Result<(), DomainError> {
        self.total_realized_pnl = self.total_realized_pnl.checked_add(realized_pnl)?;
        if realized_pnl.is_gain() {
            self.winning_trades += 1;
        } else if realized_pnl.is_loss() {
            self.losing_trades += 1;
        }
        Ok(())
    }
}

/// An agent's full PnL picture at one instant.
///
/// Unrealized PnL is marked against live curve prices at the moment of the
/// call; it is never stored anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PnlBreakdown {
    pub total_realized_pnl: SignedLamports,
    pub total_unrealized_pnl: SignedLamports,
    pub winning_trades: i64,
    pub losing_trades: i64,
    /// Percentage of decided sells that won; zero before any sell decides.
    pub win_rate: Decimal,
}

impl PnlBreakdown {
    /// Combine the realized fold with freshly marked unrealized PnL.
    #[must_use]
    pub fn from_parts(summary: RealizedPnlSummary, total_unrealized_pnl: SignedLamports) -> Self {
        Self {
            total_realized_pnl: summary.total_realized_pnl,
            total_unrealized_pnl,
            winning_trades: summary.winning_trades,
            losing_trades: summary.losing_trades,
            win_rate: summary.win_rate().unwrap_or(Decimal::ZERO),
        }
    }
}
