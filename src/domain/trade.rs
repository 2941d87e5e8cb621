//! Immutable trade records.
//!
//! Every settled buy and sell appends one [`Trade`]. Rows are never updated
//! or deleted afterwards; replaying an agent's trades through the position
//! accounting reproduces the stored position, which is what makes the log an
//! audit trail rather than a convenience.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{AgentId, TokenAddress, TradeId};
use crate::domain::money::{Lamports, Price, SignedLamports, TokenAmount};

/// Direction of a settled trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    /// Stable string form used in storage and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(format!("unknown trade direction: {other}")),
        }
    }
}

/// A settled trade.
///
/// `sol_amount` and `token_amount` are the two legs; `execution_price` is
/// their ratio at settlement time. `realized_pnl` is present on sells only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade identifier.
    pub id: TradeId,
    /// Agent that submitted the trade.
    pub agent_id: AgentId,
    /// Token the trade settled against.
    pub token_address: TokenAddress,
    /// Buy or sell.
    pub direction: TradeDirection,
    /// Lamport leg of the trade.
    pub sol_amount: Lamports,
    /// Token leg of the trade.
    pub token_amount: TokenAmount,
    /// Average lamports per unit actually paid.
    pub execution_price: Price,
    /// Proceeds minus sold cost basis; sells only.
    pub realized_pnl: Option<SignedLamports>,
    /// Free-text rationale supplied by the agent.
    pub reasoning: Option<String>,
    /// External-ledger reference recorded verbatim, never derived here.
    pub tx_signature: Option<String>,
    /// Settlement timestamp.
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    /// Create a trade record with a fresh ID and the fields every trade has.
    ///
    /// Optional fields start empty; see the `with_*` methods.
    #[must_use]
    pub fn new(
        agent_id: AgentId,
        token_address: TokenAddress,
        direction: TradeDirection,
        sol_amount: Lamports,
        token_amount: TokenAmount,
        execution_price: Price,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TradeId::generate(),
            agent_id,
            token_address,
            direction,
            sol_amount,
            token_amount,
            execution_price,
            realized_pnl: None,
            reasoning: None,
            tx_signature: None,
            executed_at,
        }
    }

    /// Attach the realized PnL of a sell.
    #[must_use]
    pub fn with_realized_pnl(mut self, realized_pnl: SignedLamports) -> Self {
        self.realized_pnl = Some(realized_pnl);
        self
    }

    /// Attach the agent's free-text rationale.
    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Attach an external-ledger reference.
    #[must_use]
    pub fn with_tx_signature(mut self, tx_signature: impl Into<String>) -> Self {
        self.tx_signature = Some(tx_signature.into());
        self
    }

    /// True for buys.
    #[must_use]
    pub const fn is_buy(&self) -> bool {
        matches!(self.direction, TradeDirection::Buy)
    }
}
