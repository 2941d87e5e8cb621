//! Publisher port for settlement events.
//!
//! This module defines the trait for broadcasting engine events such as
//! settled trades and token launches to downstream consumers (feeds,
//! dashboards, commentary bots).
//!
//! Payloads are a closed set of typed variants; consumers match on the enum
//! instead of probing loosely shaped metadata.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::ids::{AgentId, TokenAddress, TradeId};
use crate::domain::money::{Lamports, SignedLamports, TokenAmount};
use crate::domain::token::TokenCurve;
use crate::domain::trade::Trade;

/// Events the engine emits after state has committed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineEvent {
    /// A buy settled.
    BuyExecuted(BuyEvent),
    /// A sell settled.
    SellExecuted(SellEvent),
    /// A token launched with a fresh curve.
    TokenCreated(TokenCreatedEvent),
}

/// Settled buy payload.
#[derive(Debug, Clone, Serialize)]
pub struct BuyEvent {
    /// Identifier of the settled trade.
    pub trade_id: TradeId,
    /// Agent that bought.
    pub agent_id: AgentId,
    /// Token bought into.
    pub token_address: TokenAddress,
    /// Lamports paid.
    pub sol_amount: Lamports,
    /// Token units received.
    pub token_amount: TokenAmount,
    /// Average lamports per unit actually paid.
    pub execution_price: Decimal,
}

impl From<&Trade> for BuyEvent {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.id,
            agent_id: trade.agent_id.clone(),
            token_address: trade.token_address.clone(),
            sol_amount: trade.sol_amount,
            token_amount: trade.token_amount,
            execution_price: trade.execution_price,
        }
    }
}

/// Settled sell payload.
#[derive(Debug, Clone, Serialize)]
pub struct SellEvent {
    /// Identifier of the settled trade.
    pub trade_id: TradeId,
    /// Agent that sold.
    pub agent_id: AgentId,
    /// Token sold out of.
    pub token_address: TokenAddress,
    /// Lamports received.
    pub sol_amount: Lamports,
    /// Token units sold.
    pub token_amount: TokenAmount,
    /// Average lamports per unit actually received.
    pub execution_price: Decimal,
    /// Proceeds minus the sold share of the cost basis.
    pub realized_pnl: SignedLamports,
}

impl SellEvent {
    /// Build the payload for a settled sell.
    #[must_use]
    pub fn from_trade(trade: &Trade, realized_pnl: SignedLamports) -> Self {
        Self {
            trade_id: trade.id,
            agent_id: trade.agent_id.clone(),
            token_address: trade.token_address.clone(),
            sol_amount: trade.sol_amount,
            token_amount: trade.token_amount,
            execution_price: trade.execution_price,
            realized_pnl,
        }
    }
}

/// Token launch payload.
#[derive(Debug, Clone, Serialize)]
pub struct TokenCreatedEvent {
    /// Address of the launched token.
    pub token_address: TokenAddress,
    /// Marginal price at zero supply.
    pub base_price: Decimal,
    /// Price increase per token unit minted.
    pub slope: Decimal,
}

impl From<&TokenCurve> for TokenCreatedEvent {
    fn from(token: &TokenCurve) -> Self {
        Self {
            token_address: token.address().clone(),
            base_price: token.params().base_price(),
            slope: token.params().slope(),
        }
    }
}

/// Trait for event publishers.
///
/// Implement this trait to receive events from the engine.
/// Publishing is fire-and-forget: the trade has already committed by the
/// time an event goes out, and a failing publisher must never affect it.
///
/// # Implementation Notes
///
/// - Implementations must be thread-safe (`Send + Sync`)
/// - The `publish` method should not block or perform slow I/O synchronously
/// - Consider spawning async tasks for slow operations
pub trait EventPublisher: Send + Sync {
    /// Handle an event.
    ///
    /// This method should return quickly. For slow operations (e.g., pushing
    /// to an external feed), implementations should spawn an async task.
    fn publish(&self, event: EngineEvent);
}

/// Registry of publishers (composite pattern).
///
/// Broadcasts events to all registered publishers.
pub struct PublisherRegistry {
    publishers: Vec<Box<dyn EventPublisher>>,
}

impl PublisherRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { publishers: vec![] }
    }

    /// Register a publisher.
    pub fn register(&mut self, publisher: Box<dyn EventPublisher>) {
        self.publishers.push(publisher);
    }

    /// Publish an event to all registered publishers.
    pub fn publish_all(&self, event: EngineEvent) {
        for publisher in &self.publishers {
            publisher.publish(event.clone());
        }
    }

    /// Number of registered publishers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    /// Check if registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

impl Default for PublisherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A no-op publisher for testing or when events are disabled.
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: EngineEvent) {}
}

/// A logging publisher that emits events via tracing.
pub struct LogPublisher;

impl EventPublisher for LogPublisher {
    fn publish(&self, event: EngineEvent) {
        use tracing::info;
        match event {
            EngineEvent::BuyExecuted(e) => {
                info!(
                    trade_id = %e.trade_id,
                    agent_id = %e.agent_id,
                    token = %e.token_address,
                    sol = %e.sol_amount,
                    tokens = %e.token_amount,
                    price = %e.execution_price,
                    "Buy executed"
                );
            }
            EngineEvent::SellExecuted(e) => {
                info!(
                    trade_id = %e.trade_id,
                    agent_id = %e.agent_id,
                    token = %e.token_address,
                    sol = %e.sol_amount,
                    tokens = %e.token_amount,
                    price = %e.execution_price,
                    realized_pnl = %e.realized_pnl,
                    "Sell executed"
                );
            }
            EngineEvent::TokenCreated(e) => {
                info!(
                    token = %e.token_address,
                    base_price = %e.base_price,
                    slope = %e.slope,
                    "Token created"
                );
            }
        }
    }
}
