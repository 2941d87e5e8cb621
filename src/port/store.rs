//! Persistence port for curve, balance, position, and trade state.
//!
//! [`EngineStore`] is the read side plus seeding writes. All trade-path
//! mutation goes through [`EngineStore::run_atomic`], which hands the caller
//! a [`TradeUnit`]: every read and write made through the unit belongs to one
//! atomic scope that commits or rolls back as a whole, serialized against
//! other units for the same token.

use std::future::Future;

use crate::domain::ids::{AgentId, TokenAddress};
use crate::domain::money::Lamports;
use crate::domain::position::Position;
use crate::domain::stats::RealizedPnlSummary;
use crate::domain::token::TokenCurve;
use crate::domain::trade::Trade;
use crate::error::TradeError;

/// The unit-of-work surface available inside an atomic scope.
///
/// Reads reflect the serialization point of the enclosing unit, not some
/// earlier snapshot; decisions made on them are safe to write back. Nothing
/// done through the unit is visible outside until the unit commits.
pub trait TradeUnit {
    /// Curve state for a token.
    fn token(&mut self, address: &TokenAddress) -> Result<Option<TokenCurve>, TradeError>;

    /// Write back mutated curve state.
    fn update_token(&mut self, token: &TokenCurve) -> Result<(), TradeError>;

    /// An agent's spendable balance.
    fn agent_balance(&mut self, agent_id: &AgentId) -> Result<Option<Lamports>, TradeError>;

    /// Write back an agent's balance.
    fn update_agent_balance(
        &mut self,
        agent_id: &AgentId,
        balance: Lamports,
    ) -> Result<(), TradeError>;

    /// The agent's position in a token, if open.
    fn position(
        &mut self,
        agent_id: &AgentId,
        token_address: &TokenAddress,
    ) -> Result<Option<Position>, TradeError>;

    /// Insert or replace a position.
    fn upsert_position(&mut self, position: &Position) -> Result<(), TradeError>;

    /// Remove a fully closed position.
    fn delete_position(
        &mut self,
        agent_id: &AgentId,
        token_address: &TokenAddress,
    ) -> Result<(), TradeError>;

    /// Append a trade to the execution log.
    fn insert_trade(&mut self, trade: &Trade) -> Result<(), TradeError>;
}

/// Storage port for the settlement engine.
///
/// # Implementation Notes
///
/// - Implementations must be thread-safe (`Send + Sync`)
/// - Units for the same token must be serializable: concurrent
///   [`run_atomic`](Self::run_atomic) calls either queue or fail with
///   [`TradeError::ConcurrencyConflict`], never interleave
/// - Units for different tokens should be free to proceed in parallel
pub trait EngineStore: Send + Sync {
    /// Curve state for a token.
    fn token(
        &self,
        address: &TokenAddress,
    ) -> impl Future<Output = Result<Option<TokenCurve>, TradeError>> + Send;

    /// An agent's spendable balance.
    fn agent_balance(
        &self,
        agent_id: &AgentId,
    ) -> impl Future<Output = Result<Option<Lamports>, TradeError>> + Send;

    /// The agent's position in a token, if open.
    fn position(
        &self,
        agent_id: &AgentId,
        token_address: &TokenAddress,
    ) -> impl Future<Output = Result<Option<Position>, TradeError>> + Send;

    /// All of an agent's open positions.
    fn positions(
        &self,
        agent_id: &AgentId,
    ) -> impl Future<Output = Result<Vec<Position>, TradeError>> + Send;

    /// Open positions joined with the curve state needed to mark them.
    fn positions_with_curves(
        &self,
        agent_id: &AgentId,
    ) -> impl Future<Output = Result<Vec<(Position, TokenCurve)>, TradeError>> + Send;

    /// An agent's trades, newest first.
    fn trades_for_agent(
        &self,
        agent_id: &AgentId,
    ) -> impl Future<Output = Result<Vec<Trade>, TradeError>> + Send;

    /// All trades against a token, newest first.
    fn trades_for_token(
        &self,
        address: &TokenAddress,
    ) -> impl Future<Output = Result<Vec<Trade>, TradeError>> + Send;

    /// Fold of the agent's sells: realized PnL total plus win/loss counts.
    fn realized_pnl_summary(
        &self,
        agent_id: &AgentId,
    ) -> impl Future<Output = Result<RealizedPnlSummary, TradeError>> + Send;

    /// Seed an agent with a starting balance.
    fn insert_agent(
        &self,
        agent_id: &AgentId,
        balance: Lamports,
    ) -> impl Future<Output = Result<(), TradeError>> + Send;

    /// Record a freshly launched token.
    fn insert_token(
        &self,
        token: &TokenCurve,
    ) -> impl Future<Output = Result<(), TradeError>> + Send;

    /// Run `work` inside one atomic, per-token-serialized scope.
    ///
    /// The work function is given a [`TradeUnit`] whose reads are
    /// authoritative for the scope. An `Ok` return commits every write made
    /// through the unit; an `Err` rolls all of them back and is returned
    /// unchanged. A scope that cannot be serialized within the store's
    /// bounded wait fails with [`TradeError::ConcurrencyConflict`].
    fn run_atomic<T, F>(
        &self,
        token_address: &TokenAddress,
        work: F,
    ) -> impl Future<Output = Result<T, TradeError>> + Send
    where
        T: Send,
        F: FnOnce(&mut dyn TradeUnit) -> Result<T, TradeError> + Send;
}
