//! In-memory engine store for tests and ephemeral runs.
//!
//! Atomicity comes from working on a scratch copy of the state: a unit's
//! writes land on the copy and replace the shared state only when the work
//! function returns `Ok`. One lock guards the whole state, so units for
//! different tokens serialize here even though the port allows them to
//! proceed in parallel.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::domain::ids::{AgentId, TokenAddress};
use crate::domain::money::Lamports;
use crate::domain::position::Position;
use crate::domain::stats::RealizedPnlSummary;
use crate::domain::token::TokenCurve;
use crate::domain::trade::Trade;
use crate::error::TradeError;
use crate::port::{EngineStore, TradeUnit};

const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tokens: HashMap<TokenAddress, TokenCurve>,
    balances: HashMap<AgentId, Lamports>,
    positions: HashMap<(AgentId, TokenAddress), Position>,
    trades: Vec<Trade>,
}

/// In-memory store with the same commit and conflict semantics as the
/// SQLite store.
#[derive(Debug)]
pub struct MemoryEngineStore {
    state: Mutex<MemoryState>,
    lock_wait: Duration,
}

impl MemoryEngineStore {
    /// Create a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    /// Override the bounded wait for the state lock.
    #[must_use]
    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }
}

impl Default for MemoryEngineStore {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryTradeUnit<'a> {
    state: &'a mut MemoryState,
}

impl TradeUnit for MemoryTradeUnit<'_> {
    fn token(&mut self, address: &TokenAddress) -> Result<Option<TokenCurve>, TradeError> {
        Ok(self.state.tokens.get(address).cloned())
    }

    fn update_token(&mut self, token: &TokenCurve) -> Result<(), TradeError> {
        self.state
            .tokens
            .insert(token.address().clone(), token.clone());
        Ok(())
    }

    fn agent_balance(&mut self, agent_id: &AgentId) -> Result<Option<Lamports>, TradeError> {
        Ok(self.state.balances.get(agent_id).copied())
    }

    fn update_agent_balance(
        &mut self,
        agent_id: &AgentId,
        balance: Lamports,
    ) -> Result<(), TradeError> {
        match self.state.balances.get_mut(agent_id) {
            Some(slot) => {
                *slot = balance;
                Ok(())
            }
            None => Err(TradeError::AgentNotFound {
                agent_id: agent_id.clone(),
            }),
        }
    }

    fn position(
        &mut self,
        agent_id: &AgentId,
        token_address: &TokenAddress,
    ) -> Result<Option<Position>, TradeError> {
        let key = (agent_id.clone(), token_address.clone());
        Ok(self.state.positions.get(&key).cloned())
    }

    fn upsert_position(&mut self, position: &Position) -> Result<(), TradeError> {
        let key = (position.agent_id().clone(), position.token_address().clone());
        self.state.positions.insert(key, position.clone());
        Ok(())
    }

    fn delete_position(
        &mut self,
        agent_id: &AgentId,
        token_address: &TokenAddress,
    ) -> Result<(), TradeError> {
        let key = (agent_id.clone(), token_address.clone());
        self.state.positions.remove(&key);
        Ok(())
    }

    fn insert_trade(&mut self, trade: &Trade) -> Result<(), TradeError> {
        self.state.trades.push(trade.clone());
        Ok(())
    }
}

impl EngineStore for MemoryEngineStore {
    async fn token(&self, address: &TokenAddress) -> Result<Option<TokenCurve>, TradeError> {
        Ok(self.state.lock().tokens.get(address).cloned())
    }

    async fn agent_balance(&self, agent_id: &AgentId) -> Result<Option<Lamports>, TradeError> {
        Ok(self.state.lock().balances.get(agent_id).copied())
    }

    async fn position(
        &self,
        agent_id: &AgentId,
        token_address: &TokenAddress,
    ) -> Result<Option<Position>, TradeError> {
        let key = (agent_id.clone(), token_address.clone());
        Ok(self.state.lock().positions.get(&key).cloned())
    }

    async fn positions(&self, agent_id: &AgentId) -> Result<Vec<Position>, TradeError> {
        let state = self.state.lock();
        let mut positions: Vec<Position> = state
            .positions
            .values()
            .filter(|p| p.agent_id() == agent_id)
            .cloned()
            .collect();
        positions.sort_by(|a, b| a.token_address().cmp(b.token_address()));
        Ok(positions)
    }

    async fn positions_with_curves(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<(Position, TokenCurve)>, TradeError> {
        let state = self.state.lock();
        let mut marked: Vec<(Position, TokenCurve)> = state
            .positions
            .values()
            .filter(|p| p.agent_id() == agent_id)
            .filter_map(|p| {
                state
                    .tokens
                    .get(p.token_address())
                    .map(|t| (p.clone(), t.clone()))
            })
            .collect();
        marked.sort_by(|a, b| a.0.token_address().cmp(b.0.token_address()));
        Ok(marked)
    }

    async fn trades_for_agent(&self, agent_id: &AgentId) -> Result<Vec<Trade>, TradeError> {
        let state = self.state.lock();
        let mut trades: Vec<Trade> = state
            .trades
            .iter()
            .filter(|t| &t.agent_id == agent_id)
            .cloned()
            .collect();
        trades.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        Ok(trades)
    }

    async fn trades_for_token(&self, address: &TokenAddress) -> Result<Vec<Trade>, TradeError> {
        let state = self.state.lock();
        let mut trades: Vec<Trade> = state
            .trades
            .iter()
            .filter(|t| &t.token_address == address)
            .cloned()
            .collect();
        trades.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        Ok(trades)
    }

    async fn realized_pnl_summary(
        &self,
        agent_id: &AgentId,
    ) -> Result<RealizedPnlSummary, TradeError> {
        let state = self.state.lock();
        let mut summary = RealizedPnlSummary::default();
        for trade in state.trades.iter().filter(|t| &t.agent_id == agent_id) {
            if let Some(pnl) = trade.realized_pnl {
                summary.record(pnl)?;
            }
        }
        Ok(summary)
    }

    async fn insert_agent(&self, agent_id: &AgentId, balance: Lamports) -> Result<(), TradeError> {
        let mut state = self.state.lock();
        if state.balances.contains_key(agent_id) {
            return Err(TradeError::Validation {
                reason: format!("agent {agent_id} already exists"),
            });
        }
        state.balances.insert(agent_id.clone(), balance);
        Ok(())
    }

    async fn insert_token(&self, token: &TokenCurve) -> Result<(), TradeError> {
        let mut state = self.state.lock();
        if state.tokens.contains_key(token.address()) {
            return Err(TradeError::Validation {
                reason: format!("token {} already exists", token.address()),
            });
        }
        state.tokens.insert(token.address().clone(), token.clone());
        Ok(())
    }

    async fn run_atomic<T, F>(&self, token_address: &TokenAddress, work: F) -> Result<T, TradeError>
    where
        T: Send,
        F: FnOnce(&mut dyn TradeUnit) -> Result<T, TradeError> + Send,
    {
        let Some(mut state) = self.state.try_lock_for(self.lock_wait) else {
            return Err(TradeError::ConcurrencyConflict {
                token_address: token_address.clone(),
            });
        };

        let mut scratch = state.clone();
        let mut unit = MemoryTradeUnit {
            state: &mut scratch,
        };
        match work(&mut unit) {
            Ok(value) => {
                *state = scratch;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::curve::CurveParams;
    use crate::domain::money::TokenAmount;
    use crate::domain::trade::TradeDirection;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn token(addr: &str) -> TokenCurve {
        let params = CurveParams::try_new(dec!(1000), dec!(0)).unwrap();
        TokenCurve::launch(TokenAddress::new(addr), params, Utc::now())
    }

    #[tokio::test]
    async fn commit_makes_unit_writes_visible() {
        let store = MemoryEngineStore::new();
        let agent = AgentId::new("a1");
        let addr = TokenAddress::new("tok");
        store.insert_agent(&agent, Lamports::new(1000)).await.unwrap();
        store.insert_token(&token("tok")).await.unwrap();

        store
            .run_atomic(&addr, |unit| {
                unit.update_agent_balance(&agent, Lamports::new(400))
            })
            .await
            .unwrap();

        assert_eq!(
            store.agent_balance(&agent).await.unwrap(),
            Some(Lamports::new(400))
        );
    }

    #[tokio::test]
    async fn failed_unit_leaves_state_untouched() {
        let store = MemoryEngineStore::new();
        let agent = AgentId::new("a1");
        let addr = TokenAddress::new("tok");
        store.insert_agent(&agent, Lamports::new(1000)).await.unwrap();
        store.insert_token(&token("tok")).await.unwrap();

        let result: Result<(), TradeError> = store
            .run_atomic(&addr, |unit| {
                unit.update_agent_balance(&agent, Lamports::new(1))?;
                Err(TradeError::Validation {
                    reason: "forced".to_string(),
                })
            })
            .await;
        assert!(result.is_err());

        assert_eq!(
            store.agent_balance(&agent).await.unwrap(),
            Some(Lamports::new(1000))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn held_lock_turns_into_conflict() {
        let store = Arc::new(
            MemoryEngineStore::new().with_lock_wait(Duration::from_millis(10)),
        );
        store.insert_token(&token("tok")).await.unwrap();

        let slow = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .run_atomic(&TokenAddress::new("tok"), |_unit| {
                        std::thread::sleep(Duration::from_millis(200));
                        Ok(())
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;

        let contender = store
            .run_atomic(&TokenAddress::new("tok"), |_unit| Ok(()))
            .await;
        assert!(matches!(
            contender,
            Err(TradeError::ConcurrencyConflict { .. })
        ));

        slow.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn summary_folds_recorded_sells() {
        let store = MemoryEngineStore::new();
        let agent = AgentId::new("a1");
        let addr = TokenAddress::new("tok");
        store.insert_token(&token("tok")).await.unwrap();

        let now = Utc::now();
        for pnl in [700, -200] {
            let trade = Trade::new(
                agent.clone(),
                addr.clone(),
                TradeDirection::Sell,
                Lamports::new(100),
                TokenAmount::new(1),
                dec!(100),
                now,
            )
            .with_realized_pnl(crate::domain::money::SignedLamports::new(pnl));
            store
                .run_atomic(&addr, move |unit| unit.insert_trade(&trade))
                .await
                .unwrap();
        }

        let summary = store.realized_pnl_summary(&agent).await.unwrap();
        assert_eq!(
            summary.total_realized_pnl,
            crate::domain::money::SignedLamports::new(500)
        );
        assert_eq!(summary.winning_trades, 1);
        assert_eq!(summary.losing_trades, 1);
    }
}
