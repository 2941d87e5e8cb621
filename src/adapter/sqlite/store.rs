//! SQLite engine store implementation.
//!
//! Persistent storage for agents, token curves, positions, and trades using
//! SQLite and Diesel ORM. Trade mutations run through
//! [`EngineStore::run_atomic`], which pairs a per-token lock with an
//! exclusive SQLite transaction.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::SqliteConnection;
use parking_lot::Mutex;

use crate::adapter::sqlite::connection::{configure_connection, DbPool};
use crate::adapter::sqlite::model::{AgentRow, PositionRow, TokenRow, TradeRow};
use crate::adapter::sqlite::schema::{agents, positions, tokens, trades};
use crate::domain::ids::{AgentId, TokenAddress};
use crate::domain::money::{Lamports, SignedLamports};
use crate::domain::position::Position;
use crate::domain::stats::RealizedPnlSummary;
use crate::domain::token::TokenCurve;
use crate::domain::trade::Trade;
use crate::error::TradeError;
use crate::port::{EngineStore, TradeUnit};

/// How long a unit waits for a token's gate before giving up.
const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

/// SQLite-backed engine store.
///
/// Serializes trade units per token with an in-process gate, then runs each
/// unit inside a `BEGIN IMMEDIATE` transaction so the database enforces the
/// same exclusion against any other writer of the file.
pub struct SqliteEngineStore {
    /// Database connection pool.
    pool: DbPool,
    /// One gate per token address, created on first use.
    gates: DashMap<TokenAddress, Arc<Mutex<()>>>,
    /// Bounded wait for a gate before reporting a conflict.
    lock_wait: Duration,
}

impl SqliteEngineStore {
    /// Create a new SQLite engine store with the given connection pool.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            gates: DashMap::new(),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    /// Override the bounded wait for a token's gate.
    #[must_use]
    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    fn gate(&self, token_address: &TokenAddress) -> Arc<Mutex<()>> {
        self.gates.entry(token_address.clone()).or_default().clone()
    }
}

/// Map a database error inside a unit to the trade taxonomy.
///
/// SQLite reports writer contention as a "database is locked" error, which
/// callers are allowed to retry; everything else is a store failure.
fn map_db_error(token_address: &TokenAddress, err: DieselError) -> TradeError {
    match &err {
        DieselError::DatabaseError(_, info) if info.message().contains("locked") => {
            TradeError::ConcurrencyConflict {
                token_address: token_address.clone(),
            }
        }
        _ => TradeError::StoreUnavailable(err.to_string()),
    }
}

fn map_insert_error(err: DieselError, already: &str) -> TradeError {
    match &err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            TradeError::Validation {
                reason: already.to_string(),
            }
        }
        _ => TradeError::StoreUnavailable(err.to_string()),
    }
}

/// Error type threaded through the Diesel transaction closure.
///
/// Diesel requires the closure error to absorb its own errors so it can
/// trigger a rollback; trade errors ride along and come back out unchanged.
enum UnitError {
    Trade(TradeError),
    Db(DieselError),
}

impl From<DieselError> for UnitError {
    fn from(err: DieselError) -> Self {
        Self::Db(err)
    }
}

/// Unit-of-work handle bound to one open transaction.
struct SqliteTradeUnit<'a> {
    conn: &'a mut SqliteConnection,
    token_address: TokenAddress,
}

impl TradeUnit for SqliteTradeUnit<'_> {
    fn token(&mut self, address: &TokenAddress) -> Result<Option<TokenCurve>, TradeError> {
        let row: Option<TokenRow> = tokens::table
            .find(address.as_str())
            .first(&mut *self.conn)
            .optional()
            .map_err(|e| map_db_error(&self.token_address, e))?;
        row.map(TokenRow::into_domain).transpose()
    }

    fn update_token(&mut self, token: &TokenCurve) -> Result<(), TradeError> {
        let row = TokenRow::from_domain(token)?;
        diesel::replace_into(tokens::table)
            .values(&row)
            .execute(&mut *self.conn)
            .map_err(|e| map_db_error(&self.token_address, e))?;
        Ok(())
    }

    fn agent_balance(&mut self, agent_id: &AgentId) -> Result<Option<Lamports>, TradeError> {
        let row: Option<AgentRow> = agents::table
            .find(agent_id.as_str())
            .first(&mut *self.conn)
            .optional()
            .map_err(|e| map_db_error(&self.token_address, e))?;
        row.map(|r| r.balance()).transpose()
    }

    fn update_agent_balance(
        &mut self,
        agent_id: &AgentId,
        balance: Lamports,
    ) -> Result<(), TradeError> {
        let stored = i64::try_from(balance.get())
            .map_err(|e| TradeError::StoreUnavailable(format!("balance out of range: {e}")))?;

        let updated = diesel::update(agents::table.find(agent_id.as_str()))
            .set(agents::sol_balance.eq(stored))
            .execute(&mut *self.conn)
            .map_err(|e| map_db_error(&self.token_address, e))?;

        if updated == 0 {
            return Err(TradeError::AgentNotFound {
                agent_id: agent_id.clone(),
            });
        }
        Ok(())
    }

    fn position(
        &mut self,
        agent_id: &AgentId,
        token_address: &TokenAddress,
    ) -> Result<Option<Position>, TradeError> {
        let row: Option<PositionRow> = positions::table
            .find((agent_id.as_str(), token_address.as_str()))
            .first(&mut *self.conn)
            .optional()
            .map_err(|e| map_db_error(&self.token_address, e))?;
        row.map(PositionRow::into_domain).transpose()
    }

    fn upsert_position(&mut self, position: &Position) -> Result<(), TradeError> {
        let row = PositionRow::from_domain(position)?;
        diesel::replace_into(positions::table)
            .values(&row)
            .execute(&mut *self.conn)
            .map_err(|e| map_db_error(&self.token_address, e))?;
        Ok(())
    }

    fn delete_position(
        &mut self,
        agent_id: &AgentId,
        token_address: &TokenAddress,
    ) -> Result<(), TradeError> {
        diesel::delete(positions::table.find((agent_id.as_str(), token_address.as_str())))
            .execute(&mut *self.conn)
            .map_err(|e| map_db_error(&self.token_address, e))?;
        Ok(())
    }

    fn insert_trade(&mut self, trade: &Trade) -> Result<(), TradeError> {
        let row = TradeRow::from_domain(trade)?;
        diesel::insert_into(trades::table)
            .values(&row)
            .execute(&mut *self.conn)
            .map_err(|e| map_db_error(&self.token_address, e))?;
        Ok(())
    }
}

impl EngineStore for SqliteEngineStore {
    async fn token(&self, address: &TokenAddress) -> Result<Option<TokenCurve>, TradeError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        let row: Option<TokenRow> = tokens::table
            .find(address.as_str())
            .first(&mut conn)
            .optional()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        row.map(TokenRow::into_domain).transpose()
    }

    async fn agent_balance(&self, agent_id: &AgentId) -> Result<Option<Lamports>, TradeError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        let row: Option<AgentRow> = agents::table
            .find(agent_id.as_str())
            .first(&mut conn)
            .optional()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        row.map(|r| r.balance()).transpose()
    }

    async fn position(
        &self,
        agent_id: &AgentId,
        token_address: &TokenAddress,
    ) -> Result<Option<Position>, TradeError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        let row: Option<PositionRow> = positions::table
            .find((agent_id.as_str(), token_address.as_str()))
            .first(&mut conn)
            .optional()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        row.map(PositionRow::into_domain).transpose()
    }

    async fn positions(&self, agent_id: &AgentId) -> Result<Vec<Position>, TradeError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        let rows: Vec<PositionRow> = positions::table
            .filter(positions::agent_id.eq(agent_id.as_str()))
            .order(positions::token_address.asc())
            .load(&mut conn)
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        rows.into_iter().map(PositionRow::into_domain).collect()
    }

    async fn positions_with_curves(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<(Position, TokenCurve)>, TradeError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        let rows: Vec<(PositionRow, TokenRow)> = positions::table
            .inner_join(tokens::table.on(positions::token_address.eq(tokens::address)))
            .filter(positions::agent_id.eq(agent_id.as_str()))
            .order(positions::token_address.asc())
            .select((PositionRow::as_select(), TokenRow::as_select()))
            .load(&mut conn)
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        rows.into_iter()
            .map(|(position, token)| Ok((position.into_domain()?, token.into_domain()?)))
            .collect()
    }

    async fn trades_for_agent(&self, agent_id: &AgentId) -> Result<Vec<Trade>, TradeError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        let rows: Vec<TradeRow> = trades::table
            .filter(trades::agent_id.eq(agent_id.as_str()))
            .order(trades::executed_at.desc())
            .load(&mut conn)
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        rows.into_iter().map(TradeRow::into_domain).collect()
    }

    async fn trades_for_token(&self, address: &TokenAddress) -> Result<Vec<Trade>, TradeError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        let rows: Vec<TradeRow> = trades::table
            .filter(trades::token_address.eq(address.as_str()))
            .order(trades::executed_at.desc())
            .load(&mut conn)
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        rows.into_iter().map(TradeRow::into_domain).collect()
    }

    async fn realized_pnl_summary(
        &self,
        agent_id: &AgentId,
    ) -> Result<RealizedPnlSummary, TradeError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        let pnls: Vec<Option<i64>> = trades::table
            .filter(trades::agent_id.eq(agent_id.as_str()))
            .filter(trades::realized_pnl.is_not_null())
            .select(trades::realized_pnl)
            .load(&mut conn)
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        let mut summary = RealizedPnlSummary::default();
        for pnl in pnls.into_iter().flatten() {
            summary.record(SignedLamports::new(pnl))?;
        }
        Ok(summary)
    }

    async fn insert_agent(&self, agent_id: &AgentId, balance: Lamports) -> Result<(), TradeError> {
        let row = AgentRow::from_domain(agent_id, balance, chrono::Utc::now())?;
        let mut conn = self
            .pool
            .get()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        diesel::insert_into(agents::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| map_insert_error(e, &format!("agent {agent_id} already exists")))?;

        Ok(())
    }

    async fn insert_token(&self, token: &TokenCurve) -> Result<(), TradeError> {
        let row = TokenRow::from_domain(token)?;
        let mut conn = self
            .pool
            .get()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;

        diesel::insert_into(tokens::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| {
                map_insert_error(e, &format!("token {} already exists", token.address()))
            })?;

        Ok(())
    }

    async fn run_atomic<T, F>(&self, token_address: &TokenAddress, work: F) -> Result<T, TradeError>
    where
        T: Send,
        F: FnOnce(&mut dyn TradeUnit) -> Result<T, TradeError> + Send,
    {
        // The gate comes first so contention surfaces here, with a bounded
        // wait, rather than as a busy database under the transaction.
        let gate = self.gate(token_address);
        let Some(_guard) = gate.try_lock_for(self.lock_wait) else {
            return Err(TradeError::ConcurrencyConflict {
                token_address: token_address.clone(),
            });
        };

        let mut conn = self
            .pool
            .get()
            .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;
        configure_connection(&mut conn)?;

        let result = conn.immediate_transaction(|conn| {
            let mut unit = SqliteTradeUnit {
                conn,
                token_address: token_address.clone(),
            };
            work(&mut unit).map_err(UnitError::Trade)
        });

        match result {
            Ok(value) => Ok(value),
            Err(UnitError::Trade(err)) => Err(err),
            Err(UnitError::Db(err)) => Err(map_db_error(token_address, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::sqlite::connection::{create_pool, run_migrations};
    use crate::domain::curve::CurveParams;
    use crate::domain::money::TokenAmount;
    use crate::domain::trade::TradeDirection;
    use chrono::{Duration as ChronoDuration, Utc};
    use rust_decimal_macros::dec;

    fn setup_test_db() -> DbPool {
        // A single connection keeps every handle on the same in-memory db.
        let pool = create_pool(":memory:", 1).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        pool
    }

    fn agent() -> AgentId {
        AgentId::new("agent-1")
    }

    fn address() -> TokenAddress {
        TokenAddress::new("tok-a")
    }

    fn token(addr: &TokenAddress) -> TokenCurve {
        let params = CurveParams::try_new(dec!(1000), dec!(10)).unwrap();
        TokenCurve::launch(addr.clone(), params, Utc::now())
    }

    async fn seeded_store() -> SqliteEngineStore {
        let store = SqliteEngineStore::new(setup_test_db());
        store
            .insert_agent(&agent(), Lamports::new(1_000_000))
            .await
            .unwrap();
        store.insert_token(&token(&address())).await.unwrap();
        store
    }

    // -------------------------------------------------------------------------
    // Seeding and plain reads
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn insert_and_fetch_token() {
        let store = seeded_store().await;

        let loaded = store.token(&address()).await.unwrap().unwrap();
        assert_eq!(loaded.address(), &address());
        assert_eq!(loaded.params().base_price(), dec!(1000));
        assert_eq!(loaded.total_supply(), TokenAmount::ZERO);
    }

    #[tokio::test]
    async fn fetch_missing_token_returns_none() {
        let store = seeded_store().await;

        let loaded = store.token(&TokenAddress::new("ghost")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn insert_token_twice_is_rejected() {
        let store = seeded_store().await;

        let result = store.insert_token(&token(&address())).await;
        assert!(matches!(result, Err(TradeError::Validation { .. })));
    }

    #[tokio::test]
    async fn insert_agent_and_read_balance() {
        let store = seeded_store().await;

        let balance = store.agent_balance(&agent()).await.unwrap();
        assert_eq!(balance, Some(Lamports::new(1_000_000)));

        let missing = store.agent_balance(&AgentId::new("ghost")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn insert_agent_twice_is_rejected() {
        let store = seeded_store().await;

        let result = store.insert_agent(&agent(), Lamports::new(5)).await;
        assert!(matches!(result, Err(TradeError::Validation { .. })));
    }

    // -------------------------------------------------------------------------
    // Atomic unit commit and rollback
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn run_atomic_commits_every_write() {
        let store = seeded_store().await;
        let agent = agent();
        let addr = address();
        let now = Utc::now();

        let trade = store
            .run_atomic(&addr, |unit| {
                let mut token = unit.token(&addr)?.ok_or(TradeError::TokenNotFound {
                    address: addr.clone(),
                })?;
                let quote = token.quote_buy(Lamports::new(5000))?;
                token.apply_buy(&quote)?;
                unit.update_token(&token)?;

                unit.update_agent_balance(&agent, Lamports::new(995_000))?;

                let position = Position::open(
                    agent.clone(),
                    addr.clone(),
                    quote.tokens(),
                    quote.lamports(),
                    now,
                );
                unit.upsert_position(&position)?;

                let trade = Trade::new(
                    agent.clone(),
                    addr.clone(),
                    TradeDirection::Buy,
                    quote.lamports(),
                    quote.tokens(),
                    quote.execution_price(),
                    now,
                );
                unit.insert_trade(&trade)?;
                Ok(trade)
            })
            .await
            .unwrap();

        // 5000 lamports mint 4 units on this slope; the full payment still
        // enters the reserve.
        assert_eq!(trade.token_amount, TokenAmount::new(4));

        let token = store.token(&addr).await.unwrap().unwrap();
        assert_eq!(token.total_supply(), TokenAmount::new(4));
        assert_eq!(token.reserve(), Lamports::new(5000));

        let balance = store.agent_balance(&agent).await.unwrap().unwrap();
        assert_eq!(balance, Lamports::new(995_000));

        let positions = store.positions(&agent).await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].amount(), TokenAmount::new(4));

        let trades = store.trades_for_agent(&agent).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0], trade);
    }

    #[tokio::test]
    async fn run_atomic_rolls_back_on_error() {
        let store = seeded_store().await;
        let agent = agent();
        let addr = address();

        let result: Result<(), TradeError> = store
            .run_atomic(&addr, |unit| {
                unit.update_agent_balance(&agent, Lamports::new(1))?;
                let mut token = unit.token(&addr)?.ok_or(TradeError::TokenNotFound {
                    address: addr.clone(),
                })?;
                let quote = token.quote_buy(Lamports::new(5000))?;
                token.apply_buy(&quote)?;
                unit.update_token(&token)?;

                Err(TradeError::Validation {
                    reason: "forced failure".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(TradeError::Validation { .. })));

        // Both writes were rolled back.
        let balance = store.agent_balance(&agent).await.unwrap().unwrap();
        assert_eq!(balance, Lamports::new(1_000_000));

        let token = store.token(&addr).await.unwrap().unwrap();
        assert_eq!(token.total_supply(), TokenAmount::ZERO);
        assert_eq!(token.reserve(), Lamports::ZERO);
    }

    #[tokio::test]
    async fn update_balance_for_missing_agent_fails() {
        let store = seeded_store().await;
        let addr = address();

        let result: Result<(), TradeError> = store
            .run_atomic(&addr, |unit| {
                unit.update_agent_balance(&AgentId::new("ghost"), Lamports::new(5))
            })
            .await;

        assert!(matches!(result, Err(TradeError::AgentNotFound { .. })));
    }

    #[tokio::test]
    async fn delete_position_clears_the_row() {
        let store = seeded_store().await;
        let agent = agent();
        let addr = address();
        let now = Utc::now();

        store
            .run_atomic(&addr, |unit| {
                let position = Position::open(
                    agent.clone(),
                    addr.clone(),
                    TokenAmount::new(10),
                    Lamports::new(10_000),
                    now,
                );
                unit.upsert_position(&position)
            })
            .await
            .unwrap();
        assert_eq!(store.positions(&agent).await.unwrap().len(), 1);

        store
            .run_atomic(&addr, |unit| unit.delete_position(&agent, &addr))
            .await
            .unwrap();
        assert!(store.positions(&agent).await.unwrap().is_empty());
    }

    // -------------------------------------------------------------------------
    // Per-token serialization
    // -------------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn conflicting_units_on_one_token_fail_fast() {
        let store = Arc::new(
            SqliteEngineStore::new(setup_test_db())
                .with_lock_wait(Duration::from_millis(20)),
        );
        store
            .insert_token(&token(&address()))
            .await
            .unwrap();

        let slow = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let addr = address();
                store
                    .run_atomic(&addr, |unit| {
                        let _ = unit.token(&addr)?;
                        std::thread::sleep(Duration::from_millis(250));
                        Ok(())
                    })
                    .await
            })
        };

        // Give the slow unit time to take the gate.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let contender = store.run_atomic(&address(), |_unit| Ok(())).await;
        match contender {
            Err(err @ TradeError::ConcurrencyConflict { .. }) => assert!(err.is_retryable()),
            other => panic!("expected conflict, got {other:?}"),
        }

        slow.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn units_on_different_tokens_do_not_contend() {
        let store = Arc::new(
            SqliteEngineStore::new(setup_test_db())
                .with_lock_wait(Duration::from_millis(20)),
        );
        let addr_a = TokenAddress::new("tok-a");
        let addr_b = TokenAddress::new("tok-b");
        store.insert_token(&token(&addr_a)).await.unwrap();
        store.insert_token(&token(&addr_b)).await.unwrap();

        let slow = {
            let store = Arc::clone(&store);
            let addr = addr_a.clone();
            tokio::spawn(async move {
                store
                    .run_atomic(&addr, |_unit| {
                        std::thread::sleep(Duration::from_millis(150));
                        Ok(())
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;

        // A different token's gate is free; the unit only queues briefly for
        // the shared connection.
        let other = store.run_atomic(&addr_b, |_unit| Ok(())).await;
        assert!(other.is_ok());

        slow.await.unwrap().unwrap();
    }

    // -------------------------------------------------------------------------
    // History and aggregation reads
    // -------------------------------------------------------------------------

    async fn insert_trade_at(
        store: &SqliteEngineStore,
        direction: TradeDirection,
        pnl: Option<i64>,
        at: chrono::DateTime<Utc>,
    ) -> Trade {
        let mut trade = Trade::new(
            agent(),
            address(),
            direction,
            Lamports::new(1000),
            TokenAmount::new(1),
            dec!(1000),
            at,
        );
        if let Some(pnl) = pnl {
            trade = trade.with_realized_pnl(SignedLamports::new(pnl));
        }
        let inserted = trade.clone();
        store
            .run_atomic(&address(), move |unit| unit.insert_trade(&trade))
            .await
            .unwrap();
        inserted
    }

    #[tokio::test]
    async fn trades_come_back_newest_first() {
        let store = seeded_store().await;
        let base = Utc::now();

        let oldest = insert_trade_at(&store, TradeDirection::Buy, None, base).await;
        let middle = insert_trade_at(
            &store,
            TradeDirection::Buy,
            None,
            base + ChronoDuration::seconds(1),
        )
        .await;
        let newest = insert_trade_at(
            &store,
            TradeDirection::Sell,
            Some(42),
            base + ChronoDuration::seconds(2),
        )
        .await;

        let for_agent = store.trades_for_agent(&agent()).await.unwrap();
        assert_eq!(
            for_agent.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![newest.id, middle.id, oldest.id]
        );

        let for_token = store.trades_for_token(&address()).await.unwrap();
        assert_eq!(for_token.len(), 3);
        assert_eq!(for_token[0].id, newest.id);
    }

    #[tokio::test]
    async fn realized_pnl_summary_folds_only_settled_trades() {
        let store = seeded_store().await;
        let base = Utc::now();

        insert_trade_at(&store, TradeDirection::Buy, None, base).await;
        insert_trade_at(
            &store,
            TradeDirection::Sell,
            Some(500),
            base + ChronoDuration::seconds(1),
        )
        .await;
        insert_trade_at(
            &store,
            TradeDirection::Sell,
            Some(-300),
            base + ChronoDuration::seconds(2),
        )
        .await;

        let summary = store.realized_pnl_summary(&agent()).await.unwrap();
        assert_eq!(summary.total_realized_pnl, SignedLamports::new(200));
        assert_eq!(summary.winning_trades, 1);
        assert_eq!(summary.losing_trades, 1);
        assert_eq!(summary.win_rate(), Some(dec!(50)));
    }

    #[tokio::test]
    async fn positions_join_their_curve_state() {
        let store = seeded_store().await;
        let addr_b = TokenAddress::new("tok-b");
        store.insert_token(&token(&addr_b)).await.unwrap();

        let now = Utc::now();
        for addr in [address(), addr_b.clone()] {
            let position = Position::open(
                agent(),
                addr.clone(),
                TokenAmount::new(3),
                Lamports::new(3000),
                now,
            );
            store
                .run_atomic(&addr, move |unit| unit.upsert_position(&position))
                .await
                .unwrap();
        }

        let marked = store.positions_with_curves(&agent()).await.unwrap();
        assert_eq!(marked.len(), 2);
        for (position, curve) in &marked {
            assert_eq!(position.token_address(), curve.address());
        }
        assert_eq!(marked[0].0.token_address(), &address());
        assert_eq!(marked[1].0.token_address(), &addr_b);
    }
}
