//! Trade execution over bonding curves.
//!
//! [`TradeExecutor`] drives a settlement through four stages: validate the
//! request, price it against the live curve, check the slippage cap, then
//! commit every write in one atomic unit. The first three stages run against
//! a plain snapshot so bad requests fail before the token gate is ever taken;
//! the unit re-reads and re-derives all of them at its own serialization
//! point, so a stale snapshot can delay a trade but never corrupt one.
//!
//! Only [`TradeError::ConcurrencyConflict`] is retried, with a bounded linear
//! backoff. Events and logs go out after the unit commits, never before.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::TradeConfig;
use crate::domain::curve::CurveParams;
use crate::domain::ids::{AgentId, TokenAddress};
use crate::domain::money::{Lamports, Price, SignedLamports, TokenAmount};
use crate::domain::position::Position;
use crate::domain::stats::PnlBreakdown;
use crate::domain::token::{Quote, TokenCurve};
use crate::domain::trade::{Trade, TradeDirection};
use crate::error::TradeError;
use crate::port::{
    BuyEvent, EngineEvent, EngineStore, PublisherRegistry, SellEvent, TokenCreatedEvent,
};

/// A buy order: spend `sol_amount` lamports on whatever the curve yields.
#[derive(Debug, Clone)]
pub struct BuyRequest {
    /// Agent spending the lamports.
    pub agent_id: AgentId,
    /// Token to buy into.
    pub token_address: TokenAddress,
    /// Lamports to spend, all of which enter the reserve.
    pub sol_amount: Lamports,
    /// Free-text rationale recorded on the trade.
    pub reasoning: Option<String>,
    /// External-ledger reference recorded verbatim.
    pub tx_signature: Option<String>,
    /// Slippage cap in percent; the configured default applies when `None`.
    pub max_slippage_percent: Option<Decimal>,
}

impl BuyRequest {
    /// A buy carrying only the required fields; the configured slippage
    /// cap applies.
    #[must_use]
    pub fn new(agent_id: AgentId, token_address: TokenAddress, sol_amount: Lamports) -> Self {
        Self {
            agent_id,
            token_address,
            sol_amount,
            reasoning: None,
            tx_signature: None,
            max_slippage_percent: None,
        }
    }

    /// Attach the agent's rationale.
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

    /// Override the slippage cap for this request only.
    #[must_use]
    pub fn with_max_slippage(mut self, percent: Decimal) -> Self {
        self.max_slippage_percent = Some(percent);
        self
    }
}

/// A sell order: convert `token_amount` held units back into lamports.
#[derive(Debug, Clone)]
pub struct SellRequest {
    /// Agent selling out of its position.
    pub agent_id: AgentId,
    /// Token to sell out of.
    pub token_address: TokenAddress,
    /// Token units to sell.
    pub token_amount: TokenAmount,
    /// Free-text rationale recorded on the trade.
    pub reasoning: Option<String>,
    /// External-ledger reference recorded verbatim.
    pub tx_signature: Option<String>,
    /// Slippage cap in percent; the configured default applies when `None`.
    pub max_slippage_percent: Option<Decimal>,
}

impl SellRequest {
    /// A sell carrying only the required fields; the configured slippage
    /// cap applies.
    #[must_use]
    pub fn new(agent_id: AgentId, token_address: TokenAddress, token_amount: TokenAmount) -> Self {
        Self {
            agent_id,
            token_address,
            token_amount,
            reasoning: None,
            tx_signature: None,
            max_slippage_percent: None,
        }
    }

    /// Attach the agent's rationale.
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

    /// Override the slippage cap for this request only.
    #[must_use]
    pub fn with_max_slippage(mut self, percent: Decimal) -> Self {
        self.max_slippage_percent = Some(percent);
        self
    }
}

/// What a settled buy handed back.
#[derive(Debug, Clone)]
pub struct BuyReceipt {
    /// The trade as recorded.
    pub trade: Trade,
    /// Token units minted to the agent.
    pub tokens_received: TokenAmount,
    /// The agent's balance after the spend, read inside the unit.
    pub new_balance: Lamports,
}

/// What a settled sell handed back.
#[derive(Debug, Clone)]
pub struct SellReceipt {
    /// The trade as recorded.
    pub trade: Trade,
    /// Lamports paid out of the reserve.
    pub sol_received: Lamports,
    /// The agent's balance after the credit, read inside the unit.
    pub new_balance: Lamports,
    /// Proceeds minus the sold share of the cost basis.
    pub realized_pnl: SignedLamports,
}

/// The settlement engine: prices requests against the live curve and commits
/// the writes in one atomic unit.
///
/// Cheap to share behind an [`Arc`]; all state lives in the store.
pub struct TradeExecutor<S> {
    store: Arc<S>,
    publishers: Arc<PublisherRegistry>,
    config: TradeConfig,
}

impl<S: EngineStore> TradeExecutor<S> {
    /// Wire an executor to its store and publishers.
    #[must_use]
    pub fn new(store: Arc<S>, publishers: Arc<PublisherRegistry>, config: TradeConfig) -> Self {
        Self {
            store,
            publishers,
            config,
        }
    }

    /// Launch a token with a fresh linear curve at zero supply.
    ///
    /// # Errors
    /// Rejects non-positive base prices and negative slopes; fails when the
    /// address is already taken.
    pub async fn launch_token(
        &self,
        address: TokenAddress,
        base_price: Price,
        slope: Price,
    ) -> Result<TokenCurve, TradeError> {
        let params = CurveParams::try_new(base_price, slope)?;
        let token = TokenCurve::launch(address, params, Utc::now());
        self.store.insert_token(&token).await?;

        info!(token = %token.address(), base = %base_price, slope = %slope, "Token launched");
        self.publishers
            .publish_all(EngineEvent::TokenCreated(TokenCreatedEvent::from(&token)));
        Ok(token)
    }

    /// Execute a buy end to end.
    ///
    /// # Errors
    /// Terminal failures (validation, unknown token or agent, insufficient
    /// balance, slippage) are returned as-is and nothing is written. Conflicts
    /// are retried up to the configured bound before surfacing.
    pub async fn buy(&self, request: BuyRequest) -> Result<BuyReceipt, TradeError> {
        if request.sol_amount.is_zero() {
            return Err(TradeError::Validation {
                reason: "buy amount must be positive".to_string(),
            });
        }
        let max_slippage = self.effective_slippage(request.max_slippage_percent)?;
        self.precheck_buy(&request, max_slippage).await?;

        let mut attempt = 0;
        let (trade, new_balance) = loop {
            match self.commit_buy(&request, max_slippage).await {
                Err(err) if err.is_retryable() && attempt < self.config.conflict_retries => {
                    attempt += 1;
                    warn!(
                        token = %request.token_address,
                        agent = %request.agent_id,
                        attempt,
                        "Buy hit a concurrent trade, backing off"
                    );
                    sleep(self.config.backoff_for_attempt(attempt)).await;
                }
                outcome => break outcome?,
            }
        };

        info!(
            trade_id = %trade.id,
            agent = %trade.agent_id,
            token = %trade.token_address,
            sol = %trade.sol_amount,
            tokens = %trade.token_amount,
            price = %trade.execution_price,
            "Buy settled"
        );
        self.publishers
            .publish_all(EngineEvent::BuyExecuted(BuyEvent::from(&trade)));

        Ok(BuyReceipt {
            tokens_received: trade.token_amount,
            new_balance,
            trade,
        })
    }

    /// Execute a sell end to end.
    ///
    /// # Errors
    /// Terminal failures (validation, unknown token or agent, insufficient
    /// position, slippage) are returned as-is and nothing is written.
    /// Conflicts are retried up to the configured bound before surfacing.
    pub async fn sell(&self, request: SellRequest) -> Result<SellReceipt, TradeError> {
        if request.token_amount.is_zero() {
            return Err(TradeError::Validation {
                reason: "sell amount must be positive".to_string(),
            });
        }
        let max_slippage = self.effective_slippage(request.max_slippage_percent)?;
        self.precheck_sell(&request, max_slippage).await?;

        let mut attempt = 0;
        let (trade, new_balance, realized_pnl) = loop {
            match self.commit_sell(&request, max_slippage).await {
                Err(err) if err.is_retryable() && attempt < self.config.conflict_retries => {
                    attempt += 1;
                    warn!(
                        token = %request.token_address,
                        agent = %request.agent_id,
                        attempt,
                        "Sell hit a concurrent trade, backing off"
                    );
                    sleep(self.config.backoff_for_attempt(attempt)).await;
                }
                outcome => break outcome?,
            }
        };

        info!(
            trade_id = %trade.id,
            agent = %trade.agent_id,
            token = %trade.token_address,
            sol = %trade.sol_amount,
            tokens = %trade.token_amount,
            price = %trade.execution_price,
            pnl = %realized_pnl,
            "Sell settled"
        );
        self.publishers
            .publish_all(EngineEvent::SellExecuted(SellEvent::from_trade(
                &trade,
                realized_pnl,
            )));

        Ok(SellReceipt {
            sol_received: trade.sol_amount,
            new_balance,
            realized_pnl,
            trade,
        })
    }

    /// All of an agent's open positions.
    ///
    /// # Errors
    /// Fails only when the store does.
    pub async fn positions(&self, agent_id: &AgentId) -> Result<Vec<Position>, TradeError> {
        self.store.positions(agent_id).await
    }

    /// The agent's full PnL picture: realized from the trade log, unrealized
    /// marked against live curve prices at the moment of the call.
    ///
    /// # Errors
    /// Fails when the store does or when a mark overflows.
    pub async fn pnl_breakdown(&self, agent_id: &AgentId) -> Result<PnlBreakdown, TradeError> {
        let summary = self.store.realized_pnl_summary(agent_id).await?;
        let holdings = self.store.positions_with_curves(agent_id).await?;

        let mut total_unrealized = SignedLamports::new(0);
        for (position, token) in &holdings {
            let marked = position.unrealized_pnl(token.spot_price()?)?;
            total_unrealized = total_unrealized.checked_add(marked)?;
        }

        Ok(PnlBreakdown::from_parts(summary, total_unrealized))
    }

    /// An agent's trades, newest first.
    ///
    /// # Errors
    /// Fails only when the store does.
    pub async fn trades_for_agent(&self, agent_id: &AgentId) -> Result<Vec<Trade>, TradeError> {
        self.store.trades_for_agent(agent_id).await
    }

    /// All trades against a token, newest first.
    ///
    /// # Errors
    /// Fails only when the store does.
    pub async fn trades_for_token(
        &self,
        address: &TokenAddress,
    ) -> Result<Vec<Trade>, TradeError> {
        self.store.trades_for_token(address).await
    }

    /// Resolve the slippage cap for one request.
    fn effective_slippage(&self, requested: Option<Decimal>) -> Result<Decimal, TradeError> {
        let max = requested.unwrap_or(self.config.default_max_slippage_percent);
        if max < Decimal::ZERO || max > Decimal::ONE_HUNDRED {
            return Err(TradeError::Validation {
                reason: format!("max slippage must be between 0 and 100 percent, got {max}"),
            });
        }
        Ok(max)
    }

    /// Fast-fail a buy against a plain snapshot, before the token gate.
    ///
    /// Every check here runs again inside the unit; a pass is advisory only.
    async fn precheck_buy(
        &self,
        request: &BuyRequest,
        max_slippage: Decimal,
    ) -> Result<(), TradeError> {
        let token = self
            .store
            .token(&request.token_address)
            .await?
            .ok_or_else(|| TradeError::TokenNotFound {
                address: request.token_address.clone(),
            })?;
        let balance = self
            .store
            .agent_balance(&request.agent_id)
            .await?
            .ok_or_else(|| TradeError::AgentNotFound {
                agent_id: request.agent_id.clone(),
            })?;
        if balance < request.sol_amount {
            return Err(TradeError::InsufficientBalance {
                requested: request.sol_amount,
                available: balance,
            });
        }

        let quote = token.quote_buy(request.sol_amount)?;
        check_buy_slippage(&quote, max_slippage)
    }

    /// Fast-fail a sell against a plain snapshot, before the token gate.
    ///
    /// Every check here runs again inside the unit; a pass is advisory only.
    async fn precheck_sell(
        &self,
        request: &SellRequest,
        max_slippage: Decimal,
    ) -> Result<(), TradeError> {
        let token = self
            .store
            .token(&request.token_address)
            .await?
            .ok_or_else(|| TradeError::TokenNotFound {
                address: request.token_address.clone(),
            })?;
        self.store
            .agent_balance(&request.agent_id)
            .await?
            .ok_or_else(|| TradeError::AgentNotFound {
                agent_id: request.agent_id.clone(),
            })?;
        let held = self
            .store
            .position(&request.agent_id, &request.token_address)
            .await?
            .map_or(TokenAmount::new(0), |position| position.amount());
        if held < request.token_amount {
            return Err(TradeError::InsufficientPosition {
                requested: request.token_amount,
                held,
            });
        }

        let quote = token.quote_sell(request.token_amount)?;
        check_sell_slippage(&quote, max_slippage)
    }

    /// One atomic buy attempt. Re-derives every decision at the unit's own
    /// serialization point; the precheck snapshot is already stale here.
    async fn commit_buy(
        &self,
        request: &BuyRequest,
        max_slippage: Decimal,
    ) -> Result<(Trade, Lamports), TradeError> {
        let agent_id = request.agent_id.clone();
        let token_address = request.token_address.clone();
        let sol_amount = request.sol_amount;
        let reasoning = request.reasoning.clone();
        let tx_signature = request.tx_signature.clone();
        let executed_at = Utc::now();

        self.store
            .run_atomic(&request.token_address, move |unit| {
                let mut token = unit.token(&token_address)?.ok_or_else(|| {
                    TradeError::TokenNotFound {
                        address: token_address.clone(),
                    }
                })?;
                let balance = unit.agent_balance(&agent_id)?.ok_or_else(|| {
                    TradeError::AgentNotFound {
                        agent_id: agent_id.clone(),
                    }
                })?;
                if balance < sol_amount {
                    return Err(TradeError::InsufficientBalance {
                        requested: sol_amount,
                        available: balance,
                    });
                }

                let quote = token.quote_buy(sol_amount)?;
                check_buy_slippage(&quote, max_slippage)?;

                token.apply_buy(&quote)?;
                unit.update_token(&token)?;

                let new_balance = balance.checked_sub(sol_amount)?;
                unit.update_agent_balance(&agent_id, new_balance)?;

                let position = match unit.position(&agent_id, &token_address)? {
                    Some(mut position) => {
                        position.record_buy(quote.tokens(), sol_amount, executed_at)?;
                        position
                    }
                    None => Position::open(
                        agent_id.clone(),
                        token_address.clone(),
                        quote.tokens(),
                        sol_amount,
                        executed_at,
                    ),
                };
                unit.upsert_position(&position)?;

                let mut trade = Trade::new(
                    agent_id,
                    token_address,
                    TradeDirection::Buy,
                    sol_amount,
                    quote.tokens(),
                    quote.execution_price(),
                    executed_at,
                );
                if let Some(reasoning) = reasoning {
                    trade = trade.with_reasoning(reasoning);
                }
                if let Some(tx_signature) = tx_signature {
                    trade = trade.with_tx_signature(tx_signature);
                }
                unit.insert_trade(&trade)?;

                Ok((trade, new_balance))
            })
            .await
    }

    /// One atomic sell attempt. Re-derives every decision at the unit's own
    /// serialization point; the precheck snapshot is already stale here.
    async fn commit_sell(
        &self,
        request: &SellRequest,
        max_slippage: Decimal,
    ) -> Result<(Trade, Lamports, SignedLamports), TradeError> {
        let agent_id = request.agent_id.clone();
        let token_address = request.token_address.clone();
        let token_amount = request.token_amount;
        let reasoning = request.reasoning.clone();
        let tx_signature = request.tx_signature.clone();
        let executed_at = Utc::now();

        self.store
            .run_atomic(&request.token_address, move |unit| {
                let mut token = unit.token(&token_address)?.ok_or_else(|| {
                    TradeError::TokenNotFound {
                        address: token_address.clone(),
                    }
                })?;
                let balance = unit.agent_balance(&agent_id)?.ok_or_else(|| {
                    TradeError::AgentNotFound {
                        agent_id: agent_id.clone(),
                    }
                })?;
                let mut position = unit.position(&agent_id, &token_address)?.ok_or_else(|| {
                    TradeError::InsufficientPosition {
                        requested: token_amount,
                        held: TokenAmount::new(0),
                    }
                })?;
                if position.amount() < token_amount {
                    return Err(TradeError::InsufficientPosition {
                        requested: token_amount,
                        held: position.amount(),
                    });
                }

                let quote = token.quote_sell(token_amount)?;
                check_sell_slippage(&quote, max_slippage)?;

                token.apply_sell(&quote)?;
                unit.update_token(&token)?;

                let new_balance = balance.checked_add(quote.lamports())?;
                unit.update_agent_balance(&agent_id, new_balance)?;

                let outcome = position.record_sell(token_amount, quote.lamports(), executed_at)?;
                if outcome.closes_position {
                    unit.delete_position(&agent_id, &token_address)?;
                } else {
                    unit.upsert_position(&position)?;
                }

                let mut trade = Trade::new(
                    agent_id,
                    token_address,
                    TradeDirection::Sell,
                    quote.lamports(),
                    token_amount,
                    quote.execution_price(),
                    executed_at,
                )
                .with_realized_pnl(outcome.realized_pnl);
                if let Some(reasoning) = reasoning {
                    trade = trade.with_reasoning(reasoning);
                }
                if let Some(tx_signature) = tx_signature {
                    trade = trade.with_tx_signature(tx_signature);
                }
                unit.insert_trade(&trade)?;

                Ok((trade, new_balance, outcome.realized_pnl))
            })
            .await
    }
}

/// Slippage of a buy in percent: how far the average paid price ran above the
/// marginal price the agent saw when quoting.
///
/// Flooring the minted amount pushes the average up, so even a flat curve
/// shows positive slippage on amounts that do not divide evenly.
fn check_buy_slippage(quote: &Quote, max_slippage: Decimal) -> Result<(), TradeError> {
    let expected = quote.marginal_before();
    let actual = (quote.execution_price() - expected) / expected * Decimal::ONE_HUNDRED;
    if actual > max_slippage {
        return Err(TradeError::SlippageExceeded {
            actual,
            max: max_slippage,
        });
    }
    Ok(())
}

/// Slippage of a sell in percent: how far the average received price fell
/// below the marginal price the agent saw when quoting.
fn check_sell_slippage(quote: &Quote, max_slippage: Decimal) -> Result<(), TradeError> {
    let expected = quote.marginal_before();
    let actual = (expected - quote.execution_price()) / expected * Decimal::ONE_HUNDRED;
    if actual > max_slippage {
        return Err(TradeError::SlippageExceeded {
            actual,
            max: max_slippage,
        });
    }
    Ok(())
}
