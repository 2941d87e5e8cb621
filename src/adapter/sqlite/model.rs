//! Database model types for Diesel ORM, plus their domain conversions.
//!
//! Quantities are stored as BigInt, decimals and timestamps as TEXT.
//! Timestamps use a fixed-width RFC 3339 form so lexicographic order in SQL
//! matches chronological order.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::schema::{agents, positions, tokens, trades};
use crate::domain::curve::CurveParams;
use crate::domain::ids::{AgentId, TokenAddress, TradeId};
use crate::domain::money::{Lamports, SignedLamports, TokenAmount};
use crate::domain::position::Position;
use crate::domain::token::TokenCurve;
use crate::domain::trade::{Trade, TradeDirection};
use crate::error::TradeError;

/// Database row for an agent.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = agents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AgentRow {
    pub id: String,
    pub sol_balance: i64,
    pub created_at: String,
}

/// Database row for a token curve.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = tokens)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TokenRow {
    pub address: String,
    pub base_price: String,
    pub slope: String,
    pub total_supply: i64,
    pub reserve: i64,
    pub created_at: String,
}

/// Database row for a position.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = positions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PositionRow {
    pub agent_id: String,
    pub token_address: String,
    pub amount: i64,
    pub cost_basis: i64,
    pub opened_at: String,
    pub last_trade_at: String,
}

/// Database row for a trade.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = trades)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TradeRow {
    pub id: String,
    pub agent_id: String,
    pub token_address: String,
    pub direction: String,
    pub sol_amount: i64,
    pub token_amount: i64,
    pub execution_price: String,
    pub realized_pnl: Option<i64>,
    pub reasoning: Option<String>,
    pub tx_signature: Option<String>,
    pub executed_at: String,
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> TradeError {
    TradeError::StoreUnavailable(format!("corrupt {what}: {err}"))
}

fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(what: &str, raw: &str) -> Result<DateTime<Utc>, TradeError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| corrupt(what, e))
}

fn encode_amount(what: &str, value: u64) -> Result<i64, TradeError> {
    i64::try_from(value).map_err(|e| corrupt(what, e))
}

fn decode_amount(what: &str, value: i64) -> Result<u64, TradeError> {
    u64::try_from(value).map_err(|e| corrupt(what, e))
}

fn decode_decimal(what: &str, raw: &str) -> Result<Decimal, TradeError> {
    Decimal::from_str(raw).map_err(|e| corrupt(what, e))
}

impl AgentRow {
    pub fn from_domain(
        agent_id: &AgentId,
        balance: Lamports,
        created_at: DateTime<Utc>,
    ) -> Result<Self, TradeError> {
        Ok(Self {
            id: agent_id.as_str().to_string(),
            sol_balance: encode_amount("agent balance", balance.get())?,
            created_at: encode_timestamp(created_at),
        })
    }

    pub fn balance(&self) -> Result<Lamports, TradeError> {
        decode_amount("agent balance", self.sol_balance).map(Lamports::new)
    }
}

impl TokenRow {
    pub fn from_domain(token: &TokenCurve) -> Result<Self, TradeError> {
        Ok(Self {
            address: token.address().as_str().to_string(),
            base_price: token.params().base_price().to_string(),
            slope: token.params().slope().to_string(),
            total_supply: encode_amount("token supply", token.total_supply().get())?,
            reserve: encode_amount("token reserve", token.reserve().get())?,
            created_at: encode_timestamp(token.created_at()),
        })
    }

    pub fn into_domain(self) -> Result<TokenCurve, TradeError> {
        let params = CurveParams::try_new(
            decode_decimal("token base_price", &self.base_price)?,
            decode_decimal("token slope", &self.slope)?,
        )
        .map_err(|e| corrupt("token curve params", e))?;

        Ok(TokenCurve::from_parts(
            TokenAddress::new(self.address),
            params,
            TokenAmount::new(decode_amount("token supply", self.total_supply)?),
            Lamports::new(decode_amount("token reserve", self.reserve)?),
            decode_timestamp("token created_at", &self.created_at)?,
        ))
    }
}

impl PositionRow {
    pub fn from_domain(position: &Position) -> Result<Self, TradeError> {
        Ok(Self {
            agent_id: position.agent_id().as_str().to_string(),
            token_address: position.token_address().as_str().to_string(),
            amount: encode_amount("position amount", position.amount().get())?,
            cost_basis: encode_amount("position cost_basis", position.cost_basis().get())?,
            opened_at: encode_timestamp(position.opened_at()),
            last_trade_at: encode_timestamp(position.last_trade_at()),
        })
    }

    pub fn into_domain(self) -> Result<Position, TradeError> {
        Ok(Position::from_parts(
            AgentId::new(self.agent_id),
            TokenAddress::new(self.token_address),
            TokenAmount::new(decode_amount("position amount", self.amount)?),
            Lamports::new(decode_amount("position cost_basis", self.cost_basis)?),
            decode_timestamp("position opened_at", &self.opened_at)?,
            decode_timestamp("position last_trade_at", &self.last_trade_at)?,
        ))
    }
}

impl TradeRow {
    pub fn from_domain(trade: &Trade) -> Result<Self, TradeError> {
        Ok(Self {
            id: trade.id.to_string(),
            agent_id: trade.agent_id.as_str().to_string(),
            token_address: trade.token_address.as_str().to_string(),
            direction: trade.direction.as_str().to_string(),
            sol_amount: encode_amount("trade sol_amount", trade.sol_amount.get())?,
            token_amount: encode_amount("trade token_amount", trade.token_amount.get())?,
            execution_price: trade.execution_price.to_string(),
            realized_pnl: trade.realized_pnl.map(SignedLamports::get),
            reasoning: trade.reasoning.clone(),
            tx_signature: trade.tx_signature.clone(),
            executed_at: encode_timestamp(trade.executed_at),
        })
    }

    pub fn into_domain(self) -> Result<Trade, TradeError> {
        Ok(Trade {
            id: TradeId::from_str(&self.id).map_err(|e| corrupt("trade id", e))?,
            agent_id: AgentId::new(self.agent_id),
            token_address: TokenAddress::new(self.token_address),
            direction: TradeDirection::from_str(&self.direction)
                .map_err(|e| corrupt("trade direction", e))?,
            sol_amount: Lamports::new(decode_amount("trade sol_amount", self.sol_amount)?),
            token_amount: TokenAmount::new(decode_amount("trade token_amount", self.token_amount)?),
            execution_price: decode_decimal("trade execution_price", &self.execution_price)?,
            realized_pnl: self.realized_pnl.map(SignedLamports::new),
            reasoning: self.reasoning,
            tx_signature: self.tx_signature,
            executed_at: decode_timestamp("trade executed_at", &self.executed_at)?,
        })
    }
}
