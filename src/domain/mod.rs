//! Store-agnostic curve settlement domain logic.

pub mod curve;
pub mod error;
pub mod ids;
pub mod money;
pub mod position;
pub mod stats;
pub mod token;
pub mod trade;

// Core domain types
pub use curve::CurveParams;
pub use error::DomainError;
pub use ids::{AgentId, TokenAddress, TradeId};
pub use money::{Lamports, Price, SignedLamports, TokenAmount, LAMPORTS_PER_SOL};
pub use position::{Position, SellOutcome};
pub use stats::{PnlBreakdown, RealizedPnlSummary};
pub use token::{Quote, TokenCurve};
pub use trade::{Trade, TradeDirection};
