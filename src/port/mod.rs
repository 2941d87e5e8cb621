//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports define the extension points of the engine. Adapters implement them
//! to bind external systems (the transactional store, event feeds).
//!
//! # Available Ports
//!
//! - [`EngineStore`] / [`TradeUnit`] - Transactional persistence with
//!   per-token atomic scopes
//! - [`EventPublisher`] - Post-commit event broadcasting

mod publisher;
mod store;

// Publisher port
pub use publisher::{
    BuyEvent, EngineEvent, EventPublisher, LogPublisher, NullPublisher, PublisherRegistry,
    SellEvent, TokenCreatedEvent,
};

// Store port
pub use store::{EngineStore, TradeUnit};
