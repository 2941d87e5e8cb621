//! Curvebook - Bonding-curve settlement engine for autonomous trading arenas.
//!
//! This crate prices and settles buys and sells of tokens that trade on
//! linear bonding curves, keeping balances, positions, and the trade log
//! consistent under concurrent access.
//!
//! # Architecture
//!
//! The crate is a hexagonal core with swappable storage:
//!
//! - **`domain`** - Pure settlement maths and records
//!   - Curve quoting: the quadratic buy solve and its sell inverse
//!   - Weighted-average cost basis and realized/unrealized PnL
//! - **`executor`** - The trade state machine: validate, price, check
//!   slippage, commit atomically, then publish
//! - **`port`** - Traits the core is written against: the store with its
//!   atomic unit, and fire-and-forget event publishers
//! - **`adapter`** - Port implementations: SQLite behind a connection pool,
//!   and an in-memory store for tests
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files with env overrides
//! - [`domain`] - Curve maths, money types, positions, trades, PnL
//! - [`error`] - Error types for the crate
//! - [`executor`] - Buy/sell execution, retries, and event publication
//! - [`port`] - Storage and publisher trait definitions
//! - [`adapter`] - SQLite and in-memory storage implementations
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use curvebook::adapter::sqlite::connection;
//! use curvebook::adapter::sqlite::store::SqliteEngineStore;
//! use curvebook::config::EngineConfig;
//! use curvebook::executor::TradeExecutor;
//! use curvebook::port::PublisherRegistry;
//!
//! fn wire() -> curvebook::error::Result<TradeExecutor<SqliteEngineStore>> {
//!     let config = EngineConfig::load("curvebook.toml")?;
//!     let pool = connection::create_pool(&config.database.url, config.database.max_connections)?;
//!     connection::run_migrations(&pool)?;
//!
//!     let store = Arc::new(SqliteEngineStore::new(pool).with_lock_wait(config.trade.lock_wait()));
//!     let publishers = Arc::new(PublisherRegistry::new());
//!     Ok(TradeExecutor::new(store, publishers, config.trade))
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod port;
