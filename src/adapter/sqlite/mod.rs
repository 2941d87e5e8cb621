//! SQLite persistence adapter.
//!
//! Provides database connection management, schema definitions, Diesel
//! model types, and the SQLite-backed engine store.

pub mod connection;
pub mod model;
pub mod schema;
pub mod store;
