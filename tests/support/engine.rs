use std::sync::Arc;

use curvebook::adapter::sqlite::connection::DbPool;
use curvebook::adapter::sqlite::store::SqliteEngineStore;
use curvebook::config::TradeConfig;
use curvebook::executor::TradeExecutor;
use curvebook::port::PublisherRegistry;

/// An executor over a SQLite store with the default trade config.
pub fn engine(pool: DbPool) -> (TradeExecutor<SqliteEngineStore>, Arc<SqliteEngineStore>) {
    engine_with(pool, TradeConfig::default())
}

/// An executor over a SQLite store with a custom trade config.
pub fn engine_with(
    pool: DbPool,
    config: TradeConfig,
) -> (TradeExecutor<SqliteEngineStore>, Arc<SqliteEngineStore>) {
    let store = Arc::new(SqliteEngineStore::new(pool));
    let executor = TradeExecutor::new(store.clone(), Arc::new(PublisherRegistry::new()), config);
    (executor, store)
}
