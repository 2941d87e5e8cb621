use std::path::PathBuf;

use curvebook::adapter::sqlite::connection::{create_pool, run_migrations, DbPool};
use diesel::prelude::*;
use tempfile::TempDir;

/// Temporary file-backed SQLite database for integration tests.
///
/// The file lives inside a [`TempDir`], so it disappears with the test. Each
/// [`pool`](Self::pool) call opens a fresh pool onto the same file, which is
/// how the reopen tests simulate a restart.
pub struct TempDb {
    _dir: TempDir,
    path: PathBuf,
}

impl TempDb {
    pub fn create(name: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(format!("{name}.db"));
        Self { _dir: dir, path }
    }

    pub fn pool(&self) -> DbPool {
        let url = self.path.to_string_lossy();
        let pool = create_pool(&url, 5).expect("create sqlite pool");
        run_migrations(&pool).expect("run migrations");

        // WAL mode improves concurrent writer behavior in tests.
        {
            let mut conn = pool.get().expect("get sqlite connection");
            diesel::sql_query("PRAGMA journal_mode=WAL")
                .execute(&mut conn)
                .expect("enable WAL mode");
        }

        pool
    }
}
