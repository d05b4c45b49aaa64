//! Connection pool setup and migration runner (SPEC_FULL.md §3).

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use vestnik_common::error::{Result, VestnikError};

#[derive(Clone)]
pub struct Store {
    pub(crate) pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options: SqliteConnectOptions = database_url
            .parse()
            .map_err(|e: sqlx::Error| VestnikError::Database(e.to_string()))?;
        let options = options.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
    }
}
