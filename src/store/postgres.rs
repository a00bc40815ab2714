use crate::store::traits::OptionStore;
use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

/// PostgreSQL-backed option store. Everything lives in one `engine_options`
/// table keyed by option name.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the options table if it does not exist. Runtime DDL keeps the
    /// build free of compile-time database access.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS engine_options (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create engine_options table")?;

        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl OptionStore for PostgresStore {
    async fn get_option(&self, name: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM engine_options WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch option")?;

        Ok(row.map(|row| row.get("value")))
    }

    async fn set_option(&self, name: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO engine_options (name, value)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = NOW()
            "#,
        )
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("Failed to upsert option")?;

        Ok(())
    }

    async fn delete_option(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM engine_options WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to delete option")?;

        Ok(result.rows_affected() > 0)
    }
}
