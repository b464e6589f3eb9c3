use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::{Cache, CacheError, CacheResult};

/// Stores values in a single `cache` table of a sqlite database.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    pub async fn open_in_memory() -> CacheResult<SqliteCache> {
        // a single connection, every new in-memory connection is a new database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::migrate(&pool).await?;
        Ok(SqliteCache { pool })
    }

    /// Example: `sqlite:///var/lib/nuki-logger/cache.db3`
    pub async fn open(url: &str) -> CacheResult<SqliteCache> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;
        Self::migrate(&pool).await?;
        Ok(SqliteCache { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn migrate(pool: &SqlitePool) -> CacheResult<()> {
        sqlx::query(
            r#"
        CREATE TABLE IF NOT EXISTS "cache" (
            "key"        TEXT    PRIMARY KEY NOT NULL,
            "value"      BLOB    NOT NULL,
            "updated_at" INTEGER NOT NULL
        )
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

fn map_err(err: sqlx::Error) -> CacheError {
    match err {
        err @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)) => {
            CacheError::Unreachable(err.to_string())
        }
        err => CacheError::Sqlx(err),
    }
}

#[async_trait]
impl Cache for SqliteCache {
    async fn load(&self, key: &str) -> CacheResult<Vec<u8>> {
        let row = sqlx::query(r#"SELECT "value" FROM "cache" WHERE "key" = ?1"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;

        match row {
            Some(row) => Ok(row.try_get::<Vec<u8>, _>("value")?),
            None => Err(CacheError::NotFound(key.to_string())),
        }
    }

    async fn save(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        let updated_at = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            r#"
        INSERT INTO "cache" ("key", "value", "updated_at")
        VALUES (?1, ?2, ?3)
        ON CONFLICT ("key") DO UPDATE SET
            "value" = excluded."value",
            "updated_at" = excluded."updated_at"
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
