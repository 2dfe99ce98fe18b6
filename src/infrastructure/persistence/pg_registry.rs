//! PostgreSQL implementation of the URL registry.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgQueryResult};
use sqlx::{Acquire, FromRow, PgExecutor, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

use crate::domain::entities::{RegistryCounts, ShortenedUrl};
use crate::domain::repositories::UrlRegistry;
use crate::error::RegistryError;
use crate::utils::db_error::{UniqueViolation, unique_violation};

/// Idempotent bootstrap of the `urls` table.
///
/// The `ALTER` statements upgrade tables created before owners and tombstones
/// were tracked.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS urls (
        id BIGSERIAL PRIMARY KEY,
        alias TEXT NOT NULL,
        url TEXT NOT NULL,
        userid TEXT,
        is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
        CONSTRAINT urls_url_key UNIQUE (url)
    )
    "#,
    "ALTER TABLE urls ADD COLUMN IF NOT EXISTS userid TEXT",
    "ALTER TABLE urls ADD COLUMN IF NOT EXISTS is_deleted BOOLEAN NOT NULL DEFAULT FALSE",
    "CREATE UNIQUE INDEX IF NOT EXISTS urls_alias_key ON urls (alias)",
    "CREATE INDEX IF NOT EXISTS urls_userid_idx ON urls (userid)",
];

/// Connection pool settings for [`PgRegistry::connect`].
#[derive(Debug, Clone)]
pub struct PgPoolSettings {
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    /// Extra connection attempts after the first one fails.
    pub connect_retries: usize,
}

impl Default for PgPoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
            connect_retries: 3,
        }
    }
}

#[derive(FromRow)]
struct UrlRow {
    alias: String,
    url: String,
    userid: Option<String>,
    is_deleted: bool,
}

impl From<UrlRow> for ShortenedUrl {
    fn from(row: UrlRow) -> Self {
        Self {
            alias: row.alias,
            original_url: row.url,
            owner_id: row.userid.unwrap_or_default(),
            deleted: row.is_deleted,
        }
    }
}

/// PostgreSQL registry.
///
/// The unique constraint on `urls.url` is the only dedup mechanism; violations
/// are translated into [`RegistryError::AlreadyExists`] carrying the winning alias.
pub struct PgRegistry {
    pool: Arc<PgPool>,
}

impl PgRegistry {
    /// Wraps an existing pool and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Database`] if the bootstrap DDL fails.
    pub async fn new(pool: Arc<PgPool>) -> Result<Self, RegistryError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(pool.as_ref()).await?;
        }
        debug!("urls table ready");
        Ok(Self { pool })
    }

    /// Connects with exponential backoff, then bootstraps the schema.
    pub async fn connect(
        database_url: &str,
        settings: &PgPoolSettings,
    ) -> Result<Self, RegistryError> {
        let strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(settings.connect_retries);

        let pool = Retry::start(strategy, || async {
            PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .acquire_timeout(settings.connect_timeout)
                .idle_timeout(settings.idle_timeout)
                .max_lifetime(settings.max_lifetime)
                .connect(database_url)
                .await
                .inspect_err(|e| warn!("Database connection attempt failed: {}", e))
        })
        .await?;

        info!("Connected to database");
        Self::new(Arc::new(pool)).await
    }

    /// Resolves a failed insert into the registry error taxonomy.
    async fn classify_insert_error(&self, e: sqlx::Error, url: &ShortenedUrl) -> RegistryError {
        match unique_violation(&e) {
            Some(UniqueViolation::OriginalUrl) => {
                match self.get_by_original_url(&url.original_url).await {
                    Ok(existing) => RegistryError::already_exists(existing.alias),
                    Err(lookup) => lookup,
                }
            }
            Some(UniqueViolation::Alias) => RegistryError::alias_in_use(&url.alias),
            None => RegistryError::Database(e),
        }
    }
}

async fn insert_url<'e, E: PgExecutor<'e>>(
    executor: E,
    url: &ShortenedUrl,
) -> Result<PgQueryResult, sqlx::Error> {
    let owner = (!url.owner_id.is_empty()).then_some(url.owner_id.as_str());

    sqlx::query("INSERT INTO urls (alias, url, userid) VALUES ($1, $2, $3)")
        .bind(&url.alias)
        .bind(&url.original_url)
        .bind(owner)
        .execute(executor)
        .await
}

#[async_trait]
impl UrlRegistry for PgRegistry {
    async fn store(&self, url: ShortenedUrl) -> Result<(), RegistryError> {
        match insert_url(self.pool.as_ref(), &url).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.classify_insert_error(e, &url).await),
        }
    }

    async fn store_batch(&self, urls: Vec<ShortenedUrl>) -> Result<(), RegistryError> {
        let mut tx = self.pool.begin().await?;

        for url in &urls {
            // A failed statement aborts the whole transaction in PostgreSQL, so
            // every row gets its own savepoint.
            let mut savepoint = tx.begin().await?;
            match insert_url(&mut *savepoint, url).await {
                Ok(_) => savepoint.commit().await?,
                Err(e) => match unique_violation(&e) {
                    Some(violation) => {
                        savepoint.rollback().await?;
                        debug!(alias = %url.alias, ?violation, "Skipping batch entry");
                    }
                    None => return Err(e.into()),
                },
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_by_alias(&self, alias: &str) -> Result<ShortenedUrl, RegistryError> {
        sqlx::query_as::<_, UrlRow>(
            "SELECT alias, url, userid, is_deleted FROM urls WHERE alias = $1",
        )
        .bind(alias)
        .fetch_optional(self.pool.as_ref())
        .await?
        .map(Into::into)
        .ok_or_else(|| RegistryError::not_found(alias))
    }

    async fn get_by_original_url(
        &self,
        original_url: &str,
    ) -> Result<ShortenedUrl, RegistryError> {
        sqlx::query_as::<_, UrlRow>("SELECT alias, url, userid, is_deleted FROM urls WHERE url = $1")
            .bind(original_url)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(Into::into)
            .ok_or_else(|| RegistryError::not_found(original_url))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ShortenedUrl>, RegistryError> {
        if owner_id.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, UrlRow>(
            r#"
            SELECT alias, url, userid, is_deleted
            FROM urls
            WHERE userid = $1
            ORDER BY id
            "#,
        )
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_batch(
        &self,
        owner_id: &str,
        aliases: &[String],
    ) -> Result<(), RegistryError> {
        if owner_id.is_empty() || aliases.is_empty() {
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE urls
            SET is_deleted = TRUE
            WHERE userid = $1 AND alias = ANY($2) AND NOT is_deleted
            "#,
        )
        .bind(owner_id)
        .bind(aliases.to_vec())
        .execute(self.pool.as_ref())
        .await?;

        debug!(owner_id, deleted = result.rows_affected(), "Aliases soft-deleted");
        Ok(())
    }

    async fn count(&self) -> Result<RegistryCounts, RegistryError> {
        let (urls, owners) =
            sqlx::query_as::<_, (i64, i64)>("SELECT COUNT(*), COUNT(DISTINCT userid) FROM urls")
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(RegistryCounts {
            urls: urls as usize,
            owners: owners as usize,
        })
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), RegistryError> {
        self.pool.close().await;
        info!("Database pool closed");
        Ok(())
    }
}
