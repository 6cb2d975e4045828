use super::{RegistryStore, StoreError};
use crate::types::{BackendRecord, UptimeSample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::str::FromStr;

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS validators (
        identity TEXT PRIMARY KEY,
        ip_address TEXT NOT NULL,
        port INTEGER NOT NULL,
        endpoint TEXT NOT NULL,
        message TEXT NOT NULL,
        updated_at_ms INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_validators_endpoint ON validators(endpoint);

    CREATE TABLE IF NOT EXISTS users (
        api_key TEXT PRIMARY KEY,
        created_at_ms INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS request_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        api_key TEXT NOT NULL,
        timestamp_ms INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_request_logs_key_ts ON request_logs(api_key, timestamp_ms);

    CREATE TABLE IF NOT EXISTS organic_monitoring (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp_ms INTEGER NOT NULL,
        is_success INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_organic_monitoring_ts ON organic_monitoring(timestamp_ms);
";

/// `SQLite`-backed [`RegistryStore`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `database_url`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the URL is invalid or the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Opens a private in-memory database with the schema applied.
    ///
    /// A single connection is kept alive for the life of the pool, since every new `SQLite`
    /// memory connection starts empty.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the connection or migration fails.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Creates all tables and indexes. Safe to run repeatedly.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if a statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn get_required<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
    {
        row.try_get::<T, _>(column).map_err(|e| StoreError::Decode(format!("column '{column}': {e}")))
    }

    fn row_to_backend(row: &SqliteRow) -> Result<BackendRecord, StoreError> {
        let port: i64 = Self::get_required(row, "port")?;
        let port = u16::try_from(port)
            .map_err(|e| StoreError::Decode(format!("column 'port' value {port}: {e}")))?;

        Ok(BackendRecord {
            identity: Self::get_required(row, "identity")?,
            ip_address: Self::get_required(row, "ip_address")?,
            port,
            endpoint: Self::get_required(row, "endpoint")?,
            message: Self::get_required(row, "message")?,
        })
    }

    fn row_to_sample(row: &SqliteRow) -> Result<UptimeSample, StoreError> {
        let millis: i64 = Self::get_required(row, "timestamp_ms")?;
        let timestamp = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| StoreError::Decode(format!("timestamp {millis} out of range")))?;

        Ok(UptimeSample { timestamp, is_success: Self::get_required(row, "is_success")? })
    }

    fn to_count(value: i64) -> u64 {
        u64::try_from(value).unwrap_or(0)
    }
}

#[async_trait]
impl RegistryStore for SqliteStore {
    async fn upsert_backend(&self, record: &BackendRecord) -> Result<Vec<String>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let evicted = sqlx::query(
            "DELETE FROM validators WHERE endpoint = ? AND identity != ? RETURNING identity",
        )
        .bind(&record.endpoint)
        .bind(&record.identity)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| Self::get_required::<String>(row, "identity"))
        .collect::<Result<Vec<_>, _>>()?;

        sqlx::query(
            r"
            INSERT INTO validators (identity, ip_address, port, endpoint, message, updated_at_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(identity) DO UPDATE SET
                ip_address = excluded.ip_address,
                port = excluded.port,
                endpoint = excluded.endpoint,
                message = excluded.message,
                updated_at_ms = excluded.updated_at_ms
            ",
        )
        .bind(&record.identity)
        .bind(&record.ip_address)
        .bind(i64::from(record.port))
        .bind(&record.endpoint)
        .bind(&record.message)
        .bind(Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(evicted)
    }

    async fn list_backends(&self) -> Result<Vec<BackendRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT identity, ip_address, port, endpoint, message FROM validators ORDER BY identity",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_backend).collect()
    }

    async fn insert_caller(&self, api_key: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO users (api_key, created_at_ms) VALUES (?, ?)")
            .bind(api_key)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn caller_exists(&self, api_key: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 AS found FROM users WHERE api_key = ?")
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn count_events_since(
        &self,
        api_key: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM request_logs WHERE api_key = ? AND timestamp_ms >= ?",
        )
        .bind(api_key)
        .bind(since.timestamp_millis())
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::to_count(Self::get_required(&row, "count")?))
    }

    async fn insert_event(&self, api_key: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO request_logs (api_key, timestamp_ms) VALUES (?, ?)")
            .bind(api_key)
            .bind(at.timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_sample(&self, sample: &UptimeSample) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO organic_monitoring (timestamp_ms, is_success) VALUES (?, ?)")
            .bind(sample.timestamp.timestamp_millis())
            .bind(sample.is_success)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn sample_counts(&self) -> Result<(u64, u64), StoreError> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS total, COALESCE(SUM(is_success), 0) AS successful
            FROM organic_monitoring
            ",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((
            Self::to_count(Self::get_required(&row, "total")?),
            Self::to_count(Self::get_required(&row, "successful")?),
        ))
    }

    async fn recent_samples(&self, limit: u32) -> Result<Vec<UptimeSample>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT timestamp_ms, is_success FROM organic_monitoring
            ORDER BY timestamp_ms DESC, id DESC
            LIMIT ?
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_sample).collect()
    }

    async fn last_failure(&self) -> Result<Option<UptimeSample>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT timestamp_ms, is_success FROM organic_monitoring
            WHERE is_success = 0
            ORDER BY timestamp_ms DESC, id DESC
            LIMIT 1
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_sample).transpose()
    }
}
