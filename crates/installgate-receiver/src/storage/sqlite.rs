//! SQLite storage backend
//!
//! Durable storage implementation using SQLite through `sqlx`.
//!
//! # Environment Variables
//!
//! - `INSTALLGATE_DATABASE_URL`: SQLite connection string,
//!   e.g. `sqlite://./installgate.db`

use async_trait::async_trait;
use installgate_core::{AppInfo, InstallationRecord, SharedSecret};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{error, info};

use super::{InstallationStore, StorageError};

const SELECT_COLUMNS: &str = r#"
    SELECT installation_id, org_id, ones_base_url, shared_secret,
           callback_type, time_stamp, app_id, app_version
    FROM install_callbacks
"#;

/// SQLite installation store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `database_url`, creating the database file if missing
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        Self::connect(database_url, 5).await
    }

    /// Connect with an explicit pool size
    ///
    /// In-memory databases (`sqlite::memory:`) exist per connection, so
    /// they need `max_connections = 1` to behave as a single store.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        info!("Connected to SQLite database");

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create from an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS install_callbacks (
                installation_id TEXT PRIMARY KEY NOT NULL,
                org_id TEXT NOT NULL,
                ones_base_url TEXT NOT NULL,
                shared_secret TEXT NOT NULL,
                callback_type TEXT NOT NULL,
                time_stamp INTEGER NOT NULL,
                app_id TEXT,
                app_version TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Get the connection pool for direct access if needed
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn record_from_row(row: &SqliteRow) -> Result<InstallationRecord, StorageError> {
    let get = |column: &str| -> Result<String, StorageError> {
        row.try_get(column)
            .map_err(|e| StorageError::Serialization(format!("{}: {}", column, e)))
    };

    let app_id: Option<String> = row
        .try_get("app_id")
        .map_err(|e| StorageError::Serialization(format!("app_id: {}", e)))?;
    let app_version: Option<String> = row
        .try_get("app_version")
        .map_err(|e| StorageError::Serialization(format!("app_version: {}", e)))?;

    let app = app_id.filter(|id| !id.is_empty()).map(|id| AppInfo {
        id,
        version: app_version.unwrap_or_default(),
    });

    Ok(InstallationRecord {
        installation_id: get("installation_id")?,
        org_id: get("org_id")?,
        ones_base_url: get("ones_base_url")?,
        shared_secret: SharedSecret::new(get("shared_secret")?),
        callback_type: get("callback_type")?,
        time_stamp: row
            .try_get("time_stamp")
            .map_err(|e| StorageError::Serialization(format!("time_stamp: {}", e)))?,
        app,
    })
}

#[async_trait]
impl InstallationStore for SqliteStore {
    async fn upsert(&self, record: InstallationRecord) -> Result<(), StorageError> {
        let (app_id, app_version) = match &record.app {
            Some(app) => (Some(app.id.as_str()), Some(app.version.as_str())),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO install_callbacks (
                installation_id, org_id, ones_base_url, shared_secret,
                callback_type, time_stamp, app_id, app_version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (installation_id) DO UPDATE SET
                org_id = excluded.org_id,
                ones_base_url = excluded.ones_base_url,
                shared_secret = excluded.shared_secret,
                callback_type = excluded.callback_type,
                time_stamp = excluded.time_stamp,
                app_id = excluded.app_id,
                app_version = excluded.app_version
            "#,
        )
        .bind(&record.installation_id)
        .bind(&record.org_id)
        .bind(&record.ones_base_url)
        .bind(record.shared_secret.encoded())
        .bind(&record.callback_type)
        .bind(record.time_stamp)
        .bind(app_id)
        .bind(app_version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(installation_id = %record.installation_id, error = %e, "Failed to save installation");
            StorageError::Database(e.to_string())
        })?;

        info!(
            installation_id = %record.installation_id,
            org_id = %record.org_id,
            callback_type = %record.callback_type,
            "Saved installation to database"
        );
        Ok(())
    }

    async fn insert_if_absent(&self, record: InstallationRecord) -> Result<bool, StorageError> {
        let (app_id, app_version) = match &record.app {
            Some(app) => (Some(app.id.as_str()), Some(app.version.as_str())),
            None => (None, None),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO install_callbacks (
                installation_id, org_id, ones_base_url, shared_secret,
                callback_type, time_stamp, app_id, app_version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (installation_id) DO NOTHING
            "#,
        )
        .bind(&record.installation_id)
        .bind(&record.org_id)
        .bind(&record.ones_base_url)
        .bind(record.shared_secret.encoded())
        .bind(&record.callback_type)
        .bind(record.time_stamp)
        .bind(app_id)
        .bind(app_version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(installation_id = %record.installation_id, error = %e, "Failed to register installation");
            StorageError::Database(e.to_string())
        })?;

        let inserted = result.rows_affected() == 1;
        if inserted {
            info!(
                installation_id = %record.installation_id,
                org_id = %record.org_id,
                callback_type = %record.callback_type,
                "Registered installation in database"
            );
        }
        Ok(inserted)
    }

    async fn get(&self, installation_id: &str) -> Result<InstallationRecord, StorageError> {
        let query = format!("{} WHERE installation_id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(installation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(StorageError::NotFound(installation_id.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<InstallationRecord>, StorageError> {
        let query = format!("{} ORDER BY installation_id", SELECT_COLUMNS);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        rows.iter().map(record_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:", 1).await.unwrap()
    }

    fn record(id: &str, secret: &str, app: Option<AppInfo>) -> InstallationRecord {
        InstallationRecord {
            installation_id: id.to_string(),
            org_id: "org_1".to_string(),
            ones_base_url: "https://ones.example.com".to_string(),
            shared_secret: SharedSecret::new(secret),
            callback_type: "install".to_string(),
            time_stamp: 1_755_065_823,
            app,
        }
    }

    #[tokio::test]
    async fn test_round_trip_with_app() {
        let store = memory_store().await;
        let app = AppInfo {
            id: "app_F63GRnbJR6xINLyK".to_string(),
            version: "1.2.0".to_string(),
        };
        let rec = record("install_1", "c2VjcmV0", Some(app));

        store.upsert(rec.clone()).await.unwrap();
        assert_eq!(store.get("install_1").await.unwrap(), rec);
    }

    #[tokio::test]
    async fn test_missing_is_not_found() {
        let store = memory_store().await;
        assert!(store.get("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_clears_app() {
        let store = memory_store().await;
        let app = AppInfo {
            id: "app_1".to_string(),
            version: "1.0.0".to_string(),
        };
        store.upsert(record("install_1", "czE=", Some(app))).await.unwrap();

        let mut updated = record("install_1", "czI=", None);
        updated.callback_type = "uninstall".to_string();
        updated.time_stamp += 10;
        store.upsert(updated.clone()).await.unwrap();

        assert_eq!(store.get("install_1").await.unwrap(), updated);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_if_absent_never_replaces() {
        let store = memory_store().await;
        assert!(store.insert_if_absent(record("install_1", "czE=", None)).await.unwrap());
        assert!(!store.insert_if_absent(record("install_1", "czI=", None)).await.unwrap());

        assert_eq!(store.get("install_1").await.unwrap().shared_secret.encoded(), "czE=");
    }

    #[tokio::test]
    async fn test_racing_insert_if_absent_has_one_winner() {
        let dir = std::env::temp_dir().join(format!("installgate-race-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        let url = format!("sqlite://{}", dir.join("race.db").display());
        let store = SqliteStore::connect(&url, 4).await.unwrap();

        let (first, second) = tokio::join!(
            store.insert_if_absent(record("install_1", "Zmlyc3Q=", None)),
            store.insert_if_absent(record("install_1", "c2Vjb25k", None)),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(first ^ second);

        let expected = if first { "Zmlyc3Q=" } else { "c2Vjb25k" };
        assert_eq!(store.get("install_1").await.unwrap().shared_secret.encoded(), expected);

        store.pool().close().await;
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_empty_app_id_reads_as_none() {
        let store = memory_store().await;
        sqlx::query(
            r#"
            INSERT INTO install_callbacks (
                installation_id, org_id, ones_base_url, shared_secret,
                callback_type, time_stamp, app_id, app_version
            ) VALUES ('install_legacy', 'org', 'https://ones.example.com', 'czE=', 'install', 1, '', '')
            "#,
        )
        .execute(store.pool())
        .await
        .unwrap();

        assert_eq!(store.get("install_legacy").await.unwrap().app, None);
    }
}
