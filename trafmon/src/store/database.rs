use super::TotalsStore;
use crate::config::TrafmonConfig;
use crate::counters::CounterEntry;
use crate::entity::traffic;
use crate::error::{Result, TrafmonError};
use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Rows per INSERT statement; keeps well under SQLite's bound-parameter limit.
const UPSERT_BATCH: usize = 500;

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS traffic (
        username TEXT PRIMARY KEY NOT NULL,
        outgoing BIGINT NOT NULL DEFAULT 0,
        incoming BIGINT NOT NULL DEFAULT 0
    )
"#;

/// Relational store reached through sea-orm (PostgreSQL or SQLite).
///
/// Every call opens its own single-connection pool and closes it afterwards,
/// so an unreachable database only costs the cycle that hit it.
#[derive(Debug, Clone)]
pub struct DatabaseStore {
    database_url: String,
    connect_timeout: Duration,
    operation_timeout: Duration,
    create_schema: bool,
}

impl DatabaseStore {
    pub fn new(database_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            database_url: database_url.into(),
            connect_timeout,
            operation_timeout: connect_timeout * 6,
            create_schema: true,
        }
    }

    pub fn from_config(config: &TrafmonConfig) -> Self {
        Self {
            database_url: config.database_url.clone(),
            connect_timeout: config.db_connect_timeout(),
            operation_timeout: config.db_operation_timeout(),
            create_schema: config.create_schema,
        }
    }

    pub fn with_create_schema(mut self, create_schema: bool) -> Self {
        self.create_schema = create_schema;
        self
    }

    async fn connect(&self) -> Result<DatabaseConnection> {
        let mut options = ConnectOptions::new(self.database_url.clone());
        options
            .max_connections(1)
            .min_connections(0)
            .connect_timeout(self.connect_timeout)
            .acquire_timeout(self.connect_timeout)
            .sqlx_logging(false);
        let db = Database::connect(options).await?;
        Ok(db)
    }

    async fn ensure_schema(&self, db: &DatabaseConnection) -> Result<()> {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            CREATE_TABLE_SQL.to_string(),
        ))
        .await?;
        Ok(())
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.operation_timeout, operation)
            .await
            .map_err(|_| TrafmonError::StoreTimeout(self.operation_timeout))?
    }

    async fn load_inner(&self) -> Result<Vec<CounterEntry>> {
        let db = self.connect().await?;
        if self.create_schema {
            self.ensure_schema(&db).await?;
        }
        let rows = traffic::Entity::find()
            .order_by_asc(traffic::Column::Username)
            .all(&db)
            .await?;
        db.close().await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                debug!("Loaded {}: out={} in={}", row.username, row.outgoing, row.incoming);
                CounterEntry {
                    outgoing: from_column(&row.username, row.outgoing),
                    incoming: from_column(&row.username, row.incoming),
                    username: row.username,
                }
            })
            .collect())
    }

    async fn upsert_inner(&self, entries: &[CounterEntry]) -> Result<u64> {
        let db = self.connect().await?;
        let txn = db.begin().await?;

        let mut written = 0u64;
        for chunk in entries.chunks(UPSERT_BATCH) {
            let models = chunk.iter().map(|entry| {
                debug!("  {} : {}  {}", entry.username, entry.outgoing, entry.incoming);
                traffic::ActiveModel {
                    username: Set(entry.username.clone()),
                    outgoing: Set(to_column(entry.outgoing)),
                    incoming: Set(to_column(entry.incoming)),
                }
            });
            traffic::Entity::insert_many(models)
                .on_conflict(
                    OnConflict::column(traffic::Column::Username)
                        .update_columns([traffic::Column::Outgoing, traffic::Column::Incoming])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
            written += chunk.len() as u64;
        }

        txn.commit().await?;
        db.close().await?;
        Ok(written)
    }
}

#[async_trait]
impl TotalsStore for DatabaseStore {
    #[instrument(skip(self))]
    async fn load_totals(&self) -> Result<Vec<CounterEntry>> {
        let entries = self.bounded(self.load_inner()).await?;
        info!("Loaded persisted totals for {} user(s)", entries.len());
        Ok(entries)
    }

    #[instrument(skip(self, entries), fields(rows = entries.len()))]
    async fn upsert_totals(&self, entries: &[CounterEntry]) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }
        self.bounded(self.upsert_inner(entries)).await
    }
}

fn to_column(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_column(username: &str, value: i64) -> u64 {
    u64::try_from(value).unwrap_or_else(|_| {
        warn!("Negative stored total {} for {}, treating as 0", value, username);
        0
    })
}
