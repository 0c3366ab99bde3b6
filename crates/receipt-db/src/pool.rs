//! # Database Pool Management
//!
//! Connection pool creation and configuration for PostgreSQL.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Service Startup                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::from_env() ← DATABASE_URL, pool size, timeouts              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │              PgPool                      │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       │ One connection per open sale transaction                       │
//! │       ▼                                                                 │
//! │  Sale on T42 ──► Conn1 ── holds lock(T42, today) until COMMIT          │
//! │  Sale on T42 ──► Conn2 ── waits for the same lock                      │
//! │  Sale on T7  ──► Conn3 ── different key, runs in parallel              │
//! │                                                                         │
//! │  Counter pool (counter_connections) ── CREATE SEQUENCE, own COMMIT     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Session Settings
//! Every pooled connection starts with `lock_timeout` and (optionally)
//! `statement_timeout` set, so a stuck key lock surfaces as
//! `DbError::LockTimeout` instead of hanging a checkout.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::{parse_or, ConfigError};
use crate::error::{DbError, DbResult};
use crate::migrations::{self, MigrationStatus};
use crate::repository::sale::SaleRepository;
use crate::sequencer::ReceiptSequencer;
use crate::store::{PgSaleTransaction, TransactionalStore};

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("postgres://pos@localhost/pos")
///     .max_connections(20)
///     .lock_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum number of connections in the pool.
    /// Default: 10
    pub max_connections: u32,

    /// Connections reserved for counter creation.
    /// Default: 2
    pub counter_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long a checkout waits for a pooled connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Session `lock_timeout`: longest wait for a key lock.
    /// Default: 5 seconds
    pub lock_timeout: Duration,

    /// Session `statement_timeout`. Zero disables it.
    /// Default: disabled
    pub statement_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration for the given URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        DbConfig {
            database_url: database_url.into(),
            max_connections: 10,
            counter_connections: 2,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            lock_timeout: Duration::from_secs(5),
            statement_timeout: Duration::ZERO,
            run_migrations: true,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// ## Environment Variables
    /// - `DATABASE_URL` (required)
    /// - `RECEIPT_DB_MAX_CONNECTIONS` (default 10)
    /// - `RECEIPT_LOCK_TIMEOUT_MS` (default 5000)
    /// - `RECEIPT_STATEMENT_TIMEOUT_MS` (default 0, disabled)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired("DATABASE_URL".to_string()))?;

        let defaults = DbConfig::new(database_url);
        let lock_ms: u64 = parse_or(
            &lookup,
            "RECEIPT_LOCK_TIMEOUT_MS",
            defaults.lock_timeout.as_millis() as u64,
        )?;
        let statement_ms: u64 = parse_or(&lookup, "RECEIPT_STATEMENT_TIMEOUT_MS", 0)?;

        Ok(DbConfig {
            max_connections: parse_or(
                &lookup,
                "RECEIPT_DB_MAX_CONNECTIONS",
                defaults.max_connections,
            )?,
            lock_timeout: Duration::from_millis(lock_ms),
            statement_timeout: Duration::from_millis(statement_ms),
            ..defaults
        })
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the size of the counter-creation pool.
    pub fn counter_connections(mut self, count: u32) -> Self {
        self.counter_connections = count.max(1);
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the key lock timeout.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the statement timeout. Zero disables it.
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Session parameters sent with every new connection.
    fn session_options(&self) -> Vec<(&'static str, String)> {
        vec![
            ("lock_timeout", format!("{}ms", self.lock_timeout.as_millis())),
            (
                "statement_timeout",
                format!("{}ms", self.statement_timeout.as_millis()),
            ),
        ]
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle: pool, migrations and repository access.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    /// The PostgreSQL connection pool.
    pool: PgPool,

    /// Small pool that commits counter DDL apart from sale transactions.
    counter_pool: PgPool,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Parses the URL and applies session timeouts
    /// 2. Creates the sale pool and the counter pool
    /// 3. Runs migrations (if enabled)
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use database handle
    /// * `Err(DbError)` - Connection or migration failed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            max_connections = config.max_connections,
            lock_timeout_ms = config.lock_timeout.as_millis() as u64,
            "Initializing database connection"
        );

        let connect_options = PgConnectOptions::from_str(&config.database_url)
            .map_err(|e| DbError::StorageUnavailable(e.to_string()))?
            .options(config.session_options());

        debug!("Connection options configured");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options.clone())
            .await?;

        let counter_pool = PgPoolOptions::new()
            .max_connections(config.counter_connections)
            .min_connections(0)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_lazy_with(connect_options);

        info!(
            max_connections = config.max_connections,
            counter_connections = config.counter_connections,
            "Database pools created"
        );

        let db = Database { pool, counter_pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// Idempotent: applied migrations are tracked in `_sqlx_migrations`.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Embedded versus applied migrations.
    pub async fn migration_status(&self) -> DbResult<MigrationStatus> {
        migrations::migration_status(&self.pool).await
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The pool counter DDL runs on.
    pub fn counter_pool(&self) -> &PgPool {
        &self.counter_pool
    }

    /// Opens a sale transaction.
    pub async fn begin(&self) -> DbResult<PgSaleTransaction> {
        TransactionalStore::begin(self).await
    }

    /// Returns the sale repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let sales = db.sales(ReceiptSequencer::new(&ReceiptConfig::from_env()?)?);
    /// let recorded = sales.record_sale(new_sale).await?;
    /// ```
    pub fn sales(&self, sequencer: ReceiptSequencer) -> SaleRepository<Database> {
        SaleRepository::new(self.clone(), sequencer)
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail with
    /// `StorageUnavailable`.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
        self.counter_pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
