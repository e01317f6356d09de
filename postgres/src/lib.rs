//! `PostgreSQL` storage for Edumarket.
//!
//! [`PgMarketplace`] implements every repository trait from
//! `edumarket-core` over one connection pool. Queries are plain runtime
//! `sqlx` queries; multi-row workflows (purchases, payment fulfillment,
//! withdrawals) each run inside a single transaction and take row locks
//! with `SELECT ... FOR UPDATE` before moving money.
//!
//! # Example
//!
//! ```no_run
//! use edumarket_postgres::{PgMarketplace, PoolSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PgMarketplace::connect(&PoolSettings::new("postgres://localhost/edumarket")).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cart;
mod catalog;
mod commerce;
mod engagement;
mod error;
mod ledger;
mod reports;
mod rows;
mod users;

use edumarket_core::{MarketError, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Database URL
    pub url: String,
    /// Pool upper bound
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// How long to wait for a connection
    pub connect_timeout: Duration,
    /// Idle connections are closed after this long
    pub idle_timeout: Duration,
}

impl PoolSettings {
    /// Settings with the default pool sizes.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// The `PostgreSQL` marketplace store.
#[derive(Clone)]
pub struct PgMarketplace {
    pool: PgPool,
}

impl PgMarketplace {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Storage`] if the database cannot be reached.
    pub async fn connect(settings: &PoolSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout)
            .idle_timeout(settings.idle_timeout)
            .connect(&settings.url)
            .await
            .map_err(|e| MarketError::Storage(format!("Failed to connect to database: {e}")))?;

        tracing::info!(
            max_connections = settings.max_connections,
            min_connections = settings.min_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self::new(pool))
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MarketError::Storage(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}
