//! Database module with SQLite storage and SQLx.

use std::str::FromStr;

use log::debug;
use log::info;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;

use crate::repository::error::DatabaseError;
use crate::repository::table::SubscriptionTable;
use crate::repository::table::TableBase;
use crate::repository::table::TodoTable;
use crate::repository::table::UserTable;
use crate::repository::table::WarningLogTable;

pub mod error;
pub mod store;
pub mod table;

/// Main database struct containing all table handlers.
pub struct Repository {
    pool: SqlitePool,
    pub user: UserTable,
    pub subscription: SubscriptionTable,
    pub todo: TodoTable,
    pub warning_log: WarningLogTable,
}

impl Repository {
    /// Creates a new database connection and initializes table handlers.
    pub async fn new(db_url: &str, db_path: &str) -> Result<Self, DatabaseError> {
        let path = std::path::Path::new(db_path);
        if !path.exists() {
            debug!("Database path {db_path} does not exist. Creating...");
            let created = path
                .parent()
                .map_or(Ok(()), std::fs::create_dir_all)
                .and_then(|_| std::fs::write(path, ""));
            created.map_err(|e| DatabaseError::InternalError {
                message: format!("Failed to create database file {db_path}: {e}"),
            })?;
            info!("Created {db_path}");
        }

        debug!("Connecting to db...");
        let opts = SqliteConnectOptions::from_str(db_url)?.foreign_keys(true);
        let pool = SqlitePool::connect_with(opts).await?;
        info!("Connected to db.");

        Ok(Self {
            user: UserTable::new(pool.clone()),
            subscription: SubscriptionTable::new(pool.clone()),
            todo: TodoTable::new(pool.clone()),
            warning_log: WarningLogTable::new(pool.clone()),
            pool,
        })
    }

    /// Runs database migrations from the migrations directory.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Drops all tables. Use with caution!
    pub async fn drop_all_tables(&self) -> Result<(), DatabaseError> {
        self.warning_log.drop_table().await?;
        self.todo.drop_table().await?;
        self.subscription.drop_table().await?;
        self.user.drop_table().await?;
        Ok(())
    }

    /// Deletes all data from all tables. Use with caution!
    pub async fn delete_all_tables(&self) -> Result<(), DatabaseError> {
        self.warning_log.delete_all().await?;
        self.todo.delete_all().await?;
        self.subscription.delete_all().await?;
        self.user.delete_all().await?;
        Ok(())
    }

    /// Closes the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
