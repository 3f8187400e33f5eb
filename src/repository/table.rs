//! Database table operations and implementations.

use chrono::DateTime;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteArguments;

use crate::entity::SubscriptionModel;
use crate::entity::SubscriptionWithUserRow;
use crate::entity::TodoModel;
use crate::entity::UserModel;
use crate::entity::WarningLogModel;
use crate::entity::WarningStatus;
use crate::repository::error::DatabaseError;

/// Base table struct providing database pool access.
#[derive(Clone)]
pub struct BaseTable {
    pub pool: SqlitePool,
}

impl BaseTable {
    /// Creates a new base table with the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Base trait for table operations.
#[async_trait::async_trait]
pub trait TableBase {
    /// Creates the table if it doesn't exist.
    async fn create_table(&self) -> Result<(), DatabaseError>;
    /// Drops the table.
    async fn drop_table(&self) -> Result<(), DatabaseError>;
    /// Deletes all rows from the table.
    async fn delete_all(&self) -> Result<(), DatabaseError>;
}

/// Trait for tables with CRUD operations.
#[async_trait::async_trait]
pub trait Table<T, ID>: TableBase {
    async fn select_all(&self) -> Result<Vec<T>, DatabaseError>;
    async fn insert(&self, model: &T) -> Result<ID, DatabaseError>;
    async fn select(&self, id: &ID) -> Result<Option<T>, DatabaseError>;
    async fn update(&self, model: &T) -> Result<(), DatabaseError>;
    async fn delete(&self, id: &ID) -> Result<(), DatabaseError>;
}

/// Helper trait binding model fields onto both query flavours.
pub trait BindParam<'q> {
    fn bind_param<O>(
        self,
        query: sqlx::query::QueryAs<'q, sqlx::Sqlite, O, SqliteArguments<'q>>,
    ) -> sqlx::query::QueryAs<'q, sqlx::Sqlite, O, SqliteArguments<'q>>;
    fn bind_param_q(
        self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>;
}

macro_rules! impl_bind_param {
    ($t:ty) => {
        impl<'q> BindParam<'q> for $t {
            fn bind_param<O>(
                self,
                query: sqlx::query::QueryAs<'q, sqlx::Sqlite, O, SqliteArguments<'q>>,
            ) -> sqlx::query::QueryAs<'q, sqlx::Sqlite, O, SqliteArguments<'q>> {
                query.bind(self)
            }
            fn bind_param_q(
                self,
                query: sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>,
            ) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
                query.bind(self)
            }
        }
    };
}

impl_bind_param!(&'q i64);
impl_bind_param!(&'q bool);
impl_bind_param!(&'q String);
impl_bind_param!(&'q WarningStatus);
impl_bind_param!(&'q DateTime<Utc>);
impl_bind_param!(&'q Option<DateTime<Utc>>);

macro_rules! impl_table {
    (
        $struct_name:ident,
        $model:ty,
        $table:expr,
        $pk:ident,
        $id_type:ty,
        $create_sql:expr,
        $cols:expr,
        $vals:expr,
        $update_set:expr,
        [ $( $field:ident ),+ ]
    ) => {
        #[derive(Clone)]
        pub struct $struct_name {
            base: BaseTable,
        }

        impl $struct_name {
            pub fn new(pool: SqlitePool) -> Self {
                Self {
                    base: BaseTable::new(pool),
                }
            }
        }

        #[async_trait::async_trait]
        impl TableBase for $struct_name {
            async fn create_table(&self) -> Result<(), DatabaseError> {
                sqlx::query($create_sql)
                    .execute(&self.base.pool)
                    .await?;
                Ok(())
            }

            async fn drop_table(&self) -> Result<(), DatabaseError> {
                sqlx::query(concat!("DROP TABLE IF EXISTS ", $table))
                    .execute(&self.base.pool)
                    .await?;
                Ok(())
            }

            async fn delete_all(&self) -> Result<(), DatabaseError> {
                sqlx::query(concat!("DELETE FROM ", $table))
                    .execute(&self.base.pool)
                    .await?;
                Ok(())
            }
        }

        #[async_trait::async_trait]
        impl Table<$model, $id_type> for $struct_name {
            async fn select_all(&self) -> Result<Vec<$model>, DatabaseError> {
                Ok(sqlx::query_as::<_, $model>(concat!("SELECT * FROM ", $table))
                    .fetch_all(&self.base.pool)
                    .await?)
            }

            async fn select(&self, id: &$id_type) -> Result<Option<$model>, DatabaseError> {
                let query = sqlx::query_as::<_, $model>(concat!("SELECT * FROM ", $table, " WHERE ", stringify!($pk), " = ?"));
                let query = BindParam::bind_param(id, query);
                Ok(query.fetch_optional(&self.base.pool).await?)
            }

            async fn insert(&self, model: &$model) -> Result<$id_type, DatabaseError> {
                let mut query = sqlx::query_as(concat!(
                        "INSERT INTO ", $table, " (", $cols, ") VALUES (", $vals, ") RETURNING ", stringify!($pk)
                    ));

                $(
                    query = BindParam::bind_param(&model.$field, query);
                )+

                let row: ($id_type,) = query.fetch_one(&self.base.pool).await?;
                Ok(row.0)
            }

            async fn update(&self, model: &$model) -> Result<(), DatabaseError> {
                let mut query = sqlx::query(concat!(
                        "UPDATE ", $table, " SET ", $update_set, " WHERE ", stringify!($pk), " = ?"
                    ));

                $(
                    query = BindParam::bind_param_q(&model.$field, query);
                )+
                query = BindParam::bind_param_q(&model.$pk, query);

                query.execute(&self.base.pool).await?;
                Ok(())
            }

            async fn delete(&self, id: &$id_type) -> Result<(), DatabaseError> {
                let query = sqlx::query(concat!("DELETE FROM ", $table, " WHERE ", stringify!($pk), " = ?"));
                let query = BindParam::bind_param_q(id, query);
                query.execute(&self.base.pool).await?;
                Ok(())
            }
        }
    };
}

// ============================================================================
// UserTable
// ============================================================================

impl_table!(
    UserTable,
    UserModel,
    "users",
    id,
    i64,
    r#"CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id INTEGER NOT NULL UNIQUE,
        created_at TIMESTAMP NOT NULL
    )"#,
    "chat_id, created_at",
    "?, ?",
    "chat_id = ?, created_at = ?",
    [chat_id, created_at]
);

impl UserTable {
    pub async fn select_by_chat_id(&self, chat_id: i64) -> Result<Option<UserModel>, DatabaseError> {
        Ok(
            sqlx::query_as::<_, UserModel>("SELECT * FROM users WHERE chat_id = ? LIMIT 1")
                .bind(chat_id)
                .fetch_optional(&self.base.pool)
                .await?,
        )
    }

    /// Returns the user for `chat_id`, inserting one on first contact.
    pub async fn get_or_create(&self, chat_id: i64) -> Result<UserModel, DatabaseError> {
        sqlx::query("INSERT OR IGNORE INTO users (chat_id, created_at) VALUES (?, ?)")
            .bind(chat_id)
            .bind(Utc::now())
            .execute(&self.base.pool)
            .await?;
        self.select_by_chat_id(chat_id)
            .await?
            .ok_or_else(|| DatabaseError::InternalError {
                message: format!("User with chat id {chat_id} vanished after insert"),
            })
    }
}

// ============================================================================
// SubscriptionTable
// ============================================================================

impl_table!(
    SubscriptionTable,
    SubscriptionModel,
    "subscriptions",
    id,
    i64,
    r#"CREATE TABLE IF NOT EXISTS subscriptions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        city TEXT NOT NULL,
        reminder_time TEXT NOT NULL,
        active BOOLEAN NOT NULL DEFAULT 1,
        enable_warning BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        UNIQUE(user_id, city),
        FOREIGN KEY (user_id) REFERENCES users(id)
            ON DELETE CASCADE
            ON UPDATE CASCADE
    )"#,
    "user_id, city, reminder_time, active, enable_warning, created_at, updated_at",
    "?, ?, ?, ?, ?, ?, ?",
    "user_id = ?, city = ?, reminder_time = ?, active = ?, enable_warning = ?, created_at = ?, updated_at = ?",
    [
        user_id,
        city,
        reminder_time,
        active,
        enable_warning,
        created_at,
        updated_at
    ]
);

impl SubscriptionTable {
    pub async fn select_by_user_and_city(
        &self,
        user_id: i64,
        city: &str,
    ) -> Result<Option<SubscriptionModel>, DatabaseError> {
        Ok(sqlx::query_as::<_, SubscriptionModel>(
            "SELECT * FROM subscriptions WHERE user_id = ? AND city = ? LIMIT 1",
        )
        .bind(user_id)
        .bind(city)
        .fetch_optional(&self.base.pool)
        .await?)
    }

    pub async fn select_active_by_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<SubscriptionModel>, DatabaseError> {
        Ok(sqlx::query_as::<_, SubscriptionModel>(
            "SELECT * FROM subscriptions WHERE user_id = ? AND active = 1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.base.pool)
        .await?)
    }

    pub async fn count_active_by_user(&self, user_id: i64) -> Result<i64, DatabaseError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE user_id = ? AND active = 1")
                .bind(user_id)
                .fetch_one(&self.base.pool)
                .await?;
        Ok(row.0)
    }

    /// Active subscriptions whose delivery time equals `reminder_time`.
    pub async fn select_active_due_at(
        &self,
        reminder_time: &str,
    ) -> Result<Vec<SubscriptionWithUserRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, SubscriptionWithUserRow>(
            r#"
            SELECT s.id, s.user_id, u.chat_id, s.city, s.reminder_time, s.active, s.enable_warning
            FROM subscriptions s
            JOIN users u ON u.id = s.user_id
            WHERE s.active = 1 AND s.reminder_time = ?
            ORDER BY s.id
            "#,
        )
        .bind(reminder_time)
        .fetch_all(&self.base.pool)
        .await?)
    }

    pub async fn select_active_with_warnings(
        &self,
    ) -> Result<Vec<SubscriptionWithUserRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, SubscriptionWithUserRow>(
            r#"
            SELECT s.id, s.user_id, u.chat_id, s.city, s.reminder_time, s.active, s.enable_warning
            FROM subscriptions s
            JOIN users u ON u.id = s.user_id
            WHERE s.active = 1 AND s.enable_warning = 1
            ORDER BY s.city, s.id
            "#,
        )
        .fetch_all(&self.base.pool)
        .await?)
    }
}

// ============================================================================
// TodoTable
// ============================================================================

impl_table!(
    TodoTable,
    TodoModel,
    "todos",
    id,
    i64,
    r#"CREATE TABLE IF NOT EXISTS todos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subscription_id INTEGER NOT NULL,
        content TEXT NOT NULL,
        completed BOOLEAN NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL,
        FOREIGN KEY (subscription_id) REFERENCES subscriptions(id)
            ON DELETE CASCADE
            ON UPDATE CASCADE
    )"#,
    "subscription_id, content, completed, created_at",
    "?, ?, ?, ?",
    "subscription_id = ?, content = ?, completed = ?, created_at = ?",
    [subscription_id, content, completed, created_at]
);

impl TodoTable {
    pub async fn select_incomplete_by_subscription(
        &self,
        subscription_id: i64,
    ) -> Result<Vec<TodoModel>, DatabaseError> {
        Ok(sqlx::query_as::<_, TodoModel>(
            "SELECT * FROM todos WHERE subscription_id = ? AND completed = 0 ORDER BY id ASC",
        )
        .bind(subscription_id)
        .fetch_all(&self.base.pool)
        .await?)
    }

    pub async fn select_all_by_subscription(
        &self,
        subscription_id: i64,
    ) -> Result<Vec<TodoModel>, DatabaseError> {
        Ok(sqlx::query_as::<_, TodoModel>(
            "SELECT * FROM todos WHERE subscription_id = ? ORDER BY id ASC",
        )
        .bind(subscription_id)
        .fetch_all(&self.base.pool)
        .await?)
    }

    pub async fn mark_completed(&self, id: i64) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE todos SET completed = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.base.pool)
            .await?;
        Ok(())
    }
}

// ============================================================================
// WarningLogTable
// ============================================================================

impl_table!(
    WarningLogTable,
    WarningLogModel,
    "warning_logs",
    id,
    i64,
    r#"CREATE TABLE IF NOT EXISTS warning_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        warning_id TEXT NOT NULL UNIQUE,
        location_id TEXT NOT NULL,
        city TEXT NOT NULL,
        hazard_type TEXT NOT NULL,
        level TEXT NOT NULL,
        title TEXT NOT NULL,
        start_time TIMESTAMP DEFAULT NULL,
        end_time TIMESTAMP DEFAULT NULL,
        status TEXT NOT NULL,
        notified_at TIMESTAMP NOT NULL,
        created_at TIMESTAMP NOT NULL
    )"#,
    "warning_id, location_id, city, hazard_type, level, title, start_time, end_time, status, notified_at, created_at",
    "?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?",
    "warning_id = ?, location_id = ?, city = ?, hazard_type = ?, level = ?, title = ?, start_time = ?, end_time = ?, status = ?, notified_at = ?, created_at = ?",
    [
        warning_id,
        location_id,
        city,
        hazard_type,
        level,
        title,
        start_time,
        end_time,
        status,
        notified_at,
        created_at
    ]
);

impl WarningLogTable {
    pub async fn select_by_warning_id(
        &self,
        warning_id: &str,
    ) -> Result<Option<WarningLogModel>, DatabaseError> {
        Ok(sqlx::query_as::<_, WarningLogModel>(
            "SELECT * FROM warning_logs WHERE warning_id = ? LIMIT 1",
        )
        .bind(warning_id)
        .fetch_optional(&self.base.pool)
        .await?)
    }

    pub async fn update_status(
        &self,
        warning_id: &str,
        status: WarningStatus,
        notified_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE warning_logs SET status = ?, notified_at = ? WHERE warning_id = ?")
            .bind(status)
            .bind(notified_at)
            .bind(warning_id)
            .execute(&self.base.pool)
            .await?;
        Ok(())
    }

    /// Deletes terminal records last notified before `cutoff`, and records of
    /// any status whose validity window ended before `cutoff`.
    pub async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "DELETE FROM warning_logs \
             WHERE (status = ? AND notified_at < ?) \
                OR (end_time IS NOT NULL AND end_time < ?)",
        )
        .bind(WarningStatus::Cancel)
        .bind(cutoff)
        .bind(cutoff)
        .execute(&self.base.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
