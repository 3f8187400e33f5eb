//! Narrow persistence ports consumed by the schedulers.
//!
//! The dispatcher and the warning monitor only see these traits, so tests can
//! swap the SQLite [`Repository`] for in-memory fakes.

use chrono::DateTime;
use chrono::Utc;

use crate::entity::SubscriptionWithUserRow;
use crate::entity::TodoModel;
use crate::entity::WarningLogModel;
use crate::entity::WarningStatus;
use crate::repository::Repository;
use crate::repository::error::DatabaseError;
use crate::repository::table::Table;

#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Active subscriptions whose local delivery time is `local_time` (`HH:MM`).
    async fn active_subscriptions_due_at(
        &self,
        local_time: &str,
    ) -> Result<Vec<SubscriptionWithUserRow>, DatabaseError>;

    async fn all_active_with_warnings_enabled(
        &self,
    ) -> Result<Vec<SubscriptionWithUserRow>, DatabaseError>;
}

#[async_trait::async_trait]
pub trait TodoStore: Send + Sync {
    async fn incomplete_todos_for(
        &self,
        subscription_id: i64,
    ) -> Result<Vec<TodoModel>, DatabaseError>;
}

#[async_trait::async_trait]
pub trait WarningLogStore: Send + Sync {
    async fn get_by_alert_id(
        &self,
        alert_id: &str,
    ) -> Result<Option<WarningLogModel>, DatabaseError>;

    async fn create(&self, record: &WarningLogModel) -> Result<(), DatabaseError>;

    async fn update_status(
        &self,
        alert_id: &str,
        status: WarningStatus,
        notified_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Removes records that can no longer change: terminal ones notified
    /// before `cutoff` and ones whose validity ended before `cutoff`.
    async fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError>;
}

#[async_trait::async_trait]
impl SubscriptionStore for Repository {
    async fn active_subscriptions_due_at(
        &self,
        local_time: &str,
    ) -> Result<Vec<SubscriptionWithUserRow>, DatabaseError> {
        self.subscription.select_active_due_at(local_time).await
    }

    async fn all_active_with_warnings_enabled(
        &self,
    ) -> Result<Vec<SubscriptionWithUserRow>, DatabaseError> {
        self.subscription.select_active_with_warnings().await
    }
}

#[async_trait::async_trait]
impl TodoStore for Repository {
    async fn incomplete_todos_for(
        &self,
        subscription_id: i64,
    ) -> Result<Vec<TodoModel>, DatabaseError> {
        self.todo
            .select_incomplete_by_subscription(subscription_id)
            .await
    }
}

#[async_trait::async_trait]
impl WarningLogStore for Repository {
    async fn get_by_alert_id(
        &self,
        alert_id: &str,
    ) -> Result<Option<WarningLogModel>, DatabaseError> {
        self.warning_log.select_by_warning_id(alert_id).await
    }

    async fn create(&self, record: &WarningLogModel) -> Result<(), DatabaseError> {
        self.warning_log.insert(record).await?;
        Ok(())
    }

    async fn update_status(
        &self,
        alert_id: &str,
        status: WarningStatus,
        notified_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.warning_log
            .update_status(alert_id, status, notified_at)
            .await
    }

    async fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError> {
        self.warning_log.delete_expired_before(cutoff).await
    }
}
