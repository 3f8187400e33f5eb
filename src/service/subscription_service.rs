//! Subscription and todo lifecycle.

use std::sync::Arc;

use chrono::Utc;
use log::info;

use crate::entity::SubscriptionModel;
use crate::entity::TodoModel;
use crate::repository::Repository;
use crate::repository::table::Table;
use crate::service::error::ServiceError;

/// Upper bound on active subscriptions per user.
pub const MAX_ACTIVE_SUBSCRIPTIONS: usize = 5;

/// Longest accepted city name, in characters.
const MAX_CITY_LEN: usize = 64;

pub struct SubscriptionService {
    db: Arc<Repository>,
}

impl SubscriptionService {
    pub fn new(db: Arc<Repository>) -> Self {
        Self { db }
    }

    /// Creates a subscription, or re-activates and updates the existing one for
    /// the same city.
    ///
    /// # Performance
    /// * DB calls: 1 + 1 + 1? + 1
    pub async fn subscribe(
        &self,
        chat_id: i64,
        city: &str,
        reminder_time: &str,
    ) -> Result<SubscribeResult, ServiceError> {
        let city = normalize_city(city)?;
        let reminder_time = normalize_reminder_time(reminder_time)?;
        let user = self.db.user.get_or_create(chat_id).await?;
        let now = Utc::now();

        let existing = self
            .db
            .subscription
            .select_by_user_and_city(user.id, &city)
            .await?;

        let was_active = existing.as_ref().is_some_and(|s| s.active);
        if !was_active {
            let active = self.db.subscription.count_active_by_user(user.id).await?;
            if usize::try_from(active).unwrap_or(usize::MAX) >= MAX_ACTIVE_SUBSCRIPTIONS {
                return Err(ServiceError::SubscriptionLimitReached {
                    limit: MAX_ACTIVE_SUBSCRIPTIONS,
                });
            }
        }

        match existing {
            Some(mut subscription) => {
                subscription.reminder_time = reminder_time;
                subscription.active = true;
                subscription.updated_at = now;
                self.db.subscription.update(&subscription).await?;
                info!(
                    "Updated subscription {} for chat {chat_id} ({}, {}).",
                    subscription.id, subscription.city, subscription.reminder_time
                );
                Ok(SubscribeResult::Updated { subscription })
            }
            None => {
                let mut subscription = SubscriptionModel {
                    user_id: user.id,
                    city,
                    reminder_time,
                    active: true,
                    enable_warning: true,
                    created_at: now,
                    updated_at: now,
                    ..Default::default()
                };
                match self.db.subscription.insert(&subscription).await {
                    Ok(id) => subscription.id = id,
                    Err(e) if e.is_unique_violation() => {
                        return Err(ServiceError::UnexpectedResult {
                            message: format!(
                                "Subscription for {} was created concurrently",
                                subscription.city
                            ),
                        });
                    }
                    Err(e) => return Err(e.into()),
                }
                info!(
                    "Created subscription {} for chat {chat_id} ({}, {}).",
                    subscription.id, subscription.city, subscription.reminder_time
                );
                Ok(SubscribeResult::Created { subscription })
            }
        }
    }

    /// Soft-deletes the active subscription for `city`.
    ///
    /// # Performance
    /// * DB calls: 1 + 1 + 1?
    pub async fn unsubscribe(
        &self,
        chat_id: i64,
        city: &str,
    ) -> Result<UnsubscribeResult, ServiceError> {
        let Some(mut subscription) = self.find_active(chat_id, city).await? else {
            return Ok(UnsubscribeResult::NotSubscribed);
        };
        subscription.active = false;
        subscription.updated_at = Utc::now();
        self.db.subscription.update(&subscription).await?;
        info!("Unsubscribed chat {chat_id} from {}.", subscription.city);
        Ok(UnsubscribeResult::Unsubscribed { subscription })
    }

    /// Toggles hazard notifications. Returns false when no active subscription matches.
    ///
    /// # Performance
    /// * DB calls: 1 + 1 + 1?
    pub async fn set_warning_enabled(
        &self,
        chat_id: i64,
        city: &str,
        enabled: bool,
    ) -> Result<bool, ServiceError> {
        let Some(mut subscription) = self.find_active(chat_id, city).await? else {
            return Ok(false);
        };
        subscription.enable_warning = enabled;
        subscription.updated_at = Utc::now();
        self.db.subscription.update(&subscription).await?;
        Ok(true)
    }

    /// # Performance
    /// * DB calls: 1 + 1?
    pub async fn list_subscriptions(
        &self,
        chat_id: i64,
    ) -> Result<Vec<SubscriptionModel>, ServiceError> {
        match self.db.user.select_by_chat_id(chat_id).await? {
            Some(user) => Ok(self.db.subscription.select_active_by_user(user.id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// # Performance
    /// * DB calls: 1 + 1
    pub async fn add_todo(
        &self,
        subscription_id: i64,
        content: &str,
    ) -> Result<TodoModel, ServiceError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::EmptyTodo);
        }
        self.active_subscription(subscription_id).await?;

        let mut todo = TodoModel {
            subscription_id,
            content: content.to_string(),
            completed: false,
            created_at: Utc::now(),
            ..Default::default()
        };
        todo.id = self.db.todo.insert(&todo).await?;
        Ok(todo)
    }

    /// Marks a todo as done if it belongs to one of `chat_id`'s subscriptions.
    ///
    /// # Performance
    /// * DB calls: 3 + 1
    pub async fn complete_todo(&self, chat_id: i64, todo_id: i64) -> Result<(), ServiceError> {
        self.owned_todo(chat_id, todo_id).await?;
        self.db.todo.mark_completed(todo_id).await?;
        Ok(())
    }

    /// Removes a todo if it belongs to one of `chat_id`'s subscriptions.
    ///
    /// # Performance
    /// * DB calls: 3 + 1
    pub async fn delete_todo(&self, chat_id: i64, todo_id: i64) -> Result<(), ServiceError> {
        self.owned_todo(chat_id, todo_id).await?;
        self.db.todo.delete(&todo_id).await?;
        Ok(())
    }

    /// Loads a todo, reporting someone else's todo as not found.
    async fn owned_todo(&self, chat_id: i64, todo_id: i64) -> Result<TodoModel, ServiceError> {
        let not_found = || ServiceError::TodoNotFound { todo_id };

        let todo = self.db.todo.select(&todo_id).await?.ok_or_else(not_found)?;
        let subscription = self
            .db
            .subscription
            .select(&todo.subscription_id)
            .await?
            .ok_or_else(not_found)?;
        let owner = self
            .db
            .user
            .select_by_chat_id(chat_id)
            .await?
            .ok_or_else(not_found)?;
        if subscription.user_id != owner.id {
            return Err(not_found());
        }
        Ok(todo)
    }

    /// # Performance
    /// * DB calls: 1
    pub async fn list_todos(&self, subscription_id: i64) -> Result<Vec<TodoModel>, ServiceError> {
        Ok(self
            .db
            .todo
            .select_all_by_subscription(subscription_id)
            .await?)
    }

    async fn find_active(
        &self,
        chat_id: i64,
        city: &str,
    ) -> Result<Option<SubscriptionModel>, ServiceError> {
        let city = normalize_city(city)?;
        let Some(user) = self.db.user.select_by_chat_id(chat_id).await? else {
            return Ok(None);
        };
        Ok(self
            .db
            .subscription
            .select_by_user_and_city(user.id, &city)
            .await?
            .filter(|s| s.active))
    }

    async fn active_subscription(
        &self,
        subscription_id: i64,
    ) -> Result<SubscriptionModel, ServiceError> {
        self.db
            .subscription
            .select(&subscription_id)
            .await?
            .filter(|s| s.active)
            .ok_or(ServiceError::SubscriptionNotFound { subscription_id })
    }
}

#[derive(Debug)]
pub enum SubscribeResult {
    Created { subscription: SubscriptionModel },
    Updated { subscription: SubscriptionModel },
}

#[derive(Debug)]
pub enum UnsubscribeResult {
    Unsubscribed { subscription: SubscriptionModel },
    NotSubscribed,
}

/// Accepts `H:MM` or `HH:MM` and returns zero-padded `HH:MM`.
pub fn normalize_reminder_time(raw: &str) -> Result<String, ServiceError> {
    let invalid = || ServiceError::InvalidTime {
        time: raw.to_string(),
    };

    let (hour, minute) = raw.trim().split_once(':').ok_or_else(invalid)?;
    let digits = |s: &str, max_len: usize| {
        !s.is_empty() && s.len() <= max_len && s.bytes().all(|b| b.is_ascii_digit())
    };
    if !digits(hour, 2) || minute.len() != 2 || !digits(minute, 2) {
        return Err(invalid());
    }

    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok(format!("{hour:02}:{minute:02}"))
}

fn normalize_city(raw: &str) -> Result<String, ServiceError> {
    let city = raw.trim();
    if city.is_empty() || city.chars().count() > MAX_CITY_LEN {
        return Err(ServiceError::InvalidCity {
            city: raw.to_string(),
        });
    }
    Ok(city.to_string())
}
