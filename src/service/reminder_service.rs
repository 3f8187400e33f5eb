//! Daily reminder dispatch: find due subscriptions and deliver one message each.

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use log::debug;
use log::error;
use log::info;
use log::warn;
use tokio::time::Instant;

use crate::delivery::DeliverySink;
use crate::entity::SubscriptionWithUserRow;
use crate::entity::TodoModel;
use crate::repository::store::SubscriptionStore;
use crate::repository::store::TodoStore;
use crate::service::content_service::ContentService;
use crate::service::content_service::ReminderContextBuilder;
use crate::service::content_service::location_failure_notice;
use crate::service::content_service::weather_failure_notice;
use crate::service::error::ServiceError;
use crate::task::runner::NamedTask;
use crate::task::runner::TaskRunner;
use crate::weather::WeatherProvider;

/// Wall-clock bound on one subscription's pipeline.
pub const PIPELINE_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-subscription pipeline. Cheap to clone into spawned units.
#[derive(Clone)]
struct Pipeline {
    todos: Arc<dyn TodoStore>,
    weather: Arc<dyn WeatherProvider>,
    content: Arc<ContentService>,
    sink: Arc<dyn DeliverySink>,
    timeout: Duration,
}

pub struct ReminderService {
    subscriptions: Arc<dyn SubscriptionStore>,
    runner: Arc<dyn TaskRunner>,
    pipeline: Pipeline,
}

impl ReminderService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        todos: Arc<dyn TodoStore>,
        weather: Arc<dyn WeatherProvider>,
        content: Arc<ContentService>,
        sink: Arc<dyn DeliverySink>,
        runner: Arc<dyn TaskRunner>,
    ) -> Self {
        Self {
            subscriptions,
            runner,
            pipeline: Pipeline {
                todos,
                weather,
                content,
                sink,
                timeout: PIPELINE_TIMEOUT,
            },
        }
    }

    pub fn with_pipeline_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline.timeout = timeout;
        self
    }

    /// Dispatches every active subscription whose delivery time is `now`'s `HH:MM`.
    ///
    /// Returns the number of dispatched subscriptions. Each one runs as its own
    /// unit, so a failing subscription never affects the others.
    pub async fn check_due(&self, now: DateTime<Tz>) -> Result<usize, ServiceError> {
        let local_time = now.format("%H:%M").to_string();
        let due = self
            .subscriptions
            .active_subscriptions_due_at(&local_time)
            .await?;

        if due.is_empty() {
            debug!("No reminders due at {local_time}.");
            return Ok(0);
        }
        info!("Dispatching {} reminders due at {local_time}.", due.len());

        let count = due.len();
        let tasks = due
            .into_iter()
            .map(|sub| {
                let pipeline = self.pipeline.clone();
                NamedTask::new(format!("reminder-{}", sub.id), async move {
                    pipeline.run(sub, now).await;
                })
            })
            .collect();
        self.runner.run_all(tasks).await;

        Ok(count)
    }

    /// Runs one subscription's pipeline to delivery, bounded by the pipeline timeout.
    pub async fn send_one(
        &self,
        sub: &SubscriptionWithUserRow,
        now: DateTime<Tz>,
    ) -> Result<(), ServiceError> {
        let deadline = Instant::now() + self.pipeline.timeout;
        tokio::time::timeout_at(deadline, self.pipeline.deliver(sub, now, deadline))
            .await
            .map_err(|_| ServiceError::DeadlineExceeded {
                unit: format!("reminder for subscription {}", sub.id),
            })?
    }
}

impl Pipeline {
    async fn run(self, sub: SubscriptionWithUserRow, now: DateTime<Tz>) {
        let deadline = Instant::now() + self.timeout;
        match tokio::time::timeout_at(deadline, self.deliver(&sub, now, deadline)).await {
            Ok(Ok(())) => info!("Sent reminder for subscription {} ({}).", sub.id, sub.city),
            Ok(Err(e)) => error!(
                "Failed to send reminder for subscription {} ({}): {}",
                sub.id, sub.city, e
            ),
            Err(_) => error!(
                "Reminder for subscription {} ({}) exceeded {:?}.",
                sub.id, sub.city, self.timeout
            ),
        }
    }

    async fn deliver(
        &self,
        sub: &SubscriptionWithUserRow,
        now: DateTime<Tz>,
        deadline: Instant,
    ) -> Result<(), ServiceError> {
        let message = self.build_message(sub, now, deadline).await?;
        self.sink.send(sub.chat_id, &message).await?;
        Ok(())
    }

    async fn build_message(
        &self,
        sub: &SubscriptionWithUserRow,
        now: DateTime<Tz>,
        deadline: Instant,
    ) -> Result<String, ServiceError> {
        let date = now.date_naive();

        let location = match self.weather.resolve_location(&sub.city).await {
            Ok(location) => location,
            Err(e) => {
                warn!("Failed to resolve location for {}: {}", sub.city, e);
                let todos = self.fetch_todos(sub.id).await;
                return Ok(self.content.render_fallback(
                    date,
                    &location_failure_notice(&sub.city),
                    &todos,
                ));
            }
        };

        let weather = match self.weather.current_weather(&location).await {
            Ok(weather) => weather,
            Err(e) => {
                warn!("Failed to fetch weather for {}: {}", sub.city, e);
                let todos = self.fetch_todos(sub.id).await;
                return Ok(self.content.render_fallback(
                    date,
                    &weather_failure_notice(&sub.city),
                    &todos,
                ));
            }
        };

        let (indices, air, alerts, todos) = tokio::join!(
            self.weather.life_indices(&location),
            self.weather.air_quality(&location),
            self.weather.active_alerts(&location),
            self.fetch_todos(sub.id),
        );
        let indices = indices.unwrap_or_else(|e| {
            warn!("Failed to fetch life indices for {}: {}", sub.city, e);
            Vec::new()
        });
        let air = air.unwrap_or_else(|e| {
            warn!("Failed to fetch air quality for {}: {}", sub.city, e);
            None
        });
        let alerts = alerts.unwrap_or_else(|e| {
            warn!("Failed to fetch alerts for {}: {}", sub.city, e);
            Vec::new()
        });

        let ctx = ReminderContextBuilder::default()
            .city(sub.city.clone())
            .date(date)
            .time(now.format("%H:%M").to_string())
            .weather(weather)
            .life_indices(indices)
            .air_quality(air)
            .alerts(alerts)
            .todos(todos)
            .build()?;

        Ok(self.content.generate(&ctx, deadline).await)
    }

    async fn fetch_todos(&self, subscription_id: i64) -> Vec<TodoModel> {
        self.todos
            .incomplete_todos_for(subscription_id)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to fetch todos for subscription {subscription_id}: {e}");
                Vec::new()
            })
    }
}
