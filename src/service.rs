//! Business logic services for daily reminders and hazard warnings.

use std::sync::Arc;

use crate::calendar::CalendarProvider;
use crate::completion::CompletionClient;
use crate::delivery::DeliverySink;
use crate::repository::Repository;
use crate::service::content_service::ContentService;
use crate::service::reminder_service::ReminderService;
use crate::service::subscription_service::SubscriptionService;
use crate::service::warning_service::WarningService;
use crate::task::runner::SpawnedRunner;
use crate::task::runner::TaskRunner;
use crate::weather::WeatherProvider;

pub mod content_service;
pub mod error;
pub mod reminder_service;
pub mod subscription_service;
pub mod warning_service;
pub mod warning_state;

/// Container for all application services.
pub struct Services {
    pub content: Arc<ContentService>,
    pub reminder: Arc<ReminderService>,
    pub warning: Arc<WarningService>,
    pub subscription: Arc<SubscriptionService>,
}

impl Services {
    /// Wires every service against the repository and external collaborators.
    pub fn new(
        db: Arc<Repository>,
        weather: Arc<dyn WeatherProvider>,
        sink: Arc<dyn DeliverySink>,
        completion: Option<Arc<dyn CompletionClient>>,
        calendar: Option<Arc<dyn CalendarProvider>>,
        max_retries: u32,
    ) -> Self {
        let runner: Arc<dyn TaskRunner> = Arc::new(SpawnedRunner);
        let content = Arc::new(ContentService::new(completion, calendar, max_retries));

        let reminder = Arc::new(ReminderService::new(
            db.clone(),
            db.clone(),
            weather.clone(),
            content.clone(),
            sink.clone(),
            runner.clone(),
        ));
        let warning = Arc::new(WarningService::new(
            db.clone(),
            db.clone(),
            weather,
            sink,
            runner,
        ));

        Self {
            content,
            reminder,
            warning,
            subscription: Arc::new(SubscriptionService::new(db)),
        }
    }
}
