use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use daily_reminder_bot::completion::CompletionClient;
use daily_reminder_bot::completion::CompletionError;
use daily_reminder_bot::delivery::DeliveryError;
use daily_reminder_bot::delivery::DeliverySink;
use daily_reminder_bot::entity::SubscriptionWithUserRow;
use daily_reminder_bot::entity::TodoModel;
use daily_reminder_bot::entity::WarningLogModel;
use daily_reminder_bot::entity::WarningStatus;
use daily_reminder_bot::repository::Repository;
use daily_reminder_bot::repository::error::DatabaseError;
use daily_reminder_bot::repository::store::SubscriptionStore;
use daily_reminder_bot::repository::store::TodoStore;
use daily_reminder_bot::repository::store::WarningLogStore;
use daily_reminder_bot::weather::WeatherProvider;
use daily_reminder_bot::weather::error::WeatherError;
use daily_reminder_bot::weather::model::AirQuality;
use daily_reminder_bot::weather::model::Alert;
use daily_reminder_bot::weather::model::CurrentWeather;
use daily_reminder_bot::weather::model::LifeIndex;
use daily_reminder_bot::weather::model::Location;
use tokio::time::Instant;
use uuid::Uuid;

#[allow(dead_code)]
pub async fn setup_db() -> (Arc<Repository>, PathBuf) {
    let uuid = Uuid::new_v4();
    let db_path = std::env::temp_dir().join(format!("daily-reminder-bot-test-{}.db", uuid));
    let db_url = format!("sqlite://{}", db_path.to_str().unwrap());

    let db = Repository::new(&db_url, db_path.to_str().unwrap())
        .await
        .expect("Failed to create database");

    db.run_migrations().await.expect("Failed to run migrations");

    (Arc::new(db), db_path)
}

#[allow(dead_code)]
pub async fn teardown_db(db_path: PathBuf) {
    if db_path.exists() {
        let _ = std::fs::remove_file(db_path);
    }
}

#[allow(dead_code)]
pub fn subscription(id: i64, chat_id: i64, city: &str, time: &str) -> SubscriptionWithUserRow {
    SubscriptionWithUserRow {
        id,
        user_id: chat_id,
        chat_id,
        city: city.to_string(),
        reminder_time: time.to_string(),
        active: true,
        enable_warning: true,
    }
}

#[allow(dead_code)]
pub fn todo(id: i64, subscription_id: i64, content: &str) -> TodoModel {
    TodoModel {
        id,
        subscription_id,
        content: content.to_string(),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn alert(id: &str, status: &str) -> Alert {
    Alert {
        id: id.to_string(),
        sender: "北京市气象台".to_string(),
        pub_time: "2026-07-01T10:00+08:00".to_string(),
        title: format!("北京市气象台发布暴雨黄色预警 {id}"),
        start_time: "2026-07-01T10:00+08:00".to_string(),
        end_time: "2026-07-02T10:00+08:00".to_string(),
        status: status.to_string(),
        level: "黄色".to_string(),
        severity_color: "Yellow".to_string(),
        type_code: "1003".to_string(),
        type_name: "暴雨".to_string(),
        text: "预计未来6小时有暴雨。".to_string(),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn weather() -> CurrentWeather {
    CurrentWeather {
        temp: "24".into(),
        feels_like: "26".into(),
        text: "多云".into(),
        humidity: "65".into(),
        wind_dir: "东南风".into(),
        wind_scale: "2".into(),
        wind_speed: "8".into(),
    }
}

// MOCK STORE

/// In-memory stand-in for every persistence port.
#[derive(Default)]
#[allow(dead_code)]
pub struct MockStore {
    pub subscriptions: Mutex<Vec<SubscriptionWithUserRow>>,
    pub todos: Mutex<Vec<TodoModel>>,
    pub warning_logs: Mutex<HashMap<String, WarningLogModel>>,
    pub fail_todos: Mutex<bool>,
    pub fail_log_reads: Mutex<HashSet<String>>,
    /// Alert ids whose `create` / `update_status` fail.
    pub fail_log_writes: Mutex<HashSet<String>>,
    pub log_reads: AtomicUsize,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_subscription(&self, sub: SubscriptionWithUserRow) {
        self.subscriptions.lock().unwrap().push(sub);
    }

    pub fn add_todo(&self, todo: TodoModel) {
        self.todos.lock().unwrap().push(todo);
    }

    pub fn status_of(&self, alert_id: &str) -> Option<WarningStatus> {
        self.warning_logs
            .lock()
            .unwrap()
            .get(alert_id)
            .map(|r| r.status)
    }

    pub fn insert_log(&self, record: WarningLogModel) {
        self.warning_logs
            .lock()
            .unwrap()
            .insert(record.warning_id.clone(), record);
    }
}

fn backend_error() -> DatabaseError {
    DatabaseError::InternalError {
        message: "mock failure".to_string(),
    }
}

#[async_trait]
impl SubscriptionStore for MockStore {
    async fn active_subscriptions_due_at(
        &self,
        local_time: &str,
    ) -> Result<Vec<SubscriptionWithUserRow>, DatabaseError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.active && s.reminder_time == local_time)
            .cloned()
            .collect())
    }

    async fn all_active_with_warnings_enabled(
        &self,
    ) -> Result<Vec<SubscriptionWithUserRow>, DatabaseError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.active && s.enable_warning)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TodoStore for MockStore {
    async fn incomplete_todos_for(
        &self,
        subscription_id: i64,
    ) -> Result<Vec<TodoModel>, DatabaseError> {
        if *self.fail_todos.lock().unwrap() {
            return Err(backend_error());
        }
        Ok(self
            .todos
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.subscription_id == subscription_id && !t.completed)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WarningLogStore for MockStore {
    async fn get_by_alert_id(
        &self,
        alert_id: &str,
    ) -> Result<Option<WarningLogModel>, DatabaseError> {
        self.log_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_log_reads.lock().unwrap().contains(alert_id) {
            return Err(backend_error());
        }
        Ok(self.warning_logs.lock().unwrap().get(alert_id).cloned())
    }

    async fn create(&self, record: &WarningLogModel) -> Result<(), DatabaseError> {
        if self.fail_log_writes.lock().unwrap().contains(&record.warning_id) {
            return Err(backend_error());
        }
        let mut logs = self.warning_logs.lock().unwrap();
        if logs.contains_key(&record.warning_id) {
            return Err(DatabaseError::InternalError {
                message: format!("duplicate warning id {}", record.warning_id),
            });
        }
        logs.insert(record.warning_id.clone(), record.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        alert_id: &str,
        status: WarningStatus,
        notified_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        if self.fail_log_writes.lock().unwrap().contains(alert_id) {
            return Err(backend_error());
        }
        if let Some(record) = self.warning_logs.lock().unwrap().get_mut(alert_id) {
            record.status = status;
            record.notified_at = notified_at;
        }
        Ok(())
    }

    async fn purge_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let mut logs = self.warning_logs.lock().unwrap();
        let before = logs.len();
        logs.retain(|_, r| {
            let terminal = r.status.is_terminal() && r.notified_at < cutoff;
            let expired = r.end_time.is_some_and(|end| end < cutoff);
            !(terminal || expired)
        });
        Ok((before - logs.len()) as u64)
    }
}

// MOCK WEATHER

#[derive(Default)]
#[allow(dead_code)]
pub struct MockWeatherState {
    /// Cities the provider knows, by name.
    pub locations: HashMap<String, Location>,
    /// Location ids whose current weather lookup fails.
    pub failing_weather: HashSet<String>,
    pub failing_alerts: HashSet<String>,
    /// Location ids whose alert lookup never returns.
    pub stalled_alerts: HashSet<String>,
    pub alerts: HashMap<String, Vec<Alert>>,
    pub indices: Vec<LifeIndex>,
    pub air: Option<AirQuality>,
    pub fail_optional: bool,
}

#[derive(Default)]
#[allow(dead_code)]
pub struct MockWeather {
    pub state: Mutex<MockWeatherState>,
    pub resolve_calls: AtomicUsize,
    pub alert_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockWeather {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_city(&self, city: &str) {
        let location = Location {
            id: format!("loc-{city}"),
            name: city.to_string(),
            lat: "39.90".to_string(),
            lon: "116.40".to_string(),
        };
        self.state
            .lock()
            .unwrap()
            .locations
            .insert(city.to_string(), location);
    }

    pub fn set_alerts(&self, city: &str, alerts: Vec<Alert>) {
        self.state
            .lock()
            .unwrap()
            .alerts
            .insert(format!("loc-{city}"), alerts);
    }

    pub fn fail_weather(&self, city: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_weather
            .insert(format!("loc-{city}"));
    }

    pub fn fail_alerts(&self, city: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_alerts
            .insert(format!("loc-{city}"));
    }

    pub fn stall_alerts(&self, city: &str) {
        self.state
            .lock()
            .unwrap()
            .stalled_alerts
            .insert(format!("loc-{city}"));
    }

    pub fn set_fail_optional(&self, fail: bool) {
        self.state.lock().unwrap().fail_optional = fail;
    }

    pub fn alert_calls(&self) -> usize {
        self.alert_calls.load(Ordering::SeqCst)
    }
}

fn upstream_error(endpoint: &str) -> WeatherError {
    WeatherError::ApiError {
        endpoint: endpoint.to_string(),
        code: "500".to_string(),
    }
}

#[async_trait]
impl WeatherProvider for MockWeather {
    async fn resolve_location(&self, city: &str) -> Result<Location, WeatherError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .locations
            .get(city)
            .cloned()
            .ok_or_else(|| WeatherError::LocationNotFound {
                city: city.to_string(),
            })
    }

    async fn current_weather(&self, location: &Location) -> Result<CurrentWeather, WeatherError> {
        if self.state.lock().unwrap().failing_weather.contains(&location.id) {
            return Err(upstream_error("weather/now"));
        }
        Ok(weather())
    }

    async fn life_indices(&self, _location: &Location) -> Result<Vec<LifeIndex>, WeatherError> {
        let state = self.state.lock().unwrap();
        if state.fail_optional {
            return Err(upstream_error("indices/1d"));
        }
        Ok(state.indices.clone())
    }

    async fn air_quality(&self, _location: &Location) -> Result<Option<AirQuality>, WeatherError> {
        let state = self.state.lock().unwrap();
        if state.fail_optional {
            return Err(upstream_error("airquality"));
        }
        Ok(state.air.clone())
    }

    async fn active_alerts(&self, location: &Location) -> Result<Vec<Alert>, WeatherError> {
        self.alert_calls.fetch_add(1, Ordering::SeqCst);
        let stalled = self
            .state
            .lock()
            .unwrap()
            .stalled_alerts
            .contains(&location.id);
        if stalled {
            std::future::pending::<()>().await;
        }
        let state = self.state.lock().unwrap();
        if state.failing_alerts.contains(&location.id) {
            return Err(upstream_error("warning/now"));
        }
        Ok(state.alerts.get(&location.id).cloned().unwrap_or_default())
    }
}

// MOCK COMPLETION

/// Completion client that always fails, counting attempts.
#[derive(Default)]
#[allow(dead_code)]
pub struct FailingCompletion {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CompletionClient for FailingCompletion {
    async fn complete(
        &self,
        _system: &str,
        _user: &str,
        _deadline: Instant,
    ) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CompletionError::BadStatus { status: 503 })
    }
}

// MOCK SINK

/// Records every delivered message; chats in `failing` are rejected.
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<(i64, String)>>,
    pub failing: Mutex<HashSet<i64>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, chat_id: i64) {
        self.failing.lock().unwrap().insert(chat_id);
    }

    pub fn messages(&self) -> Vec<(i64, String)> {
        let mut sent = self.sent.lock().unwrap().clone();
        sent.sort();
        sent
    }

    pub fn messages_for(&self, chat_id: i64) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        if self.failing.lock().unwrap().contains(&chat_id) {
            return Err(DeliveryError::Rejected {
                chat_id,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}
