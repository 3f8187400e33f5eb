//! Hazard alert monitoring with a per-alert lifecycle against the dedup log.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::DateTime;
use chrono::FixedOffset;
use chrono::Utc;
use futures::future::join_all;
use log::debug;
use log::error;
use log::info;
use log::warn;
use tokio::sync::OwnedMutexGuard;

use crate::delivery::DeliverySink;
use crate::entity::SubscriptionWithUserRow;
use crate::entity::WarningLogModel;
use crate::entity::WarningStatus;
use crate::repository::store::SubscriptionStore;
use crate::repository::store::WarningLogStore;
use crate::service::error::ServiceError;
use crate::service::warning_state::Transition;
use crate::service::warning_state::transition;
use crate::task::runner::NamedTask;
use crate::task::runner::TaskRunner;
use crate::weather::WeatherProvider;
use crate::weather::model::Alert;
use crate::weather::model::Location;

/// Wall-clock bound on one poll cycle across all cities.
pub const CYCLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Bound on fetching and evaluating the alerts of one city.
pub const CITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Dedup records that stopped changing longer ago than this are purged.
pub const LOG_RETENTION_DAYS: i64 = 30;

/// Outcome counters of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub cities: usize,
    pub failed_cities: usize,
    pub alerts_seen: usize,
    pub alerts_notified: usize,
    pub messages_sent: usize,
    pub purged: u64,
}

#[derive(Debug, Default)]
struct CityReport {
    alerts_seen: usize,
    alerts_notified: usize,
    messages_sent: usize,
}

impl CycleSummary {
    fn absorb(&mut self, report: CityReport) {
        self.alerts_seen += report.alerts_seen;
        self.alerts_notified += report.alerts_notified;
        self.messages_sent += report.messages_sent;
    }
}

/// In-process critical section per alert id.
#[derive(Default)]
struct AlertLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AlertLocks {
    async fn lock(&self, alert_id: &str) -> OwnedMutexGuard<()> {
        let entry = self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(alert_id.to_string())
            .or_default()
            .clone();
        entry.lock_owned().await
    }

    /// Drops entries nobody is holding.
    fn prune(&self) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

pub struct WarningService {
    subscriptions: Arc<dyn SubscriptionStore>,
    warning_log: Arc<dyn WarningLogStore>,
    weather: Arc<dyn WeatherProvider>,
    sink: Arc<dyn DeliverySink>,
    runner: Arc<dyn TaskRunner>,
    locks: AlertLocks,
    cycle_timeout: Duration,
    city_timeout: Duration,
}

impl WarningService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        warning_log: Arc<dyn WarningLogStore>,
        weather: Arc<dyn WeatherProvider>,
        sink: Arc<dyn DeliverySink>,
        runner: Arc<dyn TaskRunner>,
    ) -> Self {
        Self {
            subscriptions,
            warning_log,
            weather,
            sink,
            runner,
            locks: AlertLocks::default(),
            cycle_timeout: CYCLE_TIMEOUT,
            city_timeout: CITY_TIMEOUT,
        }
    }

    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = timeout;
        self
    }

    pub fn with_city_timeout(mut self, timeout: Duration) -> Self {
        self.city_timeout = timeout;
        self
    }

    /// Runs one poll cycle bounded by the cycle timeout.
    ///
    /// Hitting the deadline never leaves an alert half-processed: its log entry
    /// is written before any message goes out, and sends already started finish
    /// in the background.
    pub async fn check_and_notify(&self, now: DateTime<Utc>) -> Result<CycleSummary, ServiceError> {
        let summary = tokio::time::timeout(self.cycle_timeout, self.run_cycle(now))
            .await
            .map_err(|_| ServiceError::DeadlineExceeded {
                unit: "warning poll cycle".to_string(),
            })??;
        info!(
            "Warning cycle done: {} cities ({} failed), {} alerts, {} notified, {} messages, {} purged.",
            summary.cities,
            summary.failed_cities,
            summary.alerts_seen,
            summary.alerts_notified,
            summary.messages_sent,
            summary.purged
        );
        Ok(summary)
    }

    async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleSummary, ServiceError> {
        let subs = self
            .subscriptions
            .all_active_with_warnings_enabled()
            .await?;

        let mut by_city: BTreeMap<String, Vec<SubscriptionWithUserRow>> = BTreeMap::new();
        for sub in subs.into_iter().filter(|s| s.active && s.enable_warning) {
            by_city.entry(sub.city.clone()).or_default().push(sub);
        }

        let mut summary = CycleSummary {
            cities: by_city.len(),
            ..Default::default()
        };

        let polls = by_city.iter().map(|(city, subs)| async move {
            let outcome =
                tokio::time::timeout(self.city_timeout, self.poll_city(city, subs, now)).await;
            (city, outcome)
        });
        for (city, outcome) in join_all(polls).await {
            match outcome {
                Ok(Ok(report)) => summary.absorb(report),
                Ok(Err(e)) => {
                    warn!("Skipping warnings for {city}: {e}");
                    summary.failed_cities += 1;
                }
                Err(_) => {
                    warn!(
                        "Polling warnings for {city} timed out after {}s.",
                        self.city_timeout.as_secs()
                    );
                    summary.failed_cities += 1;
                }
            }
        }

        self.locks.prune();

        let cutoff = now - chrono::Duration::days(LOG_RETENTION_DAYS);
        match self.warning_log.purge_expired_before(cutoff).await {
            Ok(purged) => summary.purged = purged,
            Err(e) => error!("Failed to purge warning log: {e}"),
        }

        Ok(summary)
    }

    async fn poll_city(
        &self,
        city: &str,
        subs: &[SubscriptionWithUserRow],
        now: DateTime<Utc>,
    ) -> Result<CityReport, ServiceError> {
        let location = self.weather.resolve_location(city).await?;
        let alerts = self.weather.active_alerts(&location).await?;
        debug!("{} active alerts for {city}.", alerts.len());

        let mut report = CityReport {
            alerts_seen: alerts.len(),
            ..Default::default()
        };
        for alert in &alerts {
            match self.process_alert(city, &location, alert, subs, now).await {
                Ok(Some(sent)) => {
                    report.alerts_notified += 1;
                    report.messages_sent += sent;
                }
                Ok(None) => {}
                Err(e) => error!("Skipping alert {} for {city}: {e}", alert.id),
            }
        }
        Ok(report)
    }

    /// Evaluates one alert. Returns the number of successful sends when it fired.
    ///
    /// A failed log read or write skips the alert for this cycle without
    /// notifying anyone.
    async fn process_alert(
        &self,
        city: &str,
        location: &Location,
        alert: &Alert,
        subs: &[SubscriptionWithUserRow],
        now: DateTime<Utc>,
    ) -> Result<Option<usize>, ServiceError> {
        let Some(observed) = WarningStatus::from_provider(&alert.status) else {
            warn!(
                "Ignoring alert {} with unknown status \"{}\".",
                alert.id, alert.status
            );
            return Ok(None);
        };

        {
            let _guard = self.locks.lock(&alert.id).await;

            let stored = self
                .warning_log
                .get_by_alert_id(&alert.id)
                .await?
                .map(|record| record.status);
            let step: Transition = transition(stored, observed);
            if !step.notifies() {
                debug!("Alert {} unchanged ({}).", alert.id, step.new_status);
                return Ok(None);
            }
            let Transition { action, new_status } = step;
            info!(
                "Alert {} for {city}: {:?} -> {} ({:?}).",
                alert.id, stored, new_status, action
            );

            match stored {
                None => {
                    let record = WarningLogModel {
                        id: 0,
                        warning_id: alert.id.clone(),
                        location_id: location.id.clone(),
                        city: city.to_string(),
                        hazard_type: alert.type_code.clone(),
                        level: alert.level.clone(),
                        title: alert.title.clone(),
                        start_time: parse_provider_time(&alert.start_time),
                        end_time: parse_provider_time(&alert.end_time),
                        status: new_status,
                        notified_at: now,
                        created_at: now,
                    };
                    self.warning_log.create(&record).await?;
                }
                Some(_) => {
                    self.warning_log
                        .update_status(&alert.id, new_status, now)
                        .await?;
                }
            }
        }

        let fan_out = notify_all(
            self.sink.clone(),
            self.runner.clone(),
            subs.to_vec(),
            format_warning_message(city, alert, observed),
            alert.id.clone(),
        );
        let sent = tokio::spawn(fan_out)
            .await
            .map_err(|e| ServiceError::UnexpectedResult {
                message: format!("notifying alert {} did not complete: {e}", alert.id),
            })?;
        Ok(Some(sent))
    }
}

/// Sends `message` to every subscriber individually and concurrently.
async fn notify_all(
    sink: Arc<dyn DeliverySink>,
    runner: Arc<dyn TaskRunner>,
    subs: Vec<SubscriptionWithUserRow>,
    message: String,
    alert_id: String,
) -> usize {
    let message: Arc<str> = Arc::from(message);
    let sent = Arc::new(AtomicUsize::new(0));

    let tasks = subs
        .iter()
        .map(|sub| {
            let sink = sink.clone();
            let message = message.clone();
            let sent = sent.clone();
            let chat_id = sub.chat_id;
            let subscription_id = sub.id;
            NamedTask::new(format!("warning-{alert_id}-{subscription_id}"), async move {
                match sink.send(chat_id, &message).await {
                    Ok(()) => {
                        sent.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        error!("Failed to send warning to subscription {subscription_id}: {e}")
                    }
                }
            })
        })
        .collect();
    runner.run_all(tasks).await;

    sent.load(Ordering::SeqCst)
}

/// Parses provider timestamps such as `2026-07-01T10:00+08:00`.
pub fn parse_provider_time(raw: &str) -> Option<DateTime<Utc>> {
    parse_fixed(raw).map(|t| t.with_timezone(&Utc))
}

fn parse_fixed(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z"))
        .ok()
}

/// Formats a provider timestamp in its own offset, or returns it unchanged.
fn display_time(raw: &str) -> String {
    parse_fixed(raw)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| raw.to_string())
}

pub fn format_warning_message(city: &str, alert: &Alert, observed: WarningStatus) -> String {
    let mut msg = format!(
        "⚠️ {city} 天气预警\n\n{} {}\n发布时间：{}\n",
        alert.severity_emoji(),
        alert.title,
        display_time(&alert.pub_time)
    );

    if !alert.start_time.is_empty() && !alert.end_time.is_empty() {
        msg.push_str(&format!(
            "生效时间：{} - {}\n",
            display_time(&alert.start_time),
            display_time(&alert.end_time)
        ));
    }
    if !alert.sender.is_empty() {
        msg.push_str(&format!("发布单位：{}\n", alert.sender));
    }
    if !alert.text.is_empty() {
        msg.push_str(&format!("\n详情：\n{}\n", alert.text));
    }

    match observed {
        WarningStatus::Cancel => msg.push_str("\n✅ 该预警已解除"),
        WarningStatus::Update => msg.push_str("\n🔄 该预警已更新"),
        WarningStatus::Active => {}
    }
    msg
}
