//! Periodic triggers for the reminder dispatcher and the warning monitor.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Timelike;
use chrono::Utc;
use chrono_tz::Tz;
use log::debug;
use log::error;
use log::info;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;

use crate::error::AppError;
use crate::service::reminder_service::ReminderService;
use crate::service::warning_service::WarningService;

pub const MINUTE: Duration = Duration::from_secs(60);

/// Work fired by the clock. Every invocation runs on its own spawned task.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, now: DateTime<Tz>) -> anyhow::Result<()>;
}

struct Schedule {
    job: Arc<dyn ScheduledJob>,
    period: Duration,
    align_to_minute: bool,
}

/// Drives a minute-aligned job and an optional coarser job in one timezone.
pub struct TriggerClock {
    timezone: Tz,
    schedules: Vec<Schedule>,
    running: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TriggerClock {
    pub fn new(
        timezone: Tz,
        minute_job: Arc<dyn ScheduledJob>,
        poll_job: Option<(Arc<dyn ScheduledJob>, Duration)>,
    ) -> Arc<Self> {
        let mut schedules = vec![Schedule {
            job: minute_job,
            period: MINUTE,
            align_to_minute: true,
        }];
        if let Some((job, period)) = poll_job {
            info!("Initializing {} with poll interval {:?}", job.name(), period);
            schedules.push(Schedule {
                job,
                period,
                align_to_minute: false,
            });
        }

        Arc::new(Self {
            timezone,
            schedules,
            running: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Starts every timer loop. Fails if already running or misconfigured.
    pub fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        if let Some(schedule) = self.schedules.iter().find(|s| s.period.is_zero()) {
            return Err(AppError::SchedulerError {
                msg: format!("{} has a zero period", schedule.job.name()),
            }
            .into());
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AppError::SchedulerError {
                msg: "Trigger clock is already running".to_string(),
            }
            .into());
        }

        let handles = (0..self.schedules.len())
            .map(|idx| self.spawn_loop(idx))
            .collect::<Vec<_>>();
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(handles);

        info!("Trigger clock started in timezone {}.", self.timezone);
        Ok(())
    }

    /// Stops the timer loops. Jobs already fired keep running to completion.
    pub fn stop(&self) -> anyhow::Result<()> {
        info!("Stopping trigger clock.");
        self.running.store(false, Ordering::SeqCst);
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            handle.abort();
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn spawn_loop(self: &Arc<Self>, idx: usize) -> JoinHandle<()> {
        let schedule = &self.schedules[idx];
        let start = if schedule.align_to_minute {
            Instant::now() + until_next_minute(Utc::now())
        } else {
            Instant::now()
        };
        let mut interval = tokio::time::interval_at(start, schedule.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let clock = self.clone();
        let job = schedule.job.clone();
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                if !clock.running.load(Ordering::SeqCst) {
                    info!("Stopping {} loop.", job.name());
                    break;
                }
                let now = Utc::now().with_timezone(&clock.timezone);
                let job = job.clone();
                tokio::spawn(async move {
                    debug!("Running {} for {}", job.name(), now.format("%Y-%m-%d %H:%M"));
                    if let Err(e) = job.run(now).await {
                        error!("Error running {}: {e:?}", job.name());
                    }
                });
            }
        })
    }
}

/// Time left until the next wall-clock minute boundary.
pub fn until_next_minute(now: DateTime<Utc>) -> Duration {
    let into_minute = Duration::from_secs(u64::from(now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000));
    if into_minute.is_zero() {
        return Duration::ZERO;
    }
    MINUTE.saturating_sub(into_minute)
}

#[async_trait]
impl ScheduledJob for ReminderService {
    fn name(&self) -> &'static str {
        "ReminderDispatcher"
    }

    async fn run(&self, now: DateTime<Tz>) -> anyhow::Result<()> {
        self.check_due(now).await?;
        Ok(())
    }
}

#[async_trait]
impl ScheduledJob for WarningService {
    fn name(&self) -> &'static str {
        "WarningMonitor"
    }

    async fn run(&self, now: DateTime<Tz>) -> anyhow::Result<()> {
        self.check_and_notify(now.with_timezone(&Utc)).await?;
        Ok(())
    }
}
