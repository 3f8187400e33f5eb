//! Application entry point for daily-reminder-bot.
//!
//! Initializes all components and starts the trigger clock.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use daily_reminder_bot::calendar::CalendarProvider;
use daily_reminder_bot::calendar::ChineseCalendar;
use daily_reminder_bot::completion::CompletionClient;
use daily_reminder_bot::completion::openai_client::OpenAiClient;
use daily_reminder_bot::config::Config;
use daily_reminder_bot::delivery::telegram_sink::TelegramSink;
use daily_reminder_bot::logging::setup_logging;
use daily_reminder_bot::repository::Repository;
use daily_reminder_bot::service::Services;
use daily_reminder_bot::task::trigger_clock::ScheduledJob;
use daily_reminder_bot::task::trigger_clock::TriggerClock;
use daily_reminder_bot::weather::qweather_client::QWeatherClient;
use dotenv::dotenv;
use log::debug;
use log::info;
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let init_start = Instant::now();
    let (config, _log_guard) = load_config().await?;

    let db = setup_database(&config, init_start).await?;
    let services = setup_services(&config, db.clone(), init_start)?;
    let clock = setup_clock(&config, &services, init_start)?;

    run(init_start).await?;

    clock.stop()?;
    db.close().await;
    Ok(())
}

async fn load_config() -> Result<(Arc<Config>, WorkerGuard)> {
    let config = Arc::new(Config::new()?);
    let guard = setup_logging(&config)?;
    info!("Starting daily-reminder-bot...");
    Ok((config, guard))
}

async fn setup_database(config: &Config, init_start: Instant) -> Result<Arc<Repository>> {
    debug!("Setting up Database...");
    let db = Arc::new(Repository::new(&config.db_url, &config.db_path).await?);

    info!("Running database migrations...");
    db.run_migrations().await?;
    info!(
        "Database setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );

    Ok(db)
}

fn setup_services(
    config: &Config,
    db: Arc<Repository>,
    init_start: Instant,
) -> Result<Arc<Services>> {
    debug!("Setting up Services...");
    let weather = Arc::new(QWeatherClient::new(config.qweather.clone())?);
    let sink = Arc::new(TelegramSink::new(&config.telegram)?);

    let completion: Option<Arc<dyn CompletionClient>> = if config.openai.enabled {
        info!("AI content enabled with model {}.", config.openai.model);
        Some(Arc::new(OpenAiClient::new(&config.openai)?))
    } else {
        info!("AI content disabled, using templates only.");
        None
    };
    let calendar: Option<Arc<dyn CalendarProvider>> = if config.features.calendar {
        Some(Arc::new(ChineseCalendar::new()))
    } else {
        None
    };

    let services = Services::new(
        db,
        weather,
        sink,
        completion,
        calendar,
        config.openai.max_retries,
    );
    info!(
        "Services setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );
    Ok(Arc::new(services))
}

fn setup_clock(
    config: &Config,
    services: &Services,
    init_start: Instant,
) -> Result<Arc<TriggerClock>> {
    debug!("Setting up Trigger clock...");
    let poll_job = if config.features.warning_monitor {
        Some((
            services.warning.clone() as Arc<dyn ScheduledJob>,
            config.warning_poll_interval,
        ))
    } else {
        info!("Warning monitor disabled.");
        None
    };

    let clock = TriggerClock::new(
        config.timezone,
        services.reminder.clone() as Arc<dyn ScheduledJob>,
        poll_job,
    );
    clock.start()?;
    info!(
        "Trigger clock setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );
    Ok(clock)
}

async fn run(init_start: Instant) -> Result<()> {
    info!(
        "daily-reminder-bot is up in {:.2}s. Press Ctrl+C to stop.",
        init_start.elapsed().as_secs_f64()
    );

    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down.");

    Ok(())
}
