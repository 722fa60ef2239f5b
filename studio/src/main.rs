//! Studio booking core walkthrough.
//!
//! Loads configuration, wires the selected storage backend and runs a scripted week of
//! bookings. Set `STUDIO_STORAGE=postgres` and `DATABASE_URL` to run against `PostgreSQL`.

use studio::config::DEFAULT_LOG_FILTER;
use studio::walkthrough;
use studio::{App, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        storage = ?config.storage.backend,
        log_filter = %config.log.filter,
        sweep_interval_secs = ?config.sweep.interval_secs,
        "Configuration loaded"
    );

    studio_core::metrics::describe();
    info!("Starting studio");

    let app = App::build(&config).await?;
    let sweep = config
        .sweep
        .interval()
        .map(|every| app.spawn_expiry_sweep(every));

    let report = walkthrough::run(&app).await?;
    info!(
        sessions = report.sessions_created,
        bookings = report.bookings,
        refused_without_package = report.refused_without_package,
        refused_full = report.refused_full,
        "Walkthrough complete"
    );

    if let Some(handle) = sweep {
        handle.abort();
    }
    Ok(())
}
