//! Application wiring: storage backend, collaborators and the `Studio` facade.
//!
//! The class catalog and member directory are owned by other systems in a full deployment;
//! this shell keeps them in memory so the booking core can run on its own.

use crate::config::{Config, StorageBackend};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use studio_core::environment::{StudioCalendar, StudioEnvironment, SystemClock};
use studio_core::store::{EntitlementStore, SessionStore};
use studio_core::studio::Studio;
use studio_core::{InMemoryEntitlementStore, InMemoryPackageCatalog, InMemorySessionStore};
use studio_postgres::{PostgresEntitlementStore, PostgresSessionStore};
use studio_testing::{InMemoryClassCatalog, InMemoryMemberDirectory};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// A running studio: the facade plus the collaborator catalogs it reads from.
#[derive(Clone)]
pub struct App {
    /// Booking facade
    pub studio: Studio,
    /// Class templates
    pub classes: InMemoryClassCatalog,
    /// Member profiles
    pub members: InMemoryMemberDirectory,
    /// Membership packages
    pub packages: InMemoryPackageCatalog,
    backend: StorageBackend,
    calendar: StudioCalendar,
}

impl App {
    /// Build the application from configuration.
    ///
    /// For the Postgres backend this connects and applies migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached or migrated.
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let (sessions, entitlements) = open_stores(config).await?;

        let classes = InMemoryClassCatalog::new();
        let members = InMemoryMemberDirectory::new();
        let packages = InMemoryPackageCatalog::new();

        let env = StudioEnvironment::new(
            Arc::new(SystemClock),
            sessions,
            entitlements,
            Arc::new(classes.clone()),
            Arc::new(packages.clone()),
            Arc::new(members.clone()),
        )
        .with_calendar(config.booking.calendar())
        .with_retry(config.booking.retry_policy());

        info!(
            backend = ?config.storage.backend,
            utc_offset_minutes = config.booking.utc_offset_minutes,
            cancellation_window_minutes = config.booking.cancellation_window_minutes,
            usage_policy = config.booking.usage_policy.as_str(),
            "Studio ready"
        );

        Ok(Self {
            studio: Studio::new(env, config.booking.policy()),
            classes,
            members,
            packages,
            backend: config.storage.backend,
            calendar: config.booking.calendar(),
        })
    }

    /// Which storage backend this app writes to
    #[must_use]
    pub const fn backend(&self) -> StorageBackend {
        self.backend
    }

    /// The studio's local date right now
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.calendar.today(Utc::now())
    }

    /// Run the expiry sweep every `every` until the returned handle is aborted.
    ///
    /// Expiry stays lazy without this; the sweep only brings stored statuses up to date for
    /// members who have not been looked at in a while.
    #[must_use]
    pub fn spawn_expiry_sweep(&self, every: Duration) -> JoinHandle<()> {
        let expiry = self.studio.expiry().clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match expiry.sweep().await {
                    Ok(report) => info!(
                        checked = report.checked,
                        expired = report.expired,
                        failed = report.failed,
                        "Expiry sweep finished"
                    ),
                    Err(e) => warn!(error = %e, "Expiry sweep failed"),
                }
            }
        })
    }
}

async fn open_stores(
    config: &Config,
) -> anyhow::Result<(Arc<dyn SessionStore>, Arc<dyn EntitlementStore>)> {
    match config.storage.backend {
        StorageBackend::Memory => Ok((
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryEntitlementStore::new()),
        )),
        StorageBackend::Postgres => {
            info!("Connecting to studio database...");
            let pool = studio_postgres::connect(
                &config.storage.database_url,
                &config.storage.pool_settings(),
            )
            .await
            .context("connecting to DATABASE_URL")?;
            studio_postgres::migrate(&pool)
                .await
                .context("applying studio migrations")?;
            Ok((
                Arc::new(PostgresSessionStore::new(pool.clone())),
                Arc::new(PostgresEntitlementStore::new(pool)),
            ))
        },
    }
}
