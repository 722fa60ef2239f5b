//! Ready-made studio wiring and sample data.

use crate::mocks::{test_clock, FixedClock, InMemoryClassCatalog, InMemoryMemberDirectory};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use studio_core::catalog::{InMemoryPackageCatalog, NewPackage};
use studio_core::environment::{StudioCalendar, StudioEnvironment};
use studio_core::memory::{InMemoryEntitlementStore, InMemorySessionStore};
use studio_core::registry::NewSession;
use studio_core::retry::RetryPolicy;
use studio_core::studio::{BookingPolicy, Studio};
use studio_core::types::{
    Allowance, ClassId, ClassInfo, Difficulty, MemberId, Money, PackageId, Session, TimeRange,
};

/// Local time of day.
///
/// # Panics
///
/// Panics if the hour or minute is out of range.
#[must_use]
#[allow(clippy::expect_used)]
pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time of day")
}

/// Calendar date.
///
/// # Panics
///
/// Panics if the date does not exist.
#[must_use]
#[allow(clippy::expect_used)]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date")
}

/// Local start and end on the same day.
#[must_use]
pub fn slot(start: (u32, u32), end: (u32, u32)) -> TimeRange {
    TimeRange::new(time(start.0, start.1), time(end.0, end.1))
}

/// Parse an RFC 3339 instant.
///
/// # Panics
///
/// Panics if the string is not RFC 3339.
#[must_use]
#[allow(clippy::expect_used)]
pub fn instant(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .expect("RFC 3339 timestamp")
        .with_timezone(&Utc)
}

/// Twenty-seat all-levels flow class.
#[must_use]
pub fn vinyasa() -> ClassInfo {
    ClassInfo {
        name: "Vinyasa Flow".to_string(),
        instructor: "Maya".to_string(),
        difficulty: Difficulty::AllLevels,
        max_capacity: 20,
        active: true,
    }
}

/// Small beginner class, handy for capacity tests.
#[must_use]
pub fn gentle_hatha(max_capacity: u32) -> ClassInfo {
    ClassInfo {
        name: "Gentle Hatha".to_string(),
        instructor: "Ravi".to_string(),
        difficulty: Difficulty::Beginner,
        max_capacity,
        active: true,
    }
}

/// 10 classes in 30 days.
#[must_use]
pub fn ten_class_pass() -> NewPackage {
    NewPackage {
        name: "10-Class Pass".to_string(),
        price: Money::from_cents(15_000),
        duration_days: 30,
        class_allowance: Allowance::Limited(10),
    }
}

/// 5 classes in 30 days.
#[must_use]
pub fn five_class_pass() -> NewPackage {
    NewPackage {
        name: "5-Class Pass".to_string(),
        price: Money::from_cents(8_000),
        duration_days: 30,
        class_allowance: Allowance::Limited(5),
    }
}

/// Unlimited classes for 30 days.
#[must_use]
pub fn unlimited_month() -> NewPackage {
    NewPackage {
        name: "Unlimited Monthly".to_string(),
        price: Money::from_cents(19_900),
        duration_days: 30,
        class_allowance: Allowance::Unlimited,
    }
}

/// A studio wired entirely to in-memory stores and controllable collaborators.
///
/// The fields are public so tests can reach past the [`Studio`] facade, for example to edit a
/// class after sessions were created from it or to move the clock.
#[derive(Clone, Debug)]
pub struct TestStudio {
    /// Controllable clock shared with the environment
    pub clock: FixedClock,
    /// Class catalog double
    pub classes: InMemoryClassCatalog,
    /// Member directory double
    pub members: InMemoryMemberDirectory,
    /// Package catalog
    pub packages: InMemoryPackageCatalog,
    /// Session documents
    pub sessions: InMemorySessionStore,
    /// Member accounts
    pub entitlements: InMemoryEntitlementStore,
    /// Environment handed to every service
    pub env: StudioEnvironment,
    /// Facade under test
    pub studio: Studio,
}

impl TestStudio {
    /// Studio on a UTC calendar at 2024-01-01 08:00 UTC with the default booking policy.
    #[must_use]
    pub fn new() -> Self {
        Self::build(test_clock(), StudioCalendar::utc(), BookingPolicy::default())
    }

    /// Studio whose clock starts at the given RFC 3339 instant.
    #[must_use]
    pub fn at(rfc3339: &str) -> Self {
        Self::build(
            FixedClock::new(instant(rfc3339)),
            StudioCalendar::utc(),
            BookingPolicy::default(),
        )
    }

    /// Rebuild with a different booking policy, keeping all data and the clock.
    #[must_use]
    pub fn with_policy(self, policy: BookingPolicy) -> Self {
        let studio = Studio::new(self.env.clone(), policy);
        Self { studio, ..self }
    }

    /// Rebuild with a different local calendar, keeping all data and the clock.
    #[must_use]
    pub fn with_calendar(self, calendar: StudioCalendar) -> Self {
        let env = self.env.clone().with_calendar(calendar);
        let studio = Studio::new(env.clone(), self.studio.policy());
        Self { env, studio, ..self }
    }

    fn build(clock: FixedClock, calendar: StudioCalendar, policy: BookingPolicy) -> Self {
        let classes = InMemoryClassCatalog::new();
        let members = InMemoryMemberDirectory::new();
        let packages = InMemoryPackageCatalog::new();
        let sessions = InMemorySessionStore::new();
        let entitlements = InMemoryEntitlementStore::new();

        let env = StudioEnvironment::new(
            Arc::new(clock.clone()),
            Arc::new(sessions.clone()),
            Arc::new(entitlements.clone()),
            Arc::new(classes.clone()),
            Arc::new(packages.clone()),
            Arc::new(members.clone()),
        )
        .with_calendar(calendar)
        .with_retry(
            RetryPolicy::builder()
                .max_retries(50)
                .initial_delay(std::time::Duration::from_millis(1))
                .max_delay(std::time::Duration::from_millis(5))
                .build(),
        );
        let studio = Studio::new(env.clone(), policy);

        Self {
            clock,
            classes,
            members,
            packages,
            sessions,
            entitlements,
            env,
            studio,
        }
    }

    /// Local date according to the studio clock
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.env.today()
    }

    /// Move the clock forward by whole days
    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }

    /// Move the clock by minutes
    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }

    /// Add a member to the directory
    #[must_use]
    pub fn add_member(&self, name: &str) -> MemberId {
        self.members.add(name)
    }

    /// Add a class to the class catalog
    #[must_use]
    pub fn add_class(&self, class: ClassInfo) -> ClassId {
        self.classes.add(class)
    }

    /// Add a package to the package catalog.
    ///
    /// # Panics
    ///
    /// Panics if the package is rejected by catalog validation.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn add_package(&self, package: NewPackage) -> PackageId {
        self.packages
            .create_package(package)
            .expect("fixture package should be valid")
            .id
    }

    /// Create a session with the class's default capacity.
    ///
    /// # Panics
    ///
    /// Panics if the session cannot be created.
    pub async fn schedule(&self, class_id: ClassId, on: NaiveDate, times: TimeRange) -> Session {
        self.schedule_with_capacity(class_id, on, times, None).await
    }

    /// Create a session with an explicit capacity.
    ///
    /// # Panics
    ///
    /// Panics if the session cannot be created.
    #[allow(clippy::expect_used)]
    pub async fn schedule_with_capacity(
        &self,
        class_id: ClassId,
        on: NaiveDate,
        times: TimeRange,
        capacity: Option<u32>,
    ) -> Session {
        self.studio
            .registry()
            .create_session(NewSession {
                class_id,
                date: on,
                times,
                capacity,
                notes: None,
            })
            .await
            .expect("fixture session should be created")
    }
}

impl Default for TestStudio {
    fn default() -> Self {
        Self::new()
    }
}
