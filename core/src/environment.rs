//! Injected dependencies.
//!
//! Every service receives its collaborators explicitly rather than reaching for globals:
//! time through [`Clock`], identifiers through [`IdGenerator`], and the external catalogs
//! through [`ClassCatalog`], [`PackageCatalog`] and [`MemberDirectory`]. Tests swap in the
//! doubles from `studio-testing`.

use crate::error::StoreError;
use crate::retry::RetryPolicy;
use crate::store::{EntitlementStore, SessionStore};
use crate::types::{ClassId, ClassInfo, MemberId, MemberProfile, Package, PackageId};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use futures::future::BoxFuture;
use std::sync::Arc;
use uuid::Uuid;

/// Clock trait - abstracts time operations for testability
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Identifier source for new sessions and registrations.
pub trait IdGenerator: Send + Sync {
    /// Produce a fresh identifier
    fn next_uuid(&self) -> Uuid;
}

/// Random v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Converts instants into the studio's local calendar.
///
/// Session dates and times are local wall-clock values; "today" is the local date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudioCalendar {
    offset: FixedOffset,
}

impl StudioCalendar {
    /// Calendar at a fixed UTC offset
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Calendar for a studio running on UTC
    #[must_use]
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Calendar from an offset in minutes east of UTC; `None` if out of range.
    #[must_use]
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }

    /// The UTC offset
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local wall-clock time of an instant
    #[must_use]
    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    /// Local date of an instant
    #[must_use]
    pub fn today(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date()
    }
}

impl Default for StudioCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

/// Class catalog collaborator, consulted only when a session is created.
pub trait ClassCatalog: Send + Sync {
    /// Look up a class template.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be reached.
    fn get_class(&self, class_id: ClassId) -> BoxFuture<'_, Result<Option<ClassInfo>, StoreError>>;
}

/// Package catalog collaborator.
pub trait PackageCatalog: Send + Sync {
    /// Look up the latest revision of a package.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be reached.
    fn get_package(
        &self,
        package_id: PackageId,
    ) -> BoxFuture<'_, Result<Option<Package>, StoreError>>;

    /// Look up one specific revision of a package, as held by a member.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be reached.
    fn get_package_revision(
        &self,
        package_id: PackageId,
        revision: u32,
    ) -> BoxFuture<'_, Result<Option<Package>, StoreError>>;
}

/// Member directory collaborator, consulted to snapshot contact details at registration time.
pub trait MemberDirectory: Send + Sync {
    /// Look up a member.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be reached.
    fn get_member(
        &self,
        member_id: MemberId,
    ) -> BoxFuture<'_, Result<Option<MemberProfile>, StoreError>>;
}

/// Everything the booking services depend on.
///
/// Cloning is cheap: every dependency sits behind an `Arc`.
#[derive(Clone)]
pub struct StudioEnvironment {
    /// Clock for timestamps and "today"
    pub clock: Arc<dyn Clock>,
    /// Identifier source
    pub ids: Arc<dyn IdGenerator>,
    /// Local calendar of the studio
    pub calendar: StudioCalendar,
    /// Session documents
    pub sessions: Arc<dyn SessionStore>,
    /// Member accounts
    pub entitlements: Arc<dyn EntitlementStore>,
    /// Class catalog collaborator
    pub classes: Arc<dyn ClassCatalog>,
    /// Package catalog collaborator
    pub packages: Arc<dyn PackageCatalog>,
    /// Member directory collaborator
    pub members: Arc<dyn MemberDirectory>,
    /// Retry budget for optimistic concurrency conflicts
    pub retry: RetryPolicy,
}

impl StudioEnvironment {
    /// Creates a new `StudioEnvironment` with random ids, a UTC calendar and the default
    /// retry policy.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        sessions: Arc<dyn SessionStore>,
        entitlements: Arc<dyn EntitlementStore>,
        classes: Arc<dyn ClassCatalog>,
        packages: Arc<dyn PackageCatalog>,
        members: Arc<dyn MemberDirectory>,
    ) -> Self {
        Self {
            clock,
            ids: Arc::new(RandomIds),
            calendar: StudioCalendar::utc(),
            sessions,
            entitlements,
            classes,
            packages,
            members,
            retry: RetryPolicy::default(),
        }
    }

    /// Use a different identifier source
    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Use a different local calendar
    #[must_use]
    pub const fn with_calendar(mut self, calendar: StudioCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Use a different retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current instant
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current local date
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.calendar.today(self.clock.now())
    }
}

impl std::fmt::Debug for StudioEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudioEnvironment")
            .field("calendar", &self.calendar)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
