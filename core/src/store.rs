//! Storage abstractions with optimistic concurrency control.
//!
//! Sessions and member accounts are stored as versioned documents. Every write names the
//! version it read; a store rejects the write with [`StoreError::ConcurrencyConflict`] when the
//! document moved on in the meantime. The services build their read-modify-write cycles on
//! top of that check, which is what makes capacity check-and-increment atomic across
//! processes sharing one store.
//!
//! # Implementations
//!
//! - [`InMemorySessionStore`](crate::memory::InMemorySessionStore) /
//!   [`InMemoryEntitlementStore`](crate::memory::InMemoryEntitlementStore): mutex-guarded maps
//! - `PostgresSessionStore` / `PostgresEntitlementStore` (in `studio-postgres`): a `version`
//!   column checked in the `UPDATE ... WHERE` clause
//!
//! A class has at most one session per date and start time. Stores enforce that on insert and
//! on save, so concurrent schedulers cannot both claim a slot.
//!
//! # Dyn Compatibility
//!
//! Methods return [`BoxFuture`] instead of using `async fn` so the stores can be shared as
//! `Arc<dyn SessionStore>` between services.

use crate::error::StoreError;
use crate::types::{ClassId, MemberAccount, MemberId, Session, SessionId, SessionStatus};
use chrono::NaiveDate;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Document version number for optimistic concurrency control.
///
/// Versions start at 0 when a document is inserted and increment by 1 on every save.
///
/// # Examples
///
/// ```
/// use studio_core::store::Version;
///
/// let v0 = Version::INITIAL;
/// assert_eq!(v0.next(), Version::new(1));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version of a freshly inserted document.
    pub const INITIAL: Self = Self(0);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A document together with the version it was read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The document
    pub value: T,
    /// Version the document was read at
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Pair a value with its version
    #[must_use]
    pub const fn new(value: T, version: Version) -> Self {
        Self { value, version }
    }

    /// Drop the version
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Filter for session queries. Empty fields match everything.
///
/// Results are always ordered by date, then start time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionQuery {
    /// Earliest date (inclusive)
    pub from: Option<NaiveDate>,
    /// Latest date (inclusive)
    pub to: Option<NaiveDate>,
    /// Only sessions in this status
    pub status: Option<SessionStatus>,
    /// Only sessions of this class
    pub class_id: Option<ClassId>,
    /// Only sessions taught by this instructor (snapshot name, case-insensitive)
    pub instructor: Option<String>,
    /// Only sessions in which this member holds a non-cancelled registration
    pub member_id: Option<MemberId>,
    /// Only sessions in which this member has any registration, cancelled ones included
    pub any_registration_of: Option<MemberId>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl SessionQuery {
    /// Query matching every session.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a date range (inclusive on both ends).
    #[must_use]
    pub const fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Restrict to dates on or after `from`.
    #[must_use]
    pub const fn starting(mut self, from: NaiveDate) -> Self {
        self.from = Some(from);
        self
    }

    /// Restrict to a status.
    #[must_use]
    pub const fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to a class.
    #[must_use]
    pub const fn for_class(mut self, class_id: ClassId) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Restrict to an instructor.
    #[must_use]
    pub fn for_instructor(mut self, instructor: impl Into<String>) -> Self {
        self.instructor = Some(instructor.into());
        self
    }

    /// Restrict to sessions the member currently holds a seat in.
    #[must_use]
    pub const fn for_member(mut self, member_id: MemberId) -> Self {
        self.member_id = Some(member_id);
        self
    }

    /// Restrict to sessions the member ever registered for.
    #[must_use]
    pub const fn with_registrations_of(mut self, member_id: MemberId) -> Self {
        self.any_registration_of = Some(member_id);
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a session satisfies every filter (the limit is applied separately).
    #[must_use]
    pub fn matches(&self, session: &Session) -> bool {
        self.from.is_none_or(|from| session.date >= from)
            && self.to.is_none_or(|to| session.date <= to)
            && self.status.is_none_or(|status| session.status == status)
            && self.class_id.is_none_or(|class_id| session.class_id == class_id)
            && self
                .instructor
                .as_deref()
                .is_none_or(|name| session.instructor.eq_ignore_ascii_case(name))
            && self
                .member_id
                .is_none_or(|member| session.active_registration(member).is_some())
            && self
                .any_registration_of
                .is_none_or(|member| session.latest_registration(member).is_some())
    }

    /// Sort by date then start time and apply the limit.
    pub fn finish(&self, sessions: &mut Vec<Session>) {
        sessions.sort_by(|a, b| {
            (a.date, a.start_time, a.id).cmp(&(b.date, b.start_time, b.id))
        });
        if let Some(limit) = self.limit {
            sessions.truncate(limit);
        }
    }
}

/// Error for a session whose class, date and start time are already taken by another session.
#[must_use]
pub fn slot_taken(session: &Session) -> StoreError {
    StoreError::Duplicate(format!(
        "slot:{}:{}:{}",
        session.class_id, session.date, session.start_time
    ))
}

/// Storage for scheduled sessions (with their embedded registrations).
pub trait SessionStore: Send + Sync {
    /// Insert a new session at [`Version::INITIAL`].
    ///
    /// # Errors
    ///
    /// - `Duplicate`: a session with this id, or another session of the class at the same date
    ///   and start time, already exists
    /// - `Database` / `Serialization`: storage failure
    fn insert(&self, session: Session) -> BoxFuture<'_, Result<Version, StoreError>>;

    /// Load a session with its current version. `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// - `Database` / `Serialization`: storage failure
    fn load(&self, id: SessionId) -> BoxFuture<'_, Result<Option<Versioned<Session>>, StoreError>>;

    /// Replace a session if it is still at `expected`.
    ///
    /// Returns the new version.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict`: the stored version differs from `expected` or the session is gone
    /// - `Duplicate`: the session was moved onto a slot another session of its class holds
    /// - `Database` / `Serialization`: storage failure
    fn save(
        &self,
        session: Session,
        expected: Version,
    ) -> BoxFuture<'_, Result<Version, StoreError>>;

    /// Remove a session if it is still at `expected`.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict`: the stored version differs from `expected` or the session is gone
    /// - `Database`: storage failure
    fn delete(&self, id: SessionId, expected: Version) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Find sessions matching the query, ordered by date then start time.
    ///
    /// # Errors
    ///
    /// - `Database` / `Serialization`: storage failure
    fn find(&self, query: SessionQuery) -> BoxFuture<'_, Result<Vec<Session>, StoreError>>;
}

/// Storage for member accounts (the entitlement ledger).
pub trait EntitlementStore: Send + Sync {
    /// Load a member's account with its current version. `None` if never written.
    ///
    /// # Errors
    ///
    /// - `Database` / `Serialization`: storage failure
    fn load(
        &self,
        member_id: MemberId,
    ) -> BoxFuture<'_, Result<Option<Versioned<MemberAccount>>, StoreError>>;

    /// Write an account.
    ///
    /// `expected = None` creates the account and fails if it already exists;
    /// `Some(version)` replaces it only if it is still at that version.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict`: version mismatch, or account exists when creating
    /// - `Database` / `Serialization`: storage failure
    fn save(
        &self,
        account: MemberAccount,
        expected: Option<Version>,
    ) -> BoxFuture<'_, Result<Version, StoreError>>;

    /// Ids of all members currently holding a package.
    ///
    /// # Errors
    ///
    /// - `Database` / `Serialization`: storage failure
    fn members_with_package(&self) -> BoxFuture<'_, Result<Vec<MemberId>, StoreError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_next_and_display() {
        assert_eq!(Version::INITIAL.next(), Version::new(1));
        assert_eq!(Version::new(42).value(), 42);
        assert_eq!(format!("{}", Version::new(7)), "7");
    }

    #[test]
    fn empty_query_matches_everything() {
        let query = SessionQuery::all();
        assert_eq!(query.from, None);
        assert_eq!(query.limit, None);
    }
}
