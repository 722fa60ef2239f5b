//! Domain types for the studio booking core.
//!
//! This module contains the identifiers, value objects and entities shared by every service:
//! packages, member entitlements, scheduled sessions and their registrations.
//!
//! Status fields are closed enums with explicit transition tables rather than free-form strings,
//! so every state change goes through [`SessionStatus::can_transition_to`] or
//! [`RegistrationStatus::can_transition_to`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a scheduled class session
    SessionId
);
uuid_id!(
    /// Unique identifier for a registration within a session
    RegistrationId
);
uuid_id!(
    /// Unique identifier for a studio member
    MemberId
);
uuid_id!(
    /// Unique identifier for a class template in the class catalog
    ClassId
);
uuid_id!(
    /// Unique identifier for a membership package
    PackageId
);

// ============================================================================
// Value Objects
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// A count of classes that may be unlimited.
///
/// Persisted as a plain integer where `-1` is the unlimited sentinel, which is how both the
/// package allowance and the ledger's raw remaining counter are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Allowance {
    /// A finite number of classes
    Limited(u32),
    /// No limit
    Unlimited,
}

impl Allowance {
    /// Sentinel used by the persisted representation for [`Allowance::Unlimited`].
    pub const UNLIMITED_SENTINEL: i64 = -1;

    /// No classes left.
    pub const ZERO: Self = Self::Limited(0);

    /// Decode the persisted integer form.
    ///
    /// # Errors
    ///
    /// Returns an error for negative values other than `-1` or values beyond `u32::MAX`.
    pub fn from_sentinel(value: i64) -> Result<Self, InvalidAllowance> {
        if value == Self::UNLIMITED_SENTINEL {
            return Ok(Self::Unlimited);
        }
        u32::try_from(value)
            .map(Self::Limited)
            .map_err(|_| InvalidAllowance(value))
    }

    /// Encode into the persisted integer form (`-1` for unlimited).
    #[must_use]
    pub fn as_sentinel(self) -> i64 {
        match self {
            Self::Limited(n) => i64::from(n),
            Self::Unlimited => Self::UNLIMITED_SENTINEL,
        }
    }

    /// Whether this allowance has no limit.
    #[must_use]
    pub const fn is_unlimited(self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// Whether at least one class is available.
    #[must_use]
    pub const fn has_remaining(self) -> bool {
        match self {
            Self::Limited(n) => n > 0,
            Self::Unlimited => true,
        }
    }

    /// Add two allowances; unlimited absorbs anything.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Limited(a), Self::Limited(b)) => Self::Limited(a.saturating_add(b)),
            _ => Self::Unlimited,
        }
    }

    /// Allowance left after `used` classes, floored at zero.
    #[must_use]
    pub const fn remaining_after(self, used: u32) -> Self {
        match self {
            Self::Limited(n) => Self::Limited(n.saturating_sub(used)),
            Self::Unlimited => Self::Unlimited,
        }
    }
}

impl TryFrom<i64> for Allowance {
    type Error = InvalidAllowance;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_sentinel(value)
    }
}

impl From<Allowance> for i64 {
    fn from(allowance: Allowance) -> Self {
        allowance.as_sentinel()
    }
}

impl fmt::Display for Allowance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{n}"),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Error decoding an [`Allowance`] from its integer form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid class allowance {0}: expected a non-negative count or -1 for unlimited")]
pub struct InvalidAllowance(pub i64);

/// Difficulty level copied from the class template
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Difficulty {
    /// Suitable for newcomers
    Beginner,
    /// Some practice expected
    Intermediate,
    /// Experienced practitioners
    Advanced,
    /// Open to everyone
    AllLevels,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::AllLevels => "all-levels",
        };
        f.write_str(label)
    }
}

/// Start and end of a session on its day, in studio-local time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Local start time
    pub start: NaiveTime,
    /// Local end time
    pub end: NaiveTime,
}

impl TimeRange {
    /// Creates a new `TimeRange` without validation
    #[must_use]
    pub const fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// A range is valid when it ends strictly after it starts (no overnight sessions).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }
}

// ============================================================================
// Status Enums
// ============================================================================

/// Lifecycle of a scheduled session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    /// Open for registration
    Scheduled,
    /// Took place
    Completed,
    /// Called off by the studio
    Cancelled,
}

impl SessionStatus {
    /// Administrative transitions: only `scheduled` may move, and only forward.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Scheduled, Self::Completed | Self::Cancelled) => true,
            (Self::Scheduled | Self::Completed | Self::Cancelled, _) => false,
        }
    }

    /// String form used in storage and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationStatus {
    /// Holding a seat
    Confirmed,
    /// Released the seat
    Cancelled,
    /// Came to class
    Attended,
    /// Held a seat but did not come
    NoShow,
}

impl RegistrationStatus {
    /// `confirmed` is the only non-terminal state; it may move to any terminal state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Confirmed, Self::Cancelled | Self::Attended | Self::NoShow) => true,
            (Self::Confirmed | Self::Cancelled | Self::Attended | Self::NoShow, _) => false,
        }
    }

    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Confirmed)
    }

    /// Non-cancelled registrations occupy a seat
    #[must_use]
    pub const fn occupies_seat(self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// String form used in storage and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Attended => "attended",
            Self::NoShow => "no-show",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standing of a member's membership
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MembershipStatus {
    /// Holding a valid package
    Active,
    /// No package, or deactivated by staff
    Inactive,
    /// Temporarily blocked by staff
    Suspended,
    /// Package validity elapsed
    Expired,
}

impl MembershipStatus {
    /// String form used in storage and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Package Catalog
// ============================================================================

/// A purchasable entitlement plan.
///
/// Catalog entries are never mutated by the booking core. Administrative edits produce a new
/// `revision` of the same package id; earlier revisions stay resolvable for the members who
/// bought them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package ID
    pub id: PackageId,
    /// Display name
    pub name: String,
    /// Price
    pub price: Money,
    /// Length of the validity window in days
    pub duration_days: u32,
    /// Number of classes granted
    pub class_allowance: Allowance,
    /// Whether the package can currently be sold
    pub active: bool,
    /// Incremented on every administrative edit
    pub revision: u32,
}

// ============================================================================
// Entitlement Ledger
// ============================================================================

/// The package a member currently holds and the day it started.
///
/// Keeping the id and start date together makes "start date is set iff package is set"
/// unrepresentable to violate. The holding is pinned to the catalog revision that was bought,
/// so later catalog edits do not change an existing holder's window or allowance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageHolding {
    /// Held package
    pub package_id: PackageId,
    /// Catalog revision of the held package
    pub revision: u32,
    /// Local calendar date the package was assigned or last renewed
    pub start_date: NaiveDate,
}

/// A member's entitlement bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Current package, if any
    pub holding: Option<PackageHolding>,
    /// Secondary counter kept loosely in sync by renewal and expiry; not authoritative
    pub raw_remaining_classes: Allowance,
    /// Membership standing
    pub membership_status: MembershipStatus,
}

impl Entitlement {
    /// Entitlement of a member who has never held a package.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            holding: None,
            raw_remaining_classes: Allowance::ZERO,
            membership_status: MembershipStatus::Inactive,
        }
    }

    /// Currently held package id
    #[must_use]
    pub fn package_id(&self) -> Option<PackageId> {
        self.holding.map(|h| h.package_id)
    }

    /// Catalog revision of the currently held package
    #[must_use]
    pub fn package_revision(&self) -> Option<u32> {
        self.holding.map(|h| h.revision)
    }

    /// Date the current package started
    #[must_use]
    pub fn package_start_date(&self) -> Option<NaiveDate> {
        self.holding.map(|h| h.start_date)
    }
}

impl Default for Entitlement {
    fn default() -> Self {
        Self::empty()
    }
}

/// The ledger document stored per member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAccount {
    /// Member this account belongs to
    pub member_id: MemberId,
    /// Entitlement state
    pub entitlement: Entitlement,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl MemberAccount {
    /// Creates an account with an empty entitlement
    #[must_use]
    pub const fn new(member_id: MemberId, now: DateTime<Utc>) -> Self {
        Self {
            member_id,
            entitlement: Entitlement::empty(),
            updated_at: now,
        }
    }
}

// ============================================================================
// Collaborator Snapshots
// ============================================================================

/// Class template as returned by the class catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Class name
    pub name: String,
    /// Teaching instructor
    pub instructor: String,
    /// Difficulty level
    pub difficulty: Difficulty,
    /// Default capacity for new sessions
    pub max_capacity: u32,
    /// Whether the class is offered
    pub active: bool,
}

/// Member contact details as returned by the member directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
}

// ============================================================================
// Session Registry
// ============================================================================

/// One member's claim on one seat in one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Registration ID
    pub id: RegistrationId,
    /// Owning session
    pub session_id: SessionId,
    /// Registered member
    pub member_id: MemberId,
    /// Member name at registration time
    pub member_name: String,
    /// Member email at registration time
    pub member_email: String,
    /// Current status
    pub status: RegistrationStatus,
    /// When the seat was claimed
    pub registered_at: DateTime<Utc>,
    /// When the registration was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
    /// When attendance was recorded as attended
    pub attended_at: Option<DateTime<Utc>>,
    /// Free-form notes
    pub notes: Option<String>,
}

/// A scheduled occurrence of a class.
///
/// `class_name`, `instructor`, `difficulty` and each registration's member fields are snapshots
/// taken when written. Later catalog or directory edits do not flow back into them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID
    pub id: SessionId,
    /// Class template this session was created from
    pub class_id: ClassId,
    /// Class name snapshot
    pub class_name: String,
    /// Instructor snapshot
    pub instructor: String,
    /// Difficulty snapshot
    pub difficulty: Difficulty,
    /// Local date
    pub date: NaiveDate,
    /// Local start time
    pub start_time: NaiveTime,
    /// Local end time
    pub end_time: NaiveTime,
    /// Seats available in total
    pub capacity: u32,
    /// Number of non-cancelled registrations
    pub registered_count: u32,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Registrations in the order they were made
    pub registrations: Vec<Registration>,
    /// Administrative notes
    pub notes: Option<String>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Number of registrations currently occupying a seat.
    #[must_use]
    pub fn occupied_seats(&self) -> u32 {
        let occupied = self
            .registrations
            .iter()
            .filter(|r| r.status.occupies_seat())
            .count();
        u32::try_from(occupied).unwrap_or(u32::MAX)
    }

    /// `registered_count` matches the registrations actually holding seats.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.registered_count == self.occupied_seats()
    }

    /// Whether every seat is taken
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.registered_count >= self.capacity
    }

    /// Seats still open
    #[must_use]
    pub const fn available_seats(&self) -> u32 {
        self.capacity.saturating_sub(self.registered_count)
    }

    /// The member's non-cancelled registration, if any.
    #[must_use]
    pub fn active_registration(&self, member_id: MemberId) -> Option<&Registration> {
        self.registrations
            .iter()
            .find(|r| r.member_id == member_id && r.status.occupies_seat())
    }

    /// The member's most recent registration regardless of status.
    #[must_use]
    pub fn latest_registration(&self, member_id: MemberId) -> Option<&Registration> {
        self.registrations
            .iter()
            .rev()
            .find(|r| r.member_id == member_id)
    }

    /// Registrations holding a seat, in registration order.
    pub fn roster(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.iter().filter(|r| r.status.occupies_seat())
    }

    /// Local start as a naive date-time
    #[must_use]
    pub fn local_start(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    /// Local end as a naive date-time
    #[must_use]
    pub fn local_end(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }

    /// Start instant for a studio at the given UTC offset.
    #[must_use]
    pub fn starts_at(&self, offset: FixedOffset) -> Option<DateTime<Utc>> {
        offset
            .from_local_datetime(&self.local_start())
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// End instant for a studio at the given UTC offset.
    #[must_use]
    pub fn ends_at(&self, offset: FixedOffset) -> Option<DateTime<Utc>> {
        offset
            .from_local_datetime(&self.local_end())
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
