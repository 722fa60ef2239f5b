//! Error types for the booking core.
//!
//! Every service operation returns [`Result<T, BookingError>`](BookingError). Persistence
//! failures are [`StoreError`]s and surface through [`BookingError::Store`], except optimistic
//! concurrency conflicts, which the services retry and only report as
//! [`BookingError::Conflict`] once the retry budget is spent.

use crate::store::Version;
use crate::types::{MemberId, RegistrationStatus, SessionId, SessionStatus};
use thiserror::Error;

/// Errors produced by the persistence layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: expected version doesn't match current version.
    ///
    /// Another writer modified the document between our read and our write.
    #[error(
        "Concurrency conflict on {document}: expected version {}, found {}",
        describe_version(*expected),
        describe_version(*actual)
    )]
    ConcurrencyConflict {
        /// Key of the document where the conflict occurred
        document: String,
        /// The version we expected the document to be at
        expected: Option<Version>,
        /// The actual current version (None if the document no longer exists)
        actual: Option<Version>,
    },

    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Document already exists
    #[error("Document already exists: {0}")]
    Duplicate(String),

    /// Database connection or query error
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn describe_version(version: Option<Version>) -> String {
    version.map_or_else(|| "none".to_string(), |v| v.to_string())
}

impl StoreError {
    /// Whether this error is an optimistic concurrency conflict that can be retried.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Kind of entity a [`BookingError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Scheduled session
    Session,
    /// Member in the member directory
    Member,
    /// Package in the package catalog
    Package,
    /// Class template in the class catalog
    Class,
    /// Registration of a member in a session
    Registration,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Session => "session",
            Self::Member => "member",
            Self::Package => "package",
            Self::Class => "class",
            Self::Registration => "registration",
        };
        f.write_str(name)
    }
}

/// A status change that is not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Registration status change
    Registration {
        /// Current status
        from: RegistrationStatus,
        /// Requested status
        to: RegistrationStatus,
    },
    /// Session status change
    Session {
        /// Current status
        from: SessionStatus,
        /// Requested status
        to: SessionStatus,
    },
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registration { from, to } => write!(f, "registration {from} -> {to}"),
            Self::Session { from, to } => write!(f, "session {from} -> {to}"),
        }
    }
}

/// Why a member may not book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementGap {
    /// Member holds no package
    NoPackage,
    /// Membership is not active (inactive, suspended or expired)
    NotActive(crate::types::MembershipStatus),
    /// All classes of the package are used
    Exhausted,
}

impl std::fmt::Display for EntitlementGap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPackage => f.write_str("no package"),
            Self::NotActive(status) => write!(f, "membership is {status}"),
            Self::Exhausted => f.write_str("no classes remaining"),
        }
    }
}

/// Errors returned by booking core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// A session, member, package, class or registration reference does not resolve
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What was looked up
        entity: EntityKind,
        /// The identifier that did not resolve
        id: String,
    },

    /// Every seat in the session is taken
    #[error("Session {session_id} is full (capacity {capacity})")]
    SessionFull {
        /// Session that is full
        session_id: SessionId,
        /// Its capacity
        capacity: u32,
    },

    /// Member already holds a non-cancelled registration for the session
    #[error("Member {member_id} is already registered for session {session_id}")]
    DuplicateRegistration {
        /// Session
        session_id: SessionId,
        /// Member
        member_id: MemberId,
    },

    /// Status change not permitted by the state machine
    #[error("Invalid transition: {0}")]
    InvalidTransition(Transition),

    /// Malformed date, time or capacity input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Session is not accepting registrations
    #[error("Session {session_id} is {status} and not open for registration")]
    SessionNotOpen {
        /// Session
        session_id: SessionId,
        /// Its status
        status: SessionStatus,
    },

    /// Member-facing cancellation attempted inside the cancellation window
    #[error("Cancellation window closed ({minutes_until_start} minutes until start)")]
    CancellationWindowClosed {
        /// Whole minutes until the session starts (zero or negative once started)
        minutes_until_start: i64,
        /// Whether the session has already started
        started: bool,
    },

    /// Member-facing booking attempted without a usable entitlement
    #[error("Member {member_id} cannot book: {reason}")]
    NoEntitlement {
        /// Member
        member_id: MemberId,
        /// What is missing
        reason: EntitlementGap,
    },

    /// Concurrent writers kept winning until the retry budget ran out
    #[error("Gave up after {attempts} attempts due to concurrent modification")]
    Conflict {
        /// Attempts made
        attempts: usize,
    },

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Convenience constructor for [`BookingError::NotFound`].
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether this error is a retryable optimistic concurrency conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_conflict())
    }
}

/// Result alias for booking operations
pub type Result<T> = std::result::Result<T, BookingError>;
