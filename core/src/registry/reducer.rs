//! Pure state transitions for a single session document.
//!
//! Every registry mutation is expressed as a [`SessionAction`] reduced against the session.
//! The reducer checks capacity, duplicates and status rules, then applies the change; the
//! registry persists the result with a version check. Because `registered_count` and the
//! registration list are only ever changed together here, they cannot drift apart.

use crate::error::{BookingError, Transition};
use crate::reducer::Reducer;
use crate::types::{
    MemberId, MemberProfile, Registration, RegistrationId, RegistrationStatus, Session,
    SessionStatus, TimeRange,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Administrative edits to a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    /// New date
    pub date: Option<NaiveDate>,
    /// New start/end times
    pub times: Option<TimeRange>,
    /// New capacity; may not drop below the seats already taken
    pub capacity: Option<u32>,
    /// Replace the notes
    pub notes: Option<String>,
}

/// Actions on a session document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// Claim a seat for a member
    Register {
        /// New registration's id
        registration_id: RegistrationId,
        /// Member claiming the seat
        member_id: MemberId,
        /// Contact details snapshotted into the registration
        profile: MemberProfile,
        /// Free-form notes
        notes: Option<String>,
    },

    /// Release the member's confirmed seat
    Cancel {
        /// Member releasing the seat
        member_id: MemberId,
    },

    /// Resolve the member's confirmed registration as attended or no-show
    MarkAttendance {
        /// Member
        member_id: MemberId,
        /// `true` for attended, `false` for no-show
        attended: bool,
    },

    /// Administrative lifecycle change
    ChangeStatus {
        /// Requested status
        status: SessionStatus,
        /// Notes to record with the change
        notes: Option<String>,
    },

    /// Administrative edit
    Update(SessionUpdate),
}

/// What a [`SessionAction`] changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new confirmed registration was appended
    Registered {
        /// The new registration
        registration_id: RegistrationId,
    },
    /// A confirmed registration was cancelled
    RegistrationCancelled {
        /// The cancelled registration
        registration_id: RegistrationId,
    },
    /// Cancel found no confirmed registration; nothing changed
    NothingToCancel,
    /// Attendance was recorded
    AttendanceMarked {
        /// The resolved registration
        registration_id: RegistrationId,
        /// `attended` or `no-show`
        status: RegistrationStatus,
    },
    /// Session status changed
    StatusChanged {
        /// Previous status
        from: SessionStatus,
        /// New status
        to: SessionStatus,
    },
    /// Session details were edited
    Updated,
}

impl SessionEvent {
    /// Whether the session document was modified and needs saving.
    #[must_use]
    pub const fn changed(&self) -> bool {
        !matches!(self, Self::NothingToCancel)
    }
}

/// Environment for session transitions.
#[derive(Clone, Copy, Debug)]
pub struct TransitionEnv {
    /// Timestamp recorded on registrations
    pub now: DateTime<Utc>,
}

/// Reducer for session documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionReducer;

impl SessionReducer {
    /// Creates a new `SessionReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn register(
        session: &mut Session,
        registration_id: RegistrationId,
        member_id: MemberId,
        profile: MemberProfile,
        notes: Option<String>,
        env: &TransitionEnv,
    ) -> Result<SessionEvent, BookingError> {
        if session.status != SessionStatus::Scheduled {
            return Err(BookingError::SessionNotOpen {
                session_id: session.id,
                status: session.status,
            });
        }

        if session.active_registration(member_id).is_some() {
            return Err(BookingError::DuplicateRegistration {
                session_id: session.id,
                member_id,
            });
        }

        if session.is_full() {
            return Err(BookingError::SessionFull {
                session_id: session.id,
                capacity: session.capacity,
            });
        }

        session.registrations.push(Registration {
            id: registration_id,
            session_id: session.id,
            member_id,
            member_name: profile.name,
            member_email: profile.email,
            status: RegistrationStatus::Confirmed,
            registered_at: env.now,
            cancelled_at: None,
            attended_at: None,
            notes,
        });
        session.registered_count += 1;

        Ok(SessionEvent::Registered { registration_id })
    }

    fn cancel(session: &mut Session, member_id: MemberId, env: &TransitionEnv) -> SessionEvent {
        let Some(registration) = session
            .registrations
            .iter_mut()
            .find(|r| r.member_id == member_id && r.status == RegistrationStatus::Confirmed)
        else {
            return SessionEvent::NothingToCancel;
        };

        registration.status = RegistrationStatus::Cancelled;
        registration.cancelled_at = Some(env.now);
        let registration_id = registration.id;
        session.registered_count = session.registered_count.saturating_sub(1);

        SessionEvent::RegistrationCancelled { registration_id }
    }

    fn mark_attendance(
        session: &mut Session,
        member_id: MemberId,
        attended: bool,
        env: &TransitionEnv,
    ) -> Result<SessionEvent, BookingError> {
        let target = if attended {
            RegistrationStatus::Attended
        } else {
            RegistrationStatus::NoShow
        };

        let confirmed = session
            .registrations
            .iter_mut()
            .find(|r| r.member_id == member_id && r.status == RegistrationStatus::Confirmed);

        let Some(registration) = confirmed else {
            // Never resurrect or overwrite a resolved registration.
            return Err(match session.latest_registration(member_id) {
                Some(latest) => BookingError::InvalidTransition(Transition::Registration {
                    from: latest.status,
                    to: target,
                }),
                None => BookingError::not_found(
                    crate::error::EntityKind::Registration,
                    format!("{member_id} in session {}", session.id),
                ),
            });
        };

        registration.status = target;
        if attended {
            registration.attended_at = Some(env.now);
        }

        // attended and no-show both keep the seat, so registered_count is unchanged
        Ok(SessionEvent::AttendanceMarked {
            registration_id: registration.id,
            status: target,
        })
    }

    fn change_status(
        session: &mut Session,
        status: SessionStatus,
        notes: Option<String>,
    ) -> Result<SessionEvent, BookingError> {
        let from = session.status;
        if !from.can_transition_to(status) {
            return Err(BookingError::InvalidTransition(Transition::Session {
                from,
                to: status,
            }));
        }

        session.status = status;
        if notes.is_some() {
            session.notes = notes;
        }

        Ok(SessionEvent::StatusChanged { from, to: status })
    }

    fn update(session: &mut Session, update: SessionUpdate) -> Result<SessionEvent, BookingError> {
        if let Some(times) = update.times.filter(|t| !t.is_valid()) {
            return Err(BookingError::Validation(format!(
                "end time {} must be after start time {}",
                times.end, times.start
            )));
        }

        if let Some(capacity) = update.capacity {
            if capacity == 0 {
                return Err(BookingError::Validation(
                    "capacity must be at least 1".to_string(),
                ));
            }
            if capacity < session.registered_count {
                return Err(BookingError::Validation(format!(
                    "capacity {capacity} is below the {} seats already taken",
                    session.registered_count
                )));
            }
        }

        if let Some(date) = update.date {
            session.date = date;
        }
        if let Some(times) = update.times {
            session.start_time = times.start;
            session.end_time = times.end;
        }
        if let Some(capacity) = update.capacity {
            session.capacity = capacity;
        }
        if update.notes.is_some() {
            session.notes = update.notes;
        }

        Ok(SessionEvent::Updated)
    }
}

impl Reducer for SessionReducer {
    type State = Session;
    type Action = SessionAction;
    type Environment = TransitionEnv;
    type Outcome = SessionEvent;
    type Error = BookingError;

    fn reduce(
        &self,
        state: &mut Session,
        action: SessionAction,
        env: &TransitionEnv,
    ) -> Result<SessionEvent, BookingError> {
        match action {
            SessionAction::Register {
                registration_id,
                member_id,
                profile,
                notes,
            } => Self::register(state, registration_id, member_id, profile, notes, env),
            SessionAction::Cancel { member_id } => Ok(Self::cancel(state, member_id, env)),
            SessionAction::MarkAttendance {
                member_id,
                attended,
            } => Self::mark_attendance(state, member_id, attended, env),
            SessionAction::ChangeStatus { status, notes } => {
                Self::change_status(state, status, notes)
            },
            SessionAction::Update(update) => Self::update(state, update),
        }
    }
}
