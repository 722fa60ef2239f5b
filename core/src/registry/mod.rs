//! Session Registry: scheduled sessions, their capacity, and the registrations in them.
//!
//! # Concurrency
//!
//! Every mutation runs as one optimistic cycle:
//!
//! ```text
//! load session (with version)
//!   → SessionReducer::reduce on the loaded copy   (capacity / duplicate / status checks)
//!   → save(session, expected_version)             (rejected if anyone wrote in between)
//!   → on conflict: start again from load
//! ```
//!
//! Two requests racing for the last seat both read `registered_count = capacity - 1`, but only
//! one save can land on that version. The loser reloads, sees the session full and gets
//! [`BookingError::SessionFull`]. The registration and the count increment are written in the
//! same document, so they change together or not at all.
//!
//! Registering never touches the member's entitlement; classes are consumed by attendance.

mod bulk;
mod queries;
pub mod reducer;

pub use bulk::{BulkFailure, BulkOutcome, SessionTemplate};
pub use reducer::{SessionAction, SessionEvent, SessionReducer, SessionUpdate, TransitionEnv};

use crate::environment::StudioEnvironment;
use crate::error::{BookingError, EntityKind, Result};
use crate::reducer::Reducer;
use crate::retry::retry_on_conflict;
use crate::store::Versioned;
use crate::types::{
    ClassId, MemberId, RegistrationId, Session, SessionId, SessionStatus, TimeRange,
};
use chrono::NaiveDate;

/// Input for creating a single session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSession {
    /// Class template to copy name, instructor, difficulty and default capacity from
    pub class_id: ClassId,
    /// Local date
    pub date: NaiveDate,
    /// Local start and end
    pub times: TimeRange,
    /// Capacity override; defaults to the class's configured capacity
    pub capacity: Option<u32>,
    /// Administrative notes
    pub notes: Option<String>,
}

/// Service owning scheduled sessions and their registrations.
#[derive(Clone, Debug)]
pub struct SessionRegistry {
    env: StudioEnvironment,
    reducer: SessionReducer,
}

impl SessionRegistry {
    /// Creates a new `SessionRegistry`
    #[must_use]
    pub const fn new(env: StudioEnvironment) -> Self {
        Self {
            env,
            reducer: SessionReducer::new(),
        }
    }

    /// Create a session from a class template.
    ///
    /// The class's name, instructor and difficulty are copied into the session and not kept in
    /// sync with later catalog edits. Class activity is not enforced here.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the class does not exist
    /// - `Validation`: end time not after start time, or zero capacity
    #[tracing::instrument(skip(self, new), fields(class_id = %new.class_id, date = %new.date))]
    pub async fn create_session(&self, new: NewSession) -> Result<Session> {
        validate_slot(new.times, new.capacity)?;

        let class = self
            .env
            .classes
            .get_class(new.class_id)
            .await?
            .ok_or_else(|| BookingError::not_found(EntityKind::Class, new.class_id))?;

        if !class.active {
            tracing::debug!(class_id = %new.class_id, "Creating session for inactive class");
        }

        let session = Session {
            id: SessionId::from_uuid(self.env.ids.next_uuid()),
            class_id: new.class_id,
            class_name: class.name,
            instructor: class.instructor,
            difficulty: class.difficulty,
            date: new.date,
            start_time: new.times.start,
            end_time: new.times.end,
            capacity: new.capacity.unwrap_or(class.max_capacity),
            registered_count: 0,
            status: SessionStatus::Scheduled,
            registrations: Vec::new(),
            notes: new.notes,
            created_at: self.env.now(),
        };

        if session.capacity == 0 {
            return Err(BookingError::Validation(format!(
                "class {} has no default capacity; pass one explicitly",
                new.class_id
            )));
        }

        self.env.sessions.insert(session.clone()).await?;
        tracing::debug!(session_id = %session.id, capacity = session.capacity, "Session created");

        Ok(session)
    }

    /// Fetch a session.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such session
    pub async fn get_session(&self, session_id: SessionId) -> Result<Session> {
        Ok(self.load(session_id).await?.into_inner())
    }

    /// Register a member for a session.
    ///
    /// The member's name and email are snapshotted from the member directory.
    ///
    /// # Errors
    ///
    /// - `NotFound`: session or member does not exist
    /// - `SessionNotOpen`: session is completed or cancelled
    /// - `DuplicateRegistration`: member already holds a non-cancelled registration
    /// - `SessionFull`: no seats left
    /// - `Conflict`: lost the race to concurrent writers more often than the retry budget allows
    #[tracing::instrument(skip(self, notes))]
    pub async fn register_member(
        &self,
        session_id: SessionId,
        member_id: MemberId,
        notes: Option<String>,
    ) -> Result<Session> {
        let profile = self
            .env
            .members
            .get_member(member_id)
            .await?
            .ok_or_else(|| BookingError::not_found(EntityKind::Member, member_id))?;
        let registration_id = RegistrationId::from_uuid(self.env.ids.next_uuid());

        let action = SessionAction::Register {
            registration_id,
            member_id,
            profile,
            notes,
        };

        let result = self.apply(session_id, "register_member", action).await;
        metrics::counter!(
            crate::metrics::REGISTRATIONS,
            "outcome" => registration_outcome(&result)
        )
        .increment(1);

        let (session, _) = result?;
        tracing::debug!(
            %registration_id,
            registered = session.registered_count,
            capacity = session.capacity,
            "Member registered"
        );
        Ok(session)
    }

    /// Cancel the member's confirmed registration.
    ///
    /// Succeeds without changes when the member holds no confirmed registration. The
    /// cancellation window is not enforced here; staff may cancel at any time.
    ///
    /// # Errors
    ///
    /// - `NotFound`: session does not exist
    #[tracing::instrument(skip(self))]
    pub async fn cancel_registration(
        &self,
        session_id: SessionId,
        member_id: MemberId,
    ) -> Result<Session> {
        let (session, event) = self
            .apply(session_id, "cancel_registration", SessionAction::Cancel { member_id })
            .await?;

        match event {
            SessionEvent::RegistrationCancelled { registration_id } => {
                metrics::counter!(crate::metrics::CANCELLATIONS).increment(1);
                tracing::debug!(%registration_id, "Registration cancelled");
            },
            _ => tracing::debug!("No confirmed registration to cancel"),
        }

        Ok(session)
    }

    /// Record whether the member attended.
    ///
    /// Only a `confirmed` registration can be resolved; attended, no-show and cancelled
    /// registrations are final.
    ///
    /// # Errors
    ///
    /// - `NotFound`: session does not exist, or the member never registered
    /// - `InvalidTransition`: the member's registration is not `confirmed`
    #[tracing::instrument(skip(self))]
    pub async fn mark_attendance(
        &self,
        session_id: SessionId,
        member_id: MemberId,
        attended: bool,
    ) -> Result<Session> {
        let action = SessionAction::MarkAttendance {
            member_id,
            attended,
        };
        let result = self.apply(session_id, "mark_attendance", action).await;

        if let Err(BookingError::InvalidTransition(transition)) = &result {
            tracing::warn!(%transition, "Rejected attendance mark");
        }
        let (session, event) = result?;

        if let SessionEvent::AttendanceMarked { status, .. } = event {
            metrics::counter!(crate::metrics::ATTENDANCE, "result" => status.as_str())
                .increment(1);
        }
        Ok(session)
    }

    /// Administrative lifecycle change: `scheduled → completed | cancelled`.
    ///
    /// Independent of attendance marking; completing a session does not resolve its
    /// registrations.
    ///
    /// # Errors
    ///
    /// - `NotFound`: session does not exist
    /// - `InvalidTransition`: the session is not `scheduled`
    #[tracing::instrument(skip(self, notes))]
    pub async fn change_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
        notes: Option<String>,
    ) -> Result<Session> {
        let (session, _) = self
            .apply(session_id, "change_status", SessionAction::ChangeStatus { status, notes })
            .await?;
        tracing::info!(%session_id, %status, "Session status changed");
        Ok(session)
    }

    /// Edit date, times, capacity or notes.
    ///
    /// # Errors
    ///
    /// - `NotFound`: session does not exist
    /// - `Validation`: invalid times, zero capacity, or capacity below seats already taken
    #[tracing::instrument(skip(self, update))]
    pub async fn update_session(
        &self,
        session_id: SessionId,
        update: SessionUpdate,
    ) -> Result<Session> {
        let (session, _) = self
            .apply(session_id, "update_session", SessionAction::Update(update))
            .await?;
        Ok(session)
    }

    /// Physically remove a session that never had any registration.
    ///
    /// Sessions that have been registered for (even if every registration was later cancelled)
    /// are kept; cancel them with [`change_status`](Self::change_status) instead.
    ///
    /// # Errors
    ///
    /// - `NotFound`: session does not exist
    /// - `Validation`: the session has registrations
    #[tracing::instrument(skip(self))]
    pub async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        retry_on_conflict(&self.env.retry, "delete_session", move || async move {
            let Versioned { value, version } = self.load(session_id).await?;
            if !value.registrations.is_empty() {
                return Err(BookingError::Validation(format!(
                    "session {session_id} has registrations; cancel it instead"
                )));
            }
            self.env.sessions.delete(session_id, version).await?;
            Ok(())
        })
        .await
    }

    async fn load(&self, session_id: SessionId) -> Result<Versioned<Session>> {
        self.env
            .sessions
            .load(session_id)
            .await?
            .ok_or_else(|| BookingError::not_found(EntityKind::Session, session_id))
    }

    /// Load, reduce, save with version check, retrying on conflict.
    async fn apply(
        &self,
        session_id: SessionId,
        operation: &'static str,
        action: SessionAction,
    ) -> Result<(Session, SessionEvent)> {
        retry_on_conflict(&self.env.retry, operation, move || {
            let action = action.clone();
            async move {
                let Versioned {
                    value: mut session,
                    version,
                } = self.load(session_id).await?;

                let env = TransitionEnv {
                    now: self.env.now(),
                };
                let event = self.reducer.reduce(&mut session, action, &env)?;

                if event.changed() {
                    self.env.sessions.save(session.clone(), version).await?;
                }
                Ok((session, event))
            }
        })
        .await
    }
}

fn validate_slot(times: TimeRange, capacity: Option<u32>) -> Result<()> {
    if !times.is_valid() {
        return Err(BookingError::Validation(format!(
            "end time {} must be after start time {}",
            times.end, times.start
        )));
    }
    if capacity == Some(0) {
        return Err(BookingError::Validation(
            "capacity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn registration_outcome(result: &Result<(Session, SessionEvent)>) -> &'static str {
    match result {
        Ok(_) => "confirmed",
        Err(BookingError::SessionFull { .. }) => "full",
        Err(BookingError::DuplicateRegistration { .. }) => "duplicate",
        Err(BookingError::SessionNotOpen { .. }) => "closed",
        Err(BookingError::NotFound { .. }) => "not_found",
        Err(BookingError::Conflict { .. }) => "conflict",
        Err(_) => "error",
    }
}
