//! Given-When-Then tests for the session reducer.
//!
//! Run with: `cargo test --test session_reducer_test`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::Utc;
use studio_core::error::{BookingError, Transition};
use studio_core::registry::{SessionAction, SessionEvent, SessionReducer, SessionUpdate, TransitionEnv};
use studio_core::types::{
    ClassId, Difficulty, MemberId, MemberProfile, Registration, RegistrationId,
    RegistrationStatus, Session, SessionId, SessionStatus,
};
use studio_testing::fixtures::{date, slot, time};
use studio_testing::ReducerTest;

fn env() -> TransitionEnv {
    TransitionEnv { now: Utc::now() }
}

fn session(capacity: u32) -> Session {
    Session {
        id: SessionId::new(),
        class_id: ClassId::new(),
        class_name: "Vinyasa Flow".to_string(),
        instructor: "Maya".to_string(),
        difficulty: Difficulty::AllLevels,
        date: date(2024, 1, 15),
        start_time: time(18, 0),
        end_time: time(19, 0),
        capacity,
        registered_count: 0,
        status: SessionStatus::Scheduled,
        registrations: Vec::new(),
        notes: None,
        created_at: Utc::now(),
    }
}

fn with_registration(mut session: Session, member_id: MemberId, status: RegistrationStatus) -> Session {
    session.registrations.push(Registration {
        id: RegistrationId::new(),
        session_id: session.id,
        member_id,
        member_name: "Sam".to_string(),
        member_email: "sam@example.com".to_string(),
        status,
        registered_at: Utc::now(),
        cancelled_at: None,
        attended_at: None,
        notes: None,
    });
    if status.occupies_seat() {
        session.registered_count += 1;
    }
    session
}

fn register(member_id: MemberId) -> SessionAction {
    SessionAction::Register {
        registration_id: RegistrationId::new(),
        member_id,
        profile: MemberProfile {
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
        },
        notes: None,
    }
}

#[test]
fn register_appends_confirmed_registration() {
    let member = MemberId::new();

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(session(2))
        .when_action(register(member))
        .then_outcome(|event| assert!(matches!(event, SessionEvent::Registered { .. })))
        .then_state(move |s| {
            assert_eq!(s.registered_count, 1);
            assert_eq!(s.registrations.len(), 1);
            assert_eq!(s.registrations[0].member_id, member);
            assert_eq!(s.registrations[0].status, RegistrationStatus::Confirmed);
            assert_eq!(s.registrations[0].member_name, "Sam");
            assert!(s.is_consistent());
        })
        .run();
}

#[test]
fn register_into_full_session_fails() {
    let full = with_registration(session(1), MemberId::new(), RegistrationStatus::Confirmed);

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(full)
        .when_action(register(MemberId::new()))
        .then_error(|error| {
            assert!(matches!(error, BookingError::SessionFull { capacity: 1, .. }));
        })
        .run();
}

#[test]
fn attended_and_no_show_keep_their_seat() {
    let full = with_registration(
        with_registration(session(2), MemberId::new(), RegistrationStatus::Attended),
        MemberId::new(),
        RegistrationStatus::NoShow,
    );

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(full)
        .when_action(register(MemberId::new()))
        .then_error(|error| assert!(matches!(error, BookingError::SessionFull { .. })))
        .run();
}

#[test]
fn register_twice_is_duplicate() {
    let member = MemberId::new();

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(with_registration(session(5), member, RegistrationStatus::Confirmed))
        .when_action(register(member))
        .then_error(move |error| {
            assert!(matches!(
                error,
                BookingError::DuplicateRegistration { member_id, .. } if *member_id == member
            ));
        })
        .run();
}

#[test]
fn attended_member_cannot_register_again() {
    let member = MemberId::new();

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(with_registration(session(5), member, RegistrationStatus::Attended))
        .when_action(register(member))
        .then_error(|error| assert!(matches!(error, BookingError::DuplicateRegistration { .. })))
        .run();
}

#[test]
fn duplicate_is_reported_before_full() {
    let member = MemberId::new();

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(with_registration(session(1), member, RegistrationStatus::Confirmed))
        .when_action(register(member))
        .then_error(|error| assert!(matches!(error, BookingError::DuplicateRegistration { .. })))
        .run();
}

#[test]
fn cancelled_session_is_not_open() {
    let mut cancelled = session(5);
    cancelled.status = SessionStatus::Cancelled;

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(cancelled)
        .when_action(register(MemberId::new()))
        .then_error(|error| {
            assert!(matches!(
                error,
                BookingError::SessionNotOpen {
                    status: SessionStatus::Cancelled,
                    ..
                }
            ));
        })
        .run();
}

#[test]
fn cancel_releases_the_seat() {
    let member = MemberId::new();

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(with_registration(session(1), member, RegistrationStatus::Confirmed))
        .when_action(SessionAction::Cancel { member_id: member })
        .then_outcome(|event| {
            assert!(matches!(event, SessionEvent::RegistrationCancelled { .. }));
        })
        .then_state(|s| {
            assert_eq!(s.registered_count, 0);
            assert_eq!(s.registrations[0].status, RegistrationStatus::Cancelled);
            assert!(s.registrations[0].cancelled_at.is_some());
            assert!(s.is_consistent());
        })
        .run();
}

#[test]
fn cancel_without_confirmed_registration_changes_nothing() {
    let member = MemberId::new();
    let attended = with_registration(session(3), member, RegistrationStatus::Attended);
    let before = attended.clone();

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(attended)
        .when_action(SessionAction::Cancel { member_id: member })
        .then_outcome(|event| assert_eq!(*event, SessionEvent::NothingToCancel))
        .then_state(move |s| assert_eq!(*s, before))
        .run();
}

#[test]
fn mark_attended_sets_timestamp_and_keeps_count() {
    let member = MemberId::new();

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(with_registration(session(3), member, RegistrationStatus::Confirmed))
        .when_action(SessionAction::MarkAttendance {
            member_id: member,
            attended: true,
        })
        .then_outcome(|event| {
            assert!(matches!(
                event,
                SessionEvent::AttendanceMarked {
                    status: RegistrationStatus::Attended,
                    ..
                }
            ));
        })
        .then_state(|s| {
            assert_eq!(s.registered_count, 1);
            assert!(s.registrations[0].attended_at.is_some());
        })
        .run();
}

#[test]
fn mark_no_show_leaves_attended_at_empty() {
    let member = MemberId::new();

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(with_registration(session(3), member, RegistrationStatus::Confirmed))
        .when_action(SessionAction::MarkAttendance {
            member_id: member,
            attended: false,
        })
        .then_state(|s| {
            assert_eq!(s.registrations[0].status, RegistrationStatus::NoShow);
            assert!(s.registrations[0].attended_at.is_none());
            assert_eq!(s.registered_count, 1);
        })
        .run();
}

#[test]
fn attendance_on_resolved_registration_is_rejected() {
    let member = MemberId::new();

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(with_registration(session(3), member, RegistrationStatus::NoShow))
        .when_action(SessionAction::MarkAttendance {
            member_id: member,
            attended: true,
        })
        .then_error(|error| {
            assert_eq!(
                *error,
                BookingError::InvalidTransition(Transition::Registration {
                    from: RegistrationStatus::NoShow,
                    to: RegistrationStatus::Attended,
                })
            );
        })
        .run();
}

#[test]
fn attendance_on_cancelled_registration_is_rejected() {
    let member = MemberId::new();

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(with_registration(session(3), member, RegistrationStatus::Cancelled))
        .when_action(SessionAction::MarkAttendance {
            member_id: member,
            attended: false,
        })
        .then_error(|error| assert!(matches!(error, BookingError::InvalidTransition(_))))
        .run();
}

#[test]
fn attendance_for_unregistered_member_is_not_found() {
    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(session(3))
        .when_action(SessionAction::MarkAttendance {
            member_id: MemberId::new(),
            attended: true,
        })
        .then_error(|error| assert!(matches!(error, BookingError::NotFound { .. })))
        .run();
}

#[test]
fn completed_session_cannot_be_cancelled() {
    let mut completed = session(3);
    completed.status = SessionStatus::Completed;

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(completed)
        .when_action(SessionAction::ChangeStatus {
            status: SessionStatus::Cancelled,
            notes: None,
        })
        .then_error(|error| {
            assert_eq!(
                *error,
                BookingError::InvalidTransition(Transition::Session {
                    from: SessionStatus::Completed,
                    to: SessionStatus::Cancelled,
                })
            );
        })
        .run();
}

#[test]
fn cancelling_a_session_records_notes() {
    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(session(3))
        .when_action(SessionAction::ChangeStatus {
            status: SessionStatus::Cancelled,
            notes: Some("instructor ill".to_string()),
        })
        .then_outcome(|event| {
            assert_eq!(
                *event,
                SessionEvent::StatusChanged {
                    from: SessionStatus::Scheduled,
                    to: SessionStatus::Cancelled,
                }
            );
        })
        .then_state(|s| assert_eq!(s.notes.as_deref(), Some("instructor ill")))
        .run();
}

#[test]
fn capacity_cannot_drop_below_taken_seats() {
    let taken = with_registration(
        with_registration(session(4), MemberId::new(), RegistrationStatus::Confirmed),
        MemberId::new(),
        RegistrationStatus::Attended,
    );

    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(taken)
        .when_action(SessionAction::Update(SessionUpdate {
            capacity: Some(1),
            ..SessionUpdate::default()
        }))
        .then_error(|error| assert!(matches!(error, BookingError::Validation(_))))
        .run();
}

#[test]
fn update_moves_the_session() {
    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(session(4))
        .when_action(SessionAction::Update(SessionUpdate {
            date: Some(date(2024, 1, 16)),
            times: Some(slot((7, 0), (8, 15))),
            capacity: Some(6),
            notes: None,
        }))
        .then_outcome(|event| assert_eq!(*event, SessionEvent::Updated))
        .then_state(|s| {
            assert_eq!(s.date, date(2024, 1, 16));
            assert_eq!(s.start_time, time(7, 0));
            assert_eq!(s.end_time, time(8, 15));
            assert_eq!(s.capacity, 6);
        })
        .run();
}

#[test]
fn update_rejects_inverted_times() {
    ReducerTest::new(SessionReducer::new())
        .with_env(env())
        .given_state(session(4))
        .when_action(SessionAction::Update(SessionUpdate {
            times: Some(slot((9, 0), (8, 0))),
            ..SessionUpdate::default()
        }))
        .then_error(|error| assert!(matches!(error, BookingError::Validation(_))))
        .run();
}
