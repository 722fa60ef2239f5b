//! Concurrency stress tests for last-seat scenarios.
//!
//! Every registration is a load, reduce, versioned save cycle. These tests fire many
//! registrations at once and check that capacity is never exceeded and the seat count never
//! drifts from the registrations.
//!
//! Run with: `cargo test --test concurrency_stress_test -- --nocapture`

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::time::Duration;
use studio_core::error::BookingError;
use studio_core::renewal::RenewalMode;
use studio_core::retry::RetryPolicy;
use studio_core::studio::{BookingPolicy, Studio};
use studio_core::types::{Allowance, SessionId};
use studio_testing::fixtures::{gentle_hatha, slot, ten_class_pass};
use studio_testing::TestStudio;

/// Generous retry budget so contention resolves to `SessionFull` rather than `Conflict`.
fn patient(t: &TestStudio) -> Studio {
    let env = t.env.clone().with_retry(
        RetryPolicy::builder()
            .max_retries(500)
            .initial_delay(Duration::from_micros(200))
            .max_delay(Duration::from_millis(2))
            .build(),
    );
    Studio::new(env, BookingPolicy::default())
}

async fn race_for_seats(capacity: u32, contenders: usize) -> (TestStudio, SessionId, usize, usize) {
    studio_testing::init_tracing();
    let t = TestStudio::new();
    let class = t.add_class(gentle_hatha(capacity));
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;
    let studio = patient(&t);

    let handles: Vec<_> = (0..contenders)
        .map(|i| {
            let member = t.add_member(&format!("member {i}"));
            let studio = studio.clone();
            tokio::spawn(async move {
                studio
                    .registry()
                    .register_member(session.id, member, None)
                    .await
            })
        })
        .collect();

    let mut confirmed = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => confirmed += 1,
            Err(BookingError::SessionFull { .. }) => full += 1,
            Err(other) => panic!("unexpected registration error: {other}"),
        }
    }
    (t, session.id, confirmed, full)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_last_seat_100_concurrent_registrations() {
    let (t, session_id, confirmed, full) = race_for_seats(1, 100).await;

    assert_eq!(confirmed, 1, "exactly one member gets the last seat");
    assert_eq!(full, 99);

    let session = t.studio.registry().get_session(session_id).await.unwrap();
    assert_eq!(session.registered_count, 1);
    assert_eq!(session.registrations.len(), 1);
    assert!(session.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_small_class_fills_exactly() {
    let (t, session_id, confirmed, full) = race_for_seats(5, 40).await;

    assert_eq!(confirmed, 5);
    assert_eq!(full, 35);

    let session = t.studio.registry().get_session(session_id).await.unwrap();
    assert_eq!(session.registered_count, 5);
    assert!(session.is_full());
    assert!(session.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_cancels_and_registrations_keep_count_consistent() {
    let t = TestStudio::new();
    let class = t.add_class(gentle_hatha(10));
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;
    let studio = patient(&t);

    let early: Vec<_> = (0..10).map(|i| t.add_member(&format!("early {i}"))).collect();
    for &member in &early {
        studio
            .registry()
            .register_member(session.id, member, None)
            .await
            .unwrap();
    }
    let late: Vec<_> = (0..10).map(|i| t.add_member(&format!("late {i}"))).collect();

    let mut handles = Vec::new();
    for &member in &early[..5] {
        let studio = studio.clone();
        handles.push(tokio::spawn(async move {
            studio
                .registry()
                .cancel_registration(session.id, member)
                .await
                .map(|_| ())
        }));
    }
    for &member in &late {
        let studio = studio.clone();
        handles.push(tokio::spawn(async move {
            studio
                .registry()
                .register_member(session.id, member, None)
                .await
                .map(|_| ())
        }));
    }
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) | Err(BookingError::SessionFull { .. }) => {},
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let stored = t.studio.registry().get_session(session.id).await.unwrap();
    assert!(stored.is_consistent());
    assert!(stored.registered_count <= stored.capacity);
    assert!(stored.registered_count >= 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_renewals_all_land() {
    let t = TestStudio::new();
    let member = t.add_member("Sam");
    let pass = t.add_package(ten_class_pass());
    let studio = patient(&t);
    studio.renew(member, pass, RenewalMode::Replace).await.unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let studio = studio.clone();
            tokio::spawn(async move { studio.renew(member, pass, RenewalMode::Add).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let entitlement = t.studio.ledger().get_entitlement(member).await.unwrap();
    assert_eq!(entitlement.raw_remaining_classes, Allowance::Limited(110));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_exhausted_retry_budget_reports_conflict() {
    let t = TestStudio::new();
    let class = t.add_class(gentle_hatha(50));
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;
    let impatient = Studio::new(
        t.env.clone().with_retry(RetryPolicy::no_retry()),
        BookingPolicy::default(),
    );

    let handles: Vec<_> = (0..30)
        .map(|i| {
            let member = t.add_member(&format!("member {i}"));
            let studio = impatient.clone();
            tokio::spawn(async move {
                studio
                    .registry()
                    .register_member(session.id, member, None)
                    .await
            })
        })
        .collect();

    let mut confirmed = 0u32;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => confirmed += 1,
            Err(BookingError::Conflict { attempts: 1 }) => {},
            Err(other) => panic!("unexpected registration error: {other}"),
        }
    }

    let stored = t.studio.registry().get_session(session.id).await.unwrap();
    assert_eq!(stored.registered_count, confirmed);
    assert!(stored.is_consistent());
}
