//! The walkthrough against the in-memory backend.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use std::time::Duration;
use studio::config::StorageBackend;
use studio::{walkthrough, App, Config};
use studio_core::types::{Allowance, MembershipStatus};

#[tokio::test]
async fn walkthrough_books_refuses_and_summarises() {
    let app = App::build(&Config::default()).await.unwrap();
    assert_eq!(app.backend(), StorageBackend::Memory);

    let report = walkthrough::run(&app).await.unwrap();

    assert_eq!(report.sessions_created, 4);
    assert_eq!(report.refused_without_package, 1);
    assert_eq!(report.refused_full, 1);
    assert_eq!(report.bookings, 3);

    let summary = |name: &str| {
        report
            .summaries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.clone())
            .unwrap()
    };

    let ana = summary("Ana Lima");
    assert_eq!(ana.status, MembershipStatus::Active);
    assert_eq!(ana.remaining, Allowance::Limited(10));
    assert_eq!(ana.days_left, Some(30));

    let ben = summary("Ben Osei");
    assert_eq!(ben.remaining, Allowance::Unlimited);

    // The no-show is charged; the add renewal only moves the stored counter.
    let chloe = summary("Chloe Park");
    assert_eq!(chloe.remaining, Allowance::Limited(9));
    assert_eq!(chloe.raw_remaining, Allowance::Limited(20));
}

#[tokio::test]
async fn expiry_sweep_runs_until_aborted() {
    let app = App::build(&Config::default()).await.unwrap();

    let handle = app.spawn_expiry_sweep(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(35)).await;
    assert!(!handle.is_finished());

    handle.abort();
    let joined = handle.await;
    assert!(joined.unwrap_err().is_cancelled());
}
