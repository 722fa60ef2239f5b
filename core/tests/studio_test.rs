//! Member-facing workflows through the `Studio` facade.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::Duration;
use studio_core::environment::StudioCalendar;
use studio_core::error::{BookingError, EntitlementGap};
use studio_core::renewal::RenewalMode;
use studio_core::studio::BookingPolicy;
use studio_core::types::{Allowance, MembershipStatus, Money};
use studio_core::NewPackage;
use studio_testing::fixtures::{date, five_class_pass, instant, slot, ten_class_pass, vinyasa};
use studio_testing::TestStudio;

#[tokio::test]
async fn booking_requires_a_package() {
    let t = TestStudio::at("2024-01-15T08:00:00Z");
    let member = t.add_member("Sam");
    let class = t.add_class(vinyasa());
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;

    let refused = t.studio.book_class(session.id, member, None).await;

    assert_eq!(
        refused,
        Err(BookingError::NoEntitlement {
            member_id: member,
            reason: EntitlementGap::NoPackage,
        })
    );
    assert_eq!(
        t.studio.registry().get_session(session.id).await.unwrap().registered_count,
        0
    );
}

#[tokio::test]
async fn booking_with_a_live_package_registers() {
    let t = TestStudio::at("2024-01-15T08:00:00Z");
    let member = t.add_member("Sam");
    let pass = t.add_package(ten_class_pass());
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();
    let class = t.add_class(vinyasa());
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;

    let booked = t
        .studio
        .book_class(session.id, member, Some("first class".to_string()))
        .await
        .unwrap();

    let registration = booked.active_registration(member).unwrap();
    assert_eq!(registration.notes.as_deref(), Some("first class"));
    assert_eq!(booked.registered_count, 1);
}

#[tokio::test]
async fn booking_is_refused_once_the_package_lapses() {
    let t = TestStudio::at("2024-01-01T08:00:00Z");
    let member = t.add_member("Sam");
    let pass = t.add_package(ten_class_pass());
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();
    let class = t.add_class(vinyasa());

    t.advance_days(30);
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;
    let refused = t.studio.book_class(session.id, member, None).await;

    assert!(matches!(
        refused,
        Err(BookingError::NoEntitlement {
            reason: EntitlementGap::NotActive(MembershipStatus::Expired),
            ..
        })
    ));
    assert_eq!(
        t.studio.ledger().get_entitlement(member).await.unwrap().membership_status,
        MembershipStatus::Expired
    );
}

#[tokio::test]
async fn suspended_member_cannot_book() {
    let t = TestStudio::new();
    let member = t.add_member("Sam");
    let pass = t.add_package(ten_class_pass());
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();
    t.studio
        .ledger()
        .set_membership_status(member, MembershipStatus::Suspended)
        .await
        .unwrap();
    let class = t.add_class(vinyasa());
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;

    let refused = t.studio.book_class(session.id, member, None).await;

    assert!(matches!(
        refused,
        Err(BookingError::NoEntitlement {
            reason: EntitlementGap::NotActive(MembershipStatus::Suspended),
            ..
        })
    ));
}

#[tokio::test]
async fn booking_stops_when_classes_are_used_up() {
    let t = TestStudio::new();
    let member = t.add_member("Sam");
    let single = t.add_package(NewPackage {
        name: "Drop-in".to_string(),
        price: Money::from_cents(1_800),
        duration_days: 7,
        class_allowance: Allowance::Limited(1),
    });
    t.studio.renew(member, single, RenewalMode::Replace).await.unwrap();
    let class = t.add_class(vinyasa());
    let first = t.schedule(class, t.today(), slot((9, 0), (10, 0))).await;
    let second = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;

    t.studio.book_class(first.id, member, None).await.unwrap();
    t.studio
        .registry()
        .mark_attendance(first.id, member, true)
        .await
        .unwrap();

    let refused = t.studio.book_class(second.id, member, None).await;
    assert!(matches!(
        refused,
        Err(BookingError::NoEntitlement {
            reason: EntitlementGap::Exhausted,
            ..
        })
    ));
}

#[tokio::test]
async fn entitlement_gate_can_be_turned_off() {
    let t = TestStudio::new().with_policy(BookingPolicy {
        require_entitlement: false,
        ..BookingPolicy::default()
    });
    let member = t.add_member("Walk-in");
    let class = t.add_class(vinyasa());
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;

    let booked = t.studio.book_class(session.id, member, None).await.unwrap();

    assert_eq!(booked.registered_count, 1);
}

#[tokio::test]
async fn member_cancellation_respects_the_window() {
    let t = TestStudio::at("2024-01-15T16:00:00Z");
    let member = t.add_member("Sam");
    let pass = t.add_package(ten_class_pass());
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();
    let class = t.add_class(vinyasa());
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;
    t.studio.book_class(session.id, member, None).await.unwrap();

    // 17:01, 59 minutes before start
    t.advance_minutes(61);
    let window = t.studio.cancel_window(session.id).await.unwrap();
    assert!(!window.allowed);
    assert_eq!(window.minutes_until_start, 59);

    let refused = t.studio.cancel_booking(session.id, member).await;
    assert_eq!(
        refused,
        Err(BookingError::CancellationWindowClosed {
            minutes_until_start: 59,
            started: false,
        })
    );

    // staff can still cancel
    let cancelled = t
        .studio
        .registry()
        .cancel_registration(session.id, member)
        .await
        .unwrap();
    assert_eq!(cancelled.registered_count, 0);
}

#[tokio::test]
async fn member_can_cancel_exactly_at_the_boundary() {
    let t = TestStudio::at("2024-01-15T17:00:00Z");
    let member = t.add_member("Sam");
    let pass = t.add_package(ten_class_pass());
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();
    let class = t.add_class(vinyasa());
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;
    t.studio.book_class(session.id, member, None).await.unwrap();

    let cancelled = t.studio.cancel_booking(session.id, member).await.unwrap();

    assert_eq!(cancelled.registered_count, 0);
}

#[tokio::test]
async fn started_session_reports_started() {
    let t = TestStudio::at("2024-01-15T18:10:00Z");
    let class = t.add_class(vinyasa());
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;

    let window = t.studio.cancel_window(session.id).await.unwrap();

    assert!(window.started);
    assert!(!window.allowed);
    assert_eq!(window.minutes_until_start, -10);
}

#[tokio::test]
async fn window_uses_the_studio_local_time() {
    // 16:30 UTC is 17:30 at UTC+1, so an 18:00 local start is 30 minutes away.
    let t = TestStudio::at("2024-01-15T16:30:00Z")
        .with_calendar(StudioCalendar::from_offset_minutes(60).unwrap());
    let class = t.add_class(vinyasa());
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;

    let window = t.studio.cancel_window(session.id).await.unwrap();

    assert_eq!(window.minutes_until_start, 30);
    assert!(!window.allowed);
}

#[tokio::test]
async fn custom_window_length() {
    let t = TestStudio::at("2024-01-15T17:00:00Z").with_policy(BookingPolicy {
        cancellation_window_minutes: 120,
        ..BookingPolicy::default()
    });
    let class = t.add_class(vinyasa());
    let session = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;

    let window = t.studio.cancel_window(session.id).await.unwrap();

    assert!(!window.allowed);
    assert_eq!(window.minutes_until_start, 60);
}

#[tokio::test]
async fn summary_reflects_live_usage_and_expiry() {
    let t = TestStudio::at("2024-01-01T08:00:00Z");
    let member = t.add_member("Sam");
    let pass = t.add_package(five_class_pass());
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();
    let class = t.add_class(vinyasa());
    let session = t.schedule(class, date(2024, 1, 2), slot((7, 0), (8, 0))).await;

    t.clock.set(instant("2024-01-02T09:00:00Z"));
    t.studio.book_class(session.id, member, None).await.unwrap();
    t.studio
        .registry()
        .mark_attendance(session.id, member, true)
        .await
        .unwrap();

    let summary = t.studio.entitlement_summary(member).await.unwrap();
    assert_eq!(summary.status, MembershipStatus::Active);
    assert_eq!(summary.package_id, Some(pass));
    assert_eq!(summary.remaining, Allowance::Limited(4));
    assert_eq!(summary.raw_remaining, Allowance::Limited(5));
    assert_eq!(summary.days_left, Some(29));
    assert!(!summary.was_expired);

    t.clock.advance(Duration::days(40));
    let summary = t.studio.entitlement_summary(member).await.unwrap();
    assert_eq!(summary.status, MembershipStatus::Expired);
    assert_eq!(summary.remaining, Allowance::ZERO);
    assert_eq!(summary.raw_remaining, Allowance::ZERO);
    assert_eq!(summary.days_left, Some(0));
    assert!(summary.was_expired);
}
