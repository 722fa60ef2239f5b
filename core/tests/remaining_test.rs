//! Remaining classes computed live from the registry, including the 30-day walkthrough
//! starting 2024-01-01.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use studio_core::remaining::{RemainingClassesCalculator, UsagePolicy, UsageScope};
use studio_core::renewal::RenewalMode;
use studio_core::types::{Allowance, MembershipStatus, Money, SessionId};
use studio_core::NewPackage;
use studio_testing::fixtures::{date, five_class_pass, slot, unlimited_month, vinyasa};
use studio_testing::TestStudio;

/// Schedule `count` sessions of one class on today's date, an hour apart from 06:00.
async fn sessions_today(t: &TestStudio, count: u32) -> Vec<SessionId> {
    let class = t.add_class(vinyasa());
    let mut ids = Vec::new();
    for i in 0..count {
        let start = 6 + i;
        let session = t.schedule(class, t.today(), slot((start, 0), (start, 45))).await;
        ids.push(session.id);
    }
    ids
}

#[tokio::test]
async fn eight_class_package_over_its_lifetime() {
    let t = TestStudio::at("2024-01-01T08:00:00Z");
    let member = t.add_member("Sam");
    let eight = t.add_package(NewPackage {
        name: "8-Class Pass".to_string(),
        price: Money::from_cents(12_000),
        duration_days: 30,
        class_allowance: Allowance::Limited(8),
    });
    t.studio.renew(member, eight, RenewalMode::Replace).await.unwrap();
    let remaining = t.studio.remaining();

    // 2024-01-15: 14 days in
    t.advance_days(14);
    assert_eq!(t.today(), date(2024, 1, 15));
    let check = t.studio.expiry().check_and_expire(member).await.unwrap();
    assert!(!check.was_expired);
    assert_eq!(check.verdict.days_left(), Some(16));

    let sessions = sessions_today(&t, 3).await;
    let registry = t.studio.registry();
    for &session in &sessions {
        registry.register_member(session, member, None).await.unwrap();
    }
    assert_eq!(
        remaining.remaining_classes(member).await.unwrap(),
        Allowance::Limited(8)
    );

    registry.mark_attendance(sessions[0], member, true).await.unwrap();
    registry.mark_attendance(sessions[1], member, true).await.unwrap();
    assert_eq!(
        remaining.remaining_classes(member).await.unwrap(),
        Allowance::Limited(6)
    );

    registry.cancel_registration(sessions[2], member).await.unwrap();
    assert_eq!(
        remaining.remaining_classes(member).await.unwrap(),
        Allowance::Limited(6)
    );

    // 2024-02-05: 35 days in
    t.advance_days(21);
    assert_eq!(t.today(), date(2024, 2, 5));
    let check = t.studio.expiry().check_and_expire(member).await.unwrap();
    assert!(check.was_expired);
    assert_eq!(check.entitlement.membership_status, MembershipStatus::Expired);
    assert_eq!(
        remaining.remaining_classes(member).await.unwrap(),
        Allowance::ZERO
    );
}

#[tokio::test]
async fn registration_alone_never_consumes_a_class() {
    let t = TestStudio::new();
    let member = t.add_member("Sam");
    let pass = t.add_package(five_class_pass());
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();

    let sessions = sessions_today(&t, 4).await;
    for &session in &sessions {
        t.studio
            .registry()
            .register_member(session, member, None)
            .await
            .unwrap();
    }

    let breakdown = t.studio.remaining().breakdown(member).await.unwrap();
    assert_eq!(breakdown.allowance, Some(Allowance::Limited(5)));
    assert_eq!(breakdown.used, 0);
    assert_eq!(breakdown.remaining, Allowance::Limited(5));
}

#[tokio::test]
async fn no_shows_count_and_remaining_floors_at_zero() {
    let t = TestStudio::new();
    let member = t.add_member("Sam");
    let pass = t.add_package(NewPackage {
        name: "Drop-in Pair".to_string(),
        price: Money::from_cents(3_000),
        duration_days: 30,
        class_allowance: Allowance::Limited(2),
    });
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();

    let sessions = sessions_today(&t, 3).await;
    let registry = t.studio.registry();
    for (i, &session) in sessions.iter().enumerate() {
        registry.register_member(session, member, None).await.unwrap();
        registry.mark_attendance(session, member, i != 1).await.unwrap();
    }

    let breakdown = t.studio.remaining().breakdown(member).await.unwrap();
    assert_eq!(breakdown.used, 3);
    assert_eq!(breakdown.remaining, Allowance::ZERO);
}

#[tokio::test]
async fn unlimited_package_stays_unlimited() {
    let t = TestStudio::new();
    let member = t.add_member("Sam");
    let pass = t.add_package(unlimited_month());
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();

    let sessions = sessions_today(&t, 3).await;
    for &session in &sessions {
        t.studio
            .registry()
            .register_member(session, member, None)
            .await
            .unwrap();
        t.studio
            .registry()
            .mark_attendance(session, member, true)
            .await
            .unwrap();
    }

    assert_eq!(
        t.studio.remaining().remaining_classes(member).await.unwrap(),
        Allowance::Unlimited
    );
}

#[tokio::test]
async fn expired_unlimited_package_has_nothing_left() {
    let t = TestStudio::new();
    let member = t.add_member("Sam");
    let pass = t.add_package(unlimited_month());
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();

    t.advance_days(30);
    t.studio.expiry().check_and_expire(member).await.unwrap();

    assert_eq!(
        t.studio.remaining().remaining_classes(member).await.unwrap(),
        Allowance::ZERO
    );
}

#[tokio::test]
async fn member_without_package_has_nothing_left() {
    let t = TestStudio::new();
    let member = t.add_member("Sam");

    let breakdown = t.studio.remaining().breakdown(member).await.unwrap();

    assert_eq!(breakdown.allowance, None);
    assert_eq!(breakdown.remaining, Allowance::ZERO);
}

#[tokio::test]
async fn remaining_ignores_the_stored_counter() {
    let t = TestStudio::new();
    let member = t.add_member("Sam");
    let pass = t.add_package(five_class_pass());
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();
    t.studio.renew(member, pass, RenewalMode::Add).await.unwrap();

    let entitlement = t.studio.ledger().get_entitlement(member).await.unwrap();
    assert_eq!(entitlement.raw_remaining_classes, Allowance::Limited(10));
    assert_eq!(
        t.studio.remaining().remaining_classes(member).await.unwrap(),
        Allowance::Limited(5)
    );
}

#[tokio::test]
async fn usage_policies_differ_on_confirmed_registrations() {
    let t = TestStudio::at("2024-01-15T12:00:00Z");
    let member = t.add_member("Sam");
    let pass = t.add_package(five_class_pass());
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();

    let class = t.add_class(vinyasa());
    let morning = t.schedule(class, t.today(), slot((7, 0), (8, 0))).await;
    let evening = t.schedule(class, t.today(), slot((18, 0), (19, 0))).await;
    let cancelled = t.schedule(class, t.today(), slot((19, 0), (20, 0))).await;
    let registry = t.studio.registry();
    registry.register_member(morning.id, member, None).await.unwrap();
    registry.register_member(evening.id, member, None).await.unwrap();
    registry.register_member(cancelled.id, member, None).await.unwrap();
    registry.cancel_registration(cancelled.id, member).await.unwrap();

    let used = |policy| {
        let calculator = RemainingClassesCalculator::new(t.env.clone()).with_policy(policy);
        async move { calculator.breakdown(member).await.unwrap().used }
    };

    assert_eq!(used(UsagePolicy::Resolved).await, 0);
    assert_eq!(used(UsagePolicy::ResolvedOrLapsed).await, 1);
    assert_eq!(used(UsagePolicy::AllNonCancelled).await, 2);
}

#[tokio::test]
async fn scope_can_start_at_the_current_package() {
    let t = TestStudio::at("2024-01-01T08:00:00Z");
    let member = t.add_member("Sam");
    let pass = t.add_package(five_class_pass());
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();

    let sessions = sessions_today(&t, 2).await;
    for &session in &sessions {
        t.studio
            .registry()
            .register_member(session, member, None)
            .await
            .unwrap();
        t.studio
            .registry()
            .mark_attendance(session, member, true)
            .await
            .unwrap();
    }

    t.advance_days(40);
    t.studio.renew(member, pass, RenewalMode::Replace).await.unwrap();

    let all_time = RemainingClassesCalculator::new(t.env.clone());
    let current = RemainingClassesCalculator::new(t.env.clone())
        .with_scope(UsageScope::SincePackageStart);

    assert_eq!(
        all_time.remaining_classes(member).await.unwrap(),
        Allowance::Limited(3)
    );
    assert_eq!(
        current.remaining_classes(member).await.unwrap(),
        Allowance::Limited(5)
    );
}

#[test]
fn policy_labels_parse_back() {
    for policy in [
        UsagePolicy::Resolved,
        UsagePolicy::ResolvedOrLapsed,
        UsagePolicy::AllNonCancelled,
    ] {
        assert_eq!(policy.as_str().parse::<UsagePolicy>().unwrap(), policy);
    }
    assert!("everything".parse::<UsagePolicy>().is_err());
    assert_eq!(
        "since-package-start".parse::<UsageScope>().unwrap(),
        UsageScope::SincePackageStart
    );
}
