//! Scripted tour of a studio week, run by the `studio` binary.
//!
//! Sets up a small catalog, schedules tomorrow's classes and walks three members through
//! booking, a full class, a cancellation inside the window, attendance and a renewal.

use crate::app::App;
use anyhow::Context;
use chrono::{Duration, NaiveTime};
use studio_core::error::{BookingError, EntitlementGap};
use studio_core::registry::SessionTemplate;
use studio_core::renewal::RenewalMode;
use studio_core::types::{Allowance, ClassInfo, Difficulty, Money, TimeRange};
use studio_core::{EntitlementSummary, NewPackage};
use tracing::info;

/// What happened during the tour.
#[derive(Clone, Debug, Default)]
pub struct WalkthroughReport {
    /// Sessions the bulk scheduler created
    pub sessions_created: usize,
    /// Bookings that went through
    pub bookings: usize,
    /// Bookings refused for lack of a live package
    pub refused_without_package: usize,
    /// Bookings refused because the class was full
    pub refused_full: usize,
    /// Final entitlement summaries, one per member
    pub summaries: Vec<(String, EntitlementSummary)>,
}

fn at(hour: u32, minute: u32) -> anyhow::Result<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0).with_context(|| format!("invalid time {hour}:{minute}"))
}

/// Run the tour against `app`.
///
/// # Errors
///
/// Returns an error if any step fails in a way the script does not expect.
#[allow(clippy::too_many_lines)] // One linear script reads best in one place
pub async fn run(app: &App) -> anyhow::Result<WalkthroughReport> {
    let mut report = WalkthroughReport::default();
    let studio = &app.studio;

    let ten_class = app.packages.create_package(NewPackage {
        name: "10-Class Pass".to_string(),
        price: Money::from_cents(15_000),
        duration_days: 30,
        class_allowance: Allowance::Limited(10),
    })?;
    let unlimited = app.packages.create_package(NewPackage {
        name: "Unlimited Month".to_string(),
        price: Money::from_cents(19_900),
        duration_days: 30,
        class_allowance: Allowance::Unlimited,
    })?;

    let flow = app.classes.add(ClassInfo {
        name: "Vinyasa Flow".to_string(),
        instructor: "Maya".to_string(),
        difficulty: Difficulty::AllLevels,
        max_capacity: 2,
        active: true,
    });

    let ana = app.members.add("Ana Lima");
    let ben = app.members.add("Ben Osei");
    let chloe = app.members.add("Chloe Park");

    let tomorrow = app.today() + Duration::days(1);
    let outcome = studio
        .registry()
        .create_sessions_bulk(
            SessionTemplate {
                class_id: flow,
                capacity: None,
                notes: Some("Bring a mat".to_string()),
            },
            &[tomorrow, tomorrow + Duration::days(1)],
            &[
                TimeRange::new(at(7, 0)?, at(8, 0)?),
                TimeRange::new(at(18, 0)?, at(19, 15)?),
            ],
        )
        .await?;
    report.sessions_created = outcome.created.len();
    info!(
        created = outcome.created.len(),
        failed = outcome.failed.len(),
        "Scheduled the week"
    );
    let morning = outcome
        .created
        .first()
        .context("bulk scheduling created no sessions")?
        .id;

    // Ben has no package yet.
    match studio.book_class(morning, ben, None).await {
        Err(BookingError::NoEntitlement {
            reason: EntitlementGap::NoPackage,
            ..
        }) => {
            report.refused_without_package += 1;
            info!(member = %ben, "Booking refused: no package");
        },
        other => anyhow::bail!("expected a refusal without a package, got {other:?}"),
    }

    studio.renew(ana, ten_class.id, RenewalMode::Replace).await?;
    studio.renew(ben, unlimited.id, RenewalMode::Replace).await?;
    studio.renew(chloe, ten_class.id, RenewalMode::Replace).await?;

    for member in [ana, ben] {
        studio.book_class(morning, member, None).await?;
        report.bookings += 1;
    }
    match studio.book_class(morning, chloe, None).await {
        Err(BookingError::SessionFull { capacity, .. }) => {
            report.refused_full += 1;
            info!(capacity, "Morning class is full");
        },
        other => anyhow::bail!("expected a full class, got {other:?}"),
    }

    let window = studio.cancel_window(morning).await?;
    info!(
        minutes_until_start = window.minutes_until_start,
        allowed = window.allowed,
        "Cancellation window"
    );
    if window.allowed {
        studio.cancel_booking(morning, ana).await?;
        studio.book_class(morning, chloe, None).await?;
        report.bookings += 1;
    }

    for registration in studio.registry().session_roster(morning).await? {
        let attended = registration.member_id != chloe;
        studio
            .registry()
            .mark_attendance(morning, registration.member_id, attended)
            .await?;
        info!(member = %registration.member_name, attended, "Attendance recorded");
    }

    studio.renew(chloe, ten_class.id, RenewalMode::Add).await?;

    for (name, member) in [("Ana Lima", ana), ("Ben Osei", ben), ("Chloe Park", chloe)] {
        let summary = studio.entitlement_summary(member).await?;
        info!(
            member = name,
            status = summary.status.as_str(),
            remaining = %summary.remaining,
            raw_remaining = %summary.raw_remaining,
            days_left = ?summary.days_left,
            "Entitlement"
        );
        report.summaries.push((name.to_string(), summary));
    }

    Ok(report)
}
