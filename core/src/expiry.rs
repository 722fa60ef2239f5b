//! Expiry Evaluator.
//!
//! Expiry is evaluated lazily: nothing flips a membership to `expired` until someone calls
//! [`ExpiryEvaluator::check_and_expire`] (before a renewal, before showing an entitlement, or
//! from the optional [`sweep`](ExpiryEvaluator::sweep)). Until then a stored `active` status may
//! be stale.
//!
//! A package held since `start_date` is expired once `today - start_date >= duration_days`
//! whole days, so a 30-day package started on 2024-01-01 is last usable on 2024-01-30.

use crate::environment::StudioEnvironment;
use crate::error::{BookingError, EntityKind, Result};
use crate::ledger::EntitlementLedger;
use crate::retry::retry_on_conflict;
use crate::types::{
    Allowance, Entitlement, MemberId, MembershipStatus, Package, PackageHolding, PackageId,
};
use chrono::NaiveDate;

/// Result of evaluating a held package against the calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpiryVerdict {
    /// Nothing to evaluate: no package held
    NoPackage,
    /// Package still within its window
    Valid {
        /// Whole days elapsed since the package started
        days_elapsed: i64,
        /// Whole days left, at least 1
        days_left: i64,
    },
    /// Package window has passed
    Expired {
        /// Whole days elapsed since the package started
        days_elapsed: i64,
    },
}

impl ExpiryVerdict {
    /// Whether the window has passed
    #[must_use]
    pub const fn is_expired(self) -> bool {
        matches!(self, Self::Expired { .. })
    }

    /// Days left in the window; `None` without a package, 0 once expired.
    #[must_use]
    pub const fn days_left(self) -> Option<i64> {
        match self {
            Self::NoPackage => None,
            Self::Valid { days_left, .. } => Some(days_left),
            Self::Expired { .. } => Some(0),
        }
    }
}

/// Evaluate a package window. Pure.
#[must_use]
pub fn evaluate(start_date: NaiveDate, duration_days: u32, today: NaiveDate) -> ExpiryVerdict {
    let days_elapsed = (today - start_date).num_days();
    let duration = i64::from(duration_days);

    if days_elapsed >= duration {
        ExpiryVerdict::Expired { days_elapsed }
    } else {
        ExpiryVerdict::Valid {
            days_elapsed,
            days_left: duration - days_elapsed,
        }
    }
}

/// Void an entitlement whose window has passed.
///
/// Returns `true` if anything changed. The package reference and start date are kept so the
/// member's history stays visible; only the allowance counter and status are reset.
pub fn expire(entitlement: &mut Entitlement) -> bool {
    if entitlement.membership_status == MembershipStatus::Expired
        && entitlement.raw_remaining_classes == Allowance::ZERO
    {
        return false;
    }
    entitlement.raw_remaining_classes = Allowance::ZERO;
    entitlement.membership_status = MembershipStatus::Expired;
    true
}

/// Outcome of [`ExpiryEvaluator::check_and_expire`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpiryCheck {
    /// Whether the held package's window has passed
    pub was_expired: bool,
    /// Entitlement after the check
    pub entitlement: Entitlement,
    /// Verdict the check was based on
    pub verdict: ExpiryVerdict,
}

/// Totals from [`ExpiryEvaluator::sweep`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Members evaluated
    pub checked: usize,
    /// Members whose package was found expired
    pub expired: usize,
    /// Members whose evaluation failed
    pub failed: usize,
}

/// Service evaluating package expiry against the studio calendar.
#[derive(Clone, Debug)]
pub struct ExpiryEvaluator {
    ledger: EntitlementLedger,
}

impl ExpiryEvaluator {
    /// Creates a new `ExpiryEvaluator`
    #[must_use]
    pub const fn new(env: StudioEnvironment) -> Self {
        Self {
            ledger: EntitlementLedger::new(env),
        }
    }

    /// Check the member's package window and persist `expired` if it has passed.
    ///
    /// `was_expired` is `true` whenever the window has passed, including when an earlier check
    /// already recorded it. A member without a package is a no-op.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the member is unknown, or the held package is missing from the catalog
    /// - `Conflict`: retry budget exhausted
    #[tracing::instrument(skip(self))]
    pub async fn check_and_expire(&self, member_id: MemberId) -> Result<ExpiryCheck> {
        let env = self.ledger.env();
        let ledger = &self.ledger;

        retry_on_conflict(&env.retry, "check_and_expire", move || async move {
            let (mut account, version) = ledger.load_account(member_id).await?;

            let Some(holding) = account.entitlement.holding else {
                return Ok(ExpiryCheck {
                    was_expired: false,
                    entitlement: account.entitlement,
                    verdict: ExpiryVerdict::NoPackage,
                });
            };

            let package = held_package(env, holding).await?;
            let verdict = evaluate(holding.start_date, package.duration_days, env.today());

            if verdict.is_expired() && expire(&mut account.entitlement) {
                account = ledger.save_account(account, version).await?;
                metrics::counter!(crate::metrics::EXPIRATIONS).increment(1);
                tracing::info!(
                    package_id = %holding.package_id,
                    start_date = %holding.start_date,
                    "Package expired"
                );
            }

            Ok(ExpiryCheck {
                was_expired: verdict.is_expired(),
                entitlement: account.entitlement,
                verdict,
            })
        })
        .await
    }

    /// Run [`check_and_expire`](Self::check_and_expire) for every member holding a package.
    ///
    /// Per-member failures are logged and counted; the sweep carries on.
    ///
    /// # Errors
    ///
    /// Returns an error only if the list of members cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for member_id in self.ledger.members_with_package().await? {
            report.checked += 1;
            match self.check_and_expire(member_id).await {
                Ok(check) if check.was_expired => report.expired += 1,
                Ok(_) => {},
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(%member_id, %error, "Expiry check failed during sweep");
                },
            }
        }

        tracing::info!(
            checked = report.checked,
            expired = report.expired,
            failed = report.failed,
            "Expiry sweep finished"
        );
        Ok(report)
    }
}

/// The catalog revision a member bought.
pub(crate) async fn held_package(env: &StudioEnvironment, holding: PackageHolding) -> Result<Package> {
    env.packages
        .get_package_revision(holding.package_id, holding.revision)
        .await?
        .ok_or_else(|| BookingError::not_found(EntityKind::Package, holding.package_id))
}

/// The revision currently on sale.
pub(crate) async fn current_package(env: &StudioEnvironment, package_id: PackageId) -> Result<Package> {
    env.packages
        .get_package(package_id)
        .await?
        .ok_or_else(|| BookingError::not_found(EntityKind::Package, package_id))
}
