//! Renewal Engine.
//!
//! A renewal always starts from a truthful expiry state: the held package is evaluated against
//! the calendar in the same read-modify-write cycle that writes the new package, so an `add`
//! renewal can never stack classes on top of an allowance that had already lapsed.

use crate::environment::StudioEnvironment;
use crate::error::Result;
use crate::expiry::{current_package, evaluate, expire, held_package};
use crate::ledger::EntitlementLedger;
use crate::retry::retry_on_conflict;
use crate::types::{
    Allowance, Entitlement, MemberId, MembershipStatus, Package, PackageHolding, PackageId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a new package combines with the current one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenewalMode {
    /// Stack the new allowance on top of what remains (unless the old package just lapsed)
    Add,
    /// Discard what remains and start over with the new allowance
    Replace,
}

impl RenewalMode {
    /// Label used in logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for RenewalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenewalMode {
    type Err = crate::error::BookingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "replace" => Ok(Self::Replace),
            other => Err(crate::error::BookingError::Validation(format!(
                "unknown renewal mode '{other}', expected 'add' or 'replace'"
            ))),
        }
    }
}

/// New remaining-classes counter for a renewal. Pure.
///
/// `add` on a package that was not expired sums the two counters with unlimited absorbing;
/// `add` right after expiry, `add` without any prior package, and `replace` all start from the
/// new allowance alone.
#[must_use]
pub fn renewed_allowance(
    current: &Entitlement,
    was_expired: bool,
    new_allowance: Allowance,
    mode: RenewalMode,
) -> Allowance {
    match mode {
        RenewalMode::Add if !was_expired && current.holding.is_some() => {
            current.raw_remaining_classes.combine(new_allowance)
        },
        RenewalMode::Add | RenewalMode::Replace => new_allowance,
    }
}

/// Apply a renewal to an entitlement, pinning the holding to `package`'s revision. Pure.
pub fn apply_renewal(
    entitlement: &mut Entitlement,
    was_expired: bool,
    package: &Package,
    mode: RenewalMode,
    today: NaiveDate,
) {
    entitlement.raw_remaining_classes =
        renewed_allowance(entitlement, was_expired, package.class_allowance, mode);
    entitlement.holding = Some(PackageHolding {
        package_id: package.id,
        revision: package.revision,
        start_date: today,
    });
    entitlement.membership_status = MembershipStatus::Active;
}

/// What a renewal did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenewalOutcome {
    /// Whether the previously held package had lapsed
    pub was_expired: bool,
    /// Mode requested by the caller
    pub requested_mode: RenewalMode,
    /// Mode actually applied (`add` degrades to `replace` after expiry)
    pub applied_mode: RenewalMode,
    /// Entitlement after the renewal
    pub entitlement: Entitlement,
}

/// Service assigning and renewing packages.
#[derive(Clone, Debug)]
pub struct RenewalEngine {
    ledger: EntitlementLedger,
}

impl RenewalEngine {
    /// Creates a new `RenewalEngine`
    #[must_use]
    pub const fn new(env: StudioEnvironment) -> Self {
        Self {
            ledger: EntitlementLedger::new(env),
        }
    }

    /// Assign `package_id` to the member, starting today.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the member or the new package does not exist, or the currently held package
    ///   is missing from the catalog
    /// - `Conflict`: retry budget exhausted
    #[tracing::instrument(skip(self))]
    pub async fn renew(
        &self,
        member_id: MemberId,
        package_id: PackageId,
        mode: RenewalMode,
    ) -> Result<RenewalOutcome> {
        let env = self.ledger.env();
        let ledger = &self.ledger;
        let package = current_package(env, package_id).await?;
        if !package.active {
            tracing::debug!(%package_id, "Renewing onto a package that is no longer on sale");
        }
        let package = &package;

        let outcome = retry_on_conflict(&env.retry, "renew", move || async move {
            let (mut account, version) = ledger.load_account(member_id).await?;
            let today = env.today();

            let was_expired = match account.entitlement.holding {
                Some(holding) => {
                    let current = held_package(env, holding).await?;
                    let lapsed = evaluate(holding.start_date, current.duration_days, today)
                        .is_expired();
                    if lapsed && expire(&mut account.entitlement) {
                        metrics::counter!(crate::metrics::EXPIRATIONS).increment(1);
                    }
                    lapsed
                },
                None => false,
            };

            let applied_mode = if mode == RenewalMode::Add
                && !was_expired
                && account.entitlement.holding.is_some()
            {
                RenewalMode::Add
            } else {
                RenewalMode::Replace
            };

            apply_renewal(&mut account.entitlement, was_expired, package, mode, today);
            let account = ledger.save_account(account, version).await?;

            Ok(RenewalOutcome {
                was_expired,
                requested_mode: mode,
                applied_mode,
                entitlement: account.entitlement,
            })
        })
        .await?;

        metrics::counter!(crate::metrics::RENEWALS, "mode" => outcome.applied_mode.as_str())
            .increment(1);
        tracing::info!(
            %package_id,
            requested = %outcome.requested_mode,
            applied = %outcome.applied_mode,
            was_expired = outcome.was_expired,
            remaining = %outcome.entitlement.raw_remaining_classes,
            "Package renewed"
        );
        Ok(outcome)
    }
}
