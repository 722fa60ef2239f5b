//! Member-facing workflows built from the individual services.
//!
//! [`Studio`] wires the registry, ledger, expiry evaluator, renewal engine and calculator to one
//! [`StudioEnvironment`] and adds the rules that only apply when members act for themselves:
//! booking needs a usable entitlement and cancelling respects the cancellation window. Staff
//! operations go straight to the services via the accessors.

use crate::cancellation::{can_cancel_within, CancelWindow, DEFAULT_WINDOW_MINUTES};
use crate::environment::StudioEnvironment;
use crate::error::{BookingError, EntitlementGap, Result};
use crate::expiry::{ExpiryEvaluator, ExpiryVerdict};
use crate::ledger::EntitlementLedger;
use crate::registry::SessionRegistry;
use crate::remaining::{RemainingClassesCalculator, UsagePolicy, UsageScope};
use crate::renewal::{RenewalEngine, RenewalMode, RenewalOutcome};
use crate::types::{Allowance, MemberId, MembershipStatus, PackageId, Session, SessionId};
use serde::{Deserialize, Serialize};

/// Rules for member-facing actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookingPolicy {
    /// Minutes before the start after which members can no longer cancel
    pub cancellation_window_minutes: i64,
    /// Whether booking requires an active package with classes left
    pub require_entitlement: bool,
    /// Which registrations count against the allowance
    pub usage_policy: UsagePolicy,
    /// Which sessions are searched for usage
    pub usage_scope: UsageScope,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            cancellation_window_minutes: DEFAULT_WINDOW_MINUTES,
            require_entitlement: true,
            usage_policy: UsagePolicy::default(),
            usage_scope: UsageScope::default(),
        }
    }
}

/// What a member sees about their entitlement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSummary {
    /// Member
    pub member_id: MemberId,
    /// Membership status after the expiry check
    pub status: MembershipStatus,
    /// Held package
    pub package_id: Option<PackageId>,
    /// Computed remaining classes
    pub remaining: Allowance,
    /// Stored counter, for reference only
    pub raw_remaining: Allowance,
    /// Days left in the package window
    pub days_left: Option<i64>,
    /// Whether the package window has passed
    pub was_expired: bool,
}

/// Entry point for studio workflows.
#[derive(Clone, Debug)]
pub struct Studio {
    env: StudioEnvironment,
    policy: BookingPolicy,
    registry: SessionRegistry,
    ledger: EntitlementLedger,
    expiry: ExpiryEvaluator,
    renewal: RenewalEngine,
    remaining: RemainingClassesCalculator,
}

impl Studio {
    /// Wire every service to `env`
    #[must_use]
    pub fn new(env: StudioEnvironment, policy: BookingPolicy) -> Self {
        Self {
            registry: SessionRegistry::new(env.clone()),
            ledger: EntitlementLedger::new(env.clone()),
            expiry: ExpiryEvaluator::new(env.clone()),
            renewal: RenewalEngine::new(env.clone()),
            remaining: RemainingClassesCalculator::new(env.clone())
                .with_policy(policy.usage_policy)
                .with_scope(policy.usage_scope),
            env,
            policy,
        }
    }

    /// Session registry
    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Entitlement ledger
    #[must_use]
    pub const fn ledger(&self) -> &EntitlementLedger {
        &self.ledger
    }

    /// Expiry evaluator
    #[must_use]
    pub const fn expiry(&self) -> &ExpiryEvaluator {
        &self.expiry
    }

    /// Renewal engine
    #[must_use]
    pub const fn renewal(&self) -> &RenewalEngine {
        &self.renewal
    }

    /// Remaining-classes calculator
    #[must_use]
    pub const fn remaining(&self) -> &RemainingClassesCalculator {
        &self.remaining
    }

    /// Active rules
    #[must_use]
    pub const fn policy(&self) -> BookingPolicy {
        self.policy
    }

    /// Book a session on behalf of the member.
    ///
    /// Runs an expiry check first, then requires an active membership with classes left
    /// (unless the policy turns that off) before registering.
    ///
    /// # Errors
    ///
    /// - `NoEntitlement`: no package, membership not active, or no classes left
    /// - Everything [`SessionRegistry::register_member`] returns
    #[tracing::instrument(skip(self, notes))]
    pub async fn book_class(
        &self,
        session_id: SessionId,
        member_id: MemberId,
        notes: Option<String>,
    ) -> Result<Session> {
        if self.policy.require_entitlement {
            self.ensure_entitled(member_id).await?;
        }
        self.registry
            .register_member(session_id, member_id, notes)
            .await
    }

    /// Cancel the member's own booking if the cancellation window is still open.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such session
    /// - `CancellationWindowClosed`: too close to the start, or already started
    #[tracing::instrument(skip(self))]
    pub async fn cancel_booking(&self, session_id: SessionId, member_id: MemberId) -> Result<Session> {
        let window = self.cancel_window(session_id).await?;
        if !window.allowed {
            tracing::debug!(
                minutes_until_start = window.minutes_until_start,
                started = window.started,
                "Member cancellation refused"
            );
            return Err(BookingError::CancellationWindowClosed {
                minutes_until_start: window.minutes_until_start,
                started: window.started,
            });
        }
        self.registry.cancel_registration(session_id, member_id).await
    }

    /// Whether a member could cancel a booking for the session right now.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such session
    pub async fn cancel_window(&self, session_id: SessionId) -> Result<CancelWindow> {
        let session = self.registry.get_session(session_id).await?;
        let now = self.env.calendar.local(self.env.now());
        Ok(can_cancel_within(
            session.date,
            session.start_time,
            now,
            self.policy.cancellation_window_minutes,
        ))
    }

    /// Renew or assign a package.
    ///
    /// # Errors
    ///
    /// See [`RenewalEngine::renew`].
    pub async fn renew(
        &self,
        member_id: MemberId,
        package_id: PackageId,
        mode: RenewalMode,
    ) -> Result<RenewalOutcome> {
        self.renewal.renew(member_id, package_id, mode).await
    }

    /// Entitlement overview with a fresh expiry check and live remaining count.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the member is unknown or the held package is missing from the catalog
    #[tracing::instrument(skip(self))]
    pub async fn entitlement_summary(&self, member_id: MemberId) -> Result<EntitlementSummary> {
        let check = self.expiry.check_and_expire(member_id).await?;
        let remaining = self
            .remaining
            .breakdown_for(member_id, &check.entitlement)
            .await?;

        Ok(EntitlementSummary {
            member_id,
            status: check.entitlement.membership_status,
            package_id: check.entitlement.package_id(),
            remaining: remaining.remaining,
            raw_remaining: check.entitlement.raw_remaining_classes,
            days_left: check.verdict.days_left(),
            was_expired: check.was_expired,
        })
    }

    async fn ensure_entitled(&self, member_id: MemberId) -> Result<()> {
        let check = self.expiry.check_and_expire(member_id).await?;
        let entitlement = &check.entitlement;

        let gap = if check.verdict == ExpiryVerdict::NoPackage {
            Some(EntitlementGap::NoPackage)
        } else if entitlement.membership_status != MembershipStatus::Active {
            Some(EntitlementGap::NotActive(entitlement.membership_status))
        } else {
            let remaining = self.remaining.breakdown_for(member_id, entitlement).await?;
            (!remaining.remaining.has_remaining()).then_some(EntitlementGap::Exhausted)
        };

        match gap {
            None => Ok(()),
            Some(reason) => {
                tracing::debug!(%reason, "Booking refused");
                Err(BookingError::NoEntitlement { member_id, reason })
            },
        }
    }
}

