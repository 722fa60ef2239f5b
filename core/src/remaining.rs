//! Derived-Remaining-Classes Calculator.
//!
//! Remaining classes are always recomputed from the registry: the package allowance minus the
//! member's registrations that count as usage. The `raw_remaining_classes` counter on the
//! entitlement is never consulted here.
//!
//! Which registrations count is a [`UsagePolicy`]. The default only charges a class once it is
//! resolved as attended or no-show, so registering leaves the remaining count untouched and
//! cancelling a never-attended booking has nothing to give back.

use crate::environment::StudioEnvironment;
use crate::error::{BookingError, Result};
use crate::expiry::held_package;
use crate::ledger::EntitlementLedger;
use crate::store::SessionQuery;
use crate::types::{Allowance, Entitlement, MemberId, MembershipStatus, RegistrationStatus, Session};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which registrations are charged against the allowance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsagePolicy {
    /// `attended` and `no-show`
    #[default]
    Resolved,
    /// `attended`, `no-show`, and `confirmed` registrations whose session has already ended
    ResolvedOrLapsed,
    /// Every registration that is not `cancelled`
    AllNonCancelled,
}

impl UsagePolicy {
    /// Whether a registration with `status` in a session that has (or has not) ended counts.
    #[must_use]
    pub const fn counts(self, status: RegistrationStatus, session_ended: bool) -> bool {
        match (self, status) {
            (_, RegistrationStatus::Cancelled) => false,
            (_, RegistrationStatus::Attended | RegistrationStatus::NoShow) => true,
            (Self::Resolved, RegistrationStatus::Confirmed) => false,
            (Self::ResolvedOrLapsed, RegistrationStatus::Confirmed) => session_ended,
            (Self::AllNonCancelled, RegistrationStatus::Confirmed) => true,
        }
    }

    /// Label used in configuration
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::ResolvedOrLapsed => "resolved-or-lapsed",
            Self::AllNonCancelled => "all-non-cancelled",
        }
    }
}

impl FromStr for UsagePolicy {
    type Err = BookingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resolved" => Ok(Self::Resolved),
            "resolved-or-lapsed" => Ok(Self::ResolvedOrLapsed),
            "all-non-cancelled" => Ok(Self::AllNonCancelled),
            other => Err(BookingError::Validation(format!("unknown usage policy '{other}'"))),
        }
    }
}

/// Which sessions are searched for usage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsageScope {
    /// Every session in the registry
    #[default]
    AllTime,
    /// Only sessions dated on or after the current package's start date
    SincePackageStart,
}

impl FromStr for UsageScope {
    type Err = BookingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all-time" => Ok(Self::AllTime),
            "since-package-start" => Ok(Self::SincePackageStart),
            other => Err(BookingError::Validation(format!("unknown usage scope '{other}'"))),
        }
    }
}

/// Count the member's registrations that are charged under `policy`. Pure.
///
/// `now` is the studio's local wall-clock time, used to decide whether a session has ended.
#[must_use]
pub fn count_usage(
    sessions: &[Session],
    member_id: MemberId,
    policy: UsagePolicy,
    now: NaiveDateTime,
    since: Option<NaiveDate>,
) -> u32 {
    let used = sessions
        .iter()
        .filter(|session| since.is_none_or(|from| session.date >= from))
        .flat_map(|session| {
            let ended = session.local_end() <= now;
            session
                .registrations
                .iter()
                .filter(move |r| r.member_id == member_id && policy.counts(r.status, ended))
        })
        .count();
    u32::try_from(used).unwrap_or(u32::MAX)
}

/// Remaining classes for an entitlement. Pure.
///
/// No package or an expired membership leaves nothing; an unlimited package stays unlimited
/// regardless of usage; otherwise the allowance minus usage, floored at zero.
#[must_use]
pub fn remaining_classes(entitlement: &Entitlement, allowance: Option<Allowance>, used: u32) -> Allowance {
    if entitlement.holding.is_none() || entitlement.membership_status == MembershipStatus::Expired {
        return Allowance::ZERO;
    }
    allowance.map_or(Allowance::ZERO, |allowance| allowance.remaining_after(used))
}

/// Allowance, usage and remaining together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remaining {
    /// Allowance of the held package, if any
    pub allowance: Option<Allowance>,
    /// Registrations charged against it
    pub used: u32,
    /// What is left
    pub remaining: Allowance,
}

/// Service computing remaining classes live from the registry.
#[derive(Clone, Debug)]
pub struct RemainingClassesCalculator {
    ledger: EntitlementLedger,
    policy: UsagePolicy,
    scope: UsageScope,
}

impl RemainingClassesCalculator {
    /// Calculator with the default policy and scope
    #[must_use]
    pub fn new(env: StudioEnvironment) -> Self {
        Self {
            ledger: EntitlementLedger::new(env),
            policy: UsagePolicy::default(),
            scope: UsageScope::default(),
        }
    }

    /// Use a different usage policy
    #[must_use]
    pub const fn with_policy(mut self, policy: UsagePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a different usage scope
    #[must_use]
    pub const fn with_scope(mut self, scope: UsageScope) -> Self {
        self.scope = scope;
        self
    }

    /// The configured usage policy
    #[must_use]
    pub const fn policy(&self) -> UsagePolicy {
        self.policy
    }

    /// Remaining classes for the member (`Unlimited` for unlimited packages).
    ///
    /// Uses the stored membership status; run an expiry check first for a status that is not
    /// stale.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the member is unknown or the held package is missing from the catalog
    pub async fn remaining_classes(&self, member_id: MemberId) -> Result<Allowance> {
        Ok(self.breakdown(member_id).await?.remaining)
    }

    /// Remaining classes with the numbers behind them.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the member is unknown or the held package is missing from the catalog
    pub async fn breakdown(&self, member_id: MemberId) -> Result<Remaining> {
        let entitlement = self.ledger.get_entitlement(member_id).await?;
        self.breakdown_for(member_id, &entitlement).await
    }

    /// Remaining classes for an entitlement the caller already holds.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the held package is missing from the catalog
    pub async fn breakdown_for(
        &self,
        member_id: MemberId,
        entitlement: &Entitlement,
    ) -> Result<Remaining> {
        let env = self.ledger.env();
        let Some(holding) = entitlement.holding else {
            return Ok(Remaining {
                allowance: None,
                used: 0,
                remaining: Allowance::ZERO,
            });
        };

        let allowance = held_package(env, holding).await?.class_allowance;
        let since = match self.scope {
            UsageScope::AllTime => None,
            UsageScope::SincePackageStart => Some(holding.start_date),
        };

        let sessions = env
            .sessions
            .find(SessionQuery::all().with_registrations_of(member_id))
            .await?;
        let now = env.calendar.local(env.now());
        let used = count_usage(&sessions, member_id, self.policy, now, since);

        Ok(Remaining {
            allowance: Some(allowance),
            used,
            remaining: remaining_classes(entitlement, Some(allowance), used),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{
        ClassId, Difficulty, PackageHolding, PackageId, Registration, RegistrationId, SessionId,
        SessionStatus,
    };
    use chrono::{NaiveTime, TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn session_with(date: NaiveDate, member: MemberId, status: RegistrationStatus) -> Session {
        let id = SessionId::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Session {
            id,
            class_id: ClassId::new(),
            class_name: "Yin".to_string(),
            instructor: "Ana".to_string(),
            difficulty: Difficulty::Beginner,
            date,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            capacity: 10,
            registered_count: u32::from(status.occupies_seat()),
            status: SessionStatus::Scheduled,
            registrations: vec![Registration {
                id: RegistrationId::new(),
                session_id: id,
                member_id: member,
                member_name: "Sam".to_string(),
                member_email: "sam@example.com".to_string(),
                status,
                registered_at: now,
                cancelled_at: None,
                attended_at: None,
                notes: None,
            }],
            notes: None,
            created_at: now,
        }
    }

    fn active() -> Entitlement {
        Entitlement {
            holding: Some(PackageHolding {
                package_id: PackageId::new(),
                revision: 1,
                start_date: day(1),
            }),
            raw_remaining_classes: Allowance::Limited(8),
            membership_status: MembershipStatus::Active,
        }
    }

    #[test]
    fn policies_differ_only_on_confirmed() {
        use RegistrationStatus::{Attended, Cancelled, Confirmed, NoShow};
        for policy in [
            UsagePolicy::Resolved,
            UsagePolicy::ResolvedOrLapsed,
            UsagePolicy::AllNonCancelled,
        ] {
            assert!(policy.counts(Attended, false));
            assert!(policy.counts(NoShow, false));
            assert!(!policy.counts(Cancelled, true));
        }
        assert!(!UsagePolicy::Resolved.counts(Confirmed, true));
        assert!(!UsagePolicy::ResolvedOrLapsed.counts(Confirmed, false));
        assert!(UsagePolicy::ResolvedOrLapsed.counts(Confirmed, true));
        assert!(UsagePolicy::AllNonCancelled.counts(Confirmed, false));
    }

    #[test]
    fn usage_counts_only_this_member() {
        let member = MemberId::new();
        let other = MemberId::new();
        let sessions = vec![
            session_with(day(2), member, RegistrationStatus::Attended),
            session_with(day(3), member, RegistrationStatus::Confirmed),
            session_with(day(4), other, RegistrationStatus::Attended),
            session_with(day(5), member, RegistrationStatus::Cancelled),
        ];
        let now = day(20).and_hms_opt(12, 0, 0).unwrap();

        assert_eq!(count_usage(&sessions, member, UsagePolicy::Resolved, now, None), 1);
        assert_eq!(
            count_usage(&sessions, member, UsagePolicy::ResolvedOrLapsed, now, None),
            2
        );
        assert_eq!(
            count_usage(&sessions, member, UsagePolicy::AllNonCancelled, now, None),
            2
        );
        assert_eq!(
            count_usage(&sessions, member, UsagePolicy::Resolved, now, Some(day(3))),
            0
        );
    }

    #[test]
    fn remaining_floors_at_zero() {
        assert_eq!(
            remaining_classes(&active(), Some(Allowance::Limited(2)), 5),
            Allowance::ZERO
        );
        assert_eq!(
            remaining_classes(&active(), Some(Allowance::Limited(8)), 2),
            Allowance::Limited(6)
        );
    }

    #[test]
    fn unlimited_ignores_usage() {
        assert_eq!(
            remaining_classes(&active(), Some(Allowance::Unlimited), 500),
            Allowance::Unlimited
        );
    }

    #[test]
    fn expired_or_empty_leaves_nothing() {
        let mut expired = active();
        expired.membership_status = MembershipStatus::Expired;
        assert_eq!(
            remaining_classes(&expired, Some(Allowance::Unlimited), 0),
            Allowance::ZERO
        );
        assert_eq!(
            remaining_classes(&Entitlement::empty(), None, 0),
            Allowance::ZERO
        );
    }

    #[test]
    fn policy_parses_config_labels() {
        assert_eq!(
            "resolved-or-lapsed".parse::<UsagePolicy>().unwrap(),
            UsagePolicy::ResolvedOrLapsed
        );
        assert_eq!(UsagePolicy::AllNonCancelled.as_str(), "all-non-cancelled");
        assert!("everything".parse::<UsagePolicy>().is_err());
    }
}
