//! Entitlement Ledger: one versioned account document per member.
//!
//! The ledger owns persistence of [`Entitlement`]s. Simple edits go through
//! [`EntitlementLedger::update`], which takes care of load-or-create, the version check and
//! retrying on conflict. Expiry and renewal need the held package from the catalog in the middle
//! of their cycle and drive `load_account` / `save_account` themselves.

use crate::environment::StudioEnvironment;
use crate::error::{BookingError, EntityKind, Result};
use crate::retry::retry_on_conflict;
use crate::store::Version;
use crate::types::{Allowance, Entitlement, MemberAccount, MemberId, MembershipStatus};

/// Service owning member entitlement records.
#[derive(Clone, Debug)]
pub struct EntitlementLedger {
    env: StudioEnvironment,
}

impl EntitlementLedger {
    /// Creates a new `EntitlementLedger`
    #[must_use]
    pub const fn new(env: StudioEnvironment) -> Self {
        Self { env }
    }

    /// The member's entitlement as stored, without evaluating expiry.
    ///
    /// Members that never held a package get [`Entitlement::empty`].
    ///
    /// # Errors
    ///
    /// - `NotFound`: the member is not in the member directory
    pub async fn get_entitlement(&self, member_id: MemberId) -> Result<Entitlement> {
        let (account, _) = self.load_account(member_id).await?;
        Ok(account.entitlement)
    }

    /// Set the membership status by hand.
    ///
    /// `expired` is reserved for the expiry path and rejected here.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the member is not in the member directory
    /// - `Validation`: `status` is `expired`
    #[tracing::instrument(skip(self))]
    pub async fn set_membership_status(
        &self,
        member_id: MemberId,
        status: MembershipStatus,
    ) -> Result<Entitlement> {
        if status == MembershipStatus::Expired {
            return Err(BookingError::Validation(
                "membership status expired is set by expiry evaluation only".to_string(),
            ));
        }

        let (entitlement, _) = self
            .update(member_id, "set_membership_status", |entitlement| {
                entitlement.membership_status = status;
                Ok(Some(()))
            })
            .await?;
        tracing::info!(%status, "Membership status set");
        Ok(entitlement)
    }

    /// Drop the member's package. Start date and remaining counter go with it.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the member is not in the member directory
    #[tracing::instrument(skip(self))]
    pub async fn clear_package(&self, member_id: MemberId) -> Result<Entitlement> {
        let (entitlement, _) = self
            .update(member_id, "clear_package", |entitlement| {
                if entitlement.holding.is_none() {
                    return Ok(None);
                }
                entitlement.holding = None;
                entitlement.raw_remaining_classes = Allowance::ZERO;
                entitlement.membership_status = MembershipStatus::Inactive;
                Ok(Some(()))
            })
            .await?;
        Ok(entitlement)
    }

    /// Run `change` against the member's current entitlement and persist the result.
    ///
    /// `change` returns `Ok(None)` to leave the entitlement untouched (nothing is written) or
    /// `Ok(Some(outcome))` after modifying it. It is re-run from a fresh read whenever the save
    /// loses a race, so it must not have side effects beyond the entitlement it is given.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the member is not in the member directory
    /// - Whatever `change` returns
    /// - `Conflict`: retry budget exhausted
    pub async fn update<T, F>(
        &self,
        member_id: MemberId,
        operation: &'static str,
        change: F,
    ) -> Result<(Entitlement, Option<T>)>
    where
        F: Fn(&mut Entitlement) -> Result<Option<T>>,
    {
        let change = &change;
        retry_on_conflict(&self.env.retry, operation, move || async move {
            let (mut account, version) = self.load_account(member_id).await?;
            let mut entitlement = account.entitlement.clone();

            let outcome = change(&mut entitlement)?;
            if outcome.is_some() && entitlement != account.entitlement {
                account.entitlement = entitlement;
                account.updated_at = self.env.now();
                self.env.entitlements.save(account.clone(), version).await?;
            }
            Ok((account.entitlement, outcome))
        })
        .await
    }

    /// Load the member's account; a member known to the directory but never written gets a
    /// fresh empty account with no version.
    pub(crate) async fn load_account(
        &self,
        member_id: MemberId,
    ) -> Result<(MemberAccount, Option<Version>)> {
        if let Some(stored) = self.env.entitlements.load(member_id).await? {
            return Ok((stored.value, Some(stored.version)));
        }

        if self.env.members.get_member(member_id).await?.is_none() {
            return Err(BookingError::not_found(EntityKind::Member, member_id));
        }
        Ok((MemberAccount::new(member_id, self.env.now()), None))
    }

    /// Persist an account read at `expected` (`None` for an account never written).
    pub(crate) async fn save_account(
        &self,
        mut account: MemberAccount,
        expected: Option<Version>,
    ) -> Result<MemberAccount> {
        account.updated_at = self.env.now();
        self.env.entitlements.save(account.clone(), expected).await?;
        Ok(account)
    }

    pub(crate) const fn env(&self) -> &StudioEnvironment {
        &self.env
    }

    /// Members currently holding a package.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn members_with_package(&self) -> Result<Vec<MemberId>> {
        Ok(self.env.entitlements.members_with_package().await?)
    }
}
