//! Member account documents in the `member_accounts` table.

use crate::{db_error, from_column, to_column, version_mismatch};
use futures::future::BoxFuture;
use sqlx::types::Json;
use sqlx::PgPool;
use studio_core::error::StoreError;
use studio_core::store::{EntitlementStore, Version, Versioned};
use studio_core::types::{MemberAccount, MemberId};
use uuid::Uuid;

const TABLE: &str = "member_accounts";

/// `PostgreSQL`-backed [`EntitlementStore`].
///
/// `has_package` mirrors whether the stored entitlement holds a package, so the expiry sweep
/// can list candidates without decoding every document.
#[derive(Clone, Debug)]
pub struct PostgresEntitlementStore {
    pool: PgPool,
}

impl PostgresEntitlementStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn current_version(&self, member_id: MemberId) -> Result<Option<Version>, StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM member_accounts WHERE member_id = $1")
                .bind(member_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("read account version"))?;
        row.map(|(version,)| from_column(version)).transpose()
    }

    async fn create(&self, account: &MemberAccount) -> Result<Option<i64>, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as(
            r"
            INSERT INTO member_accounts (member_id, document, has_package, version, updated_at)
            VALUES ($1, $2, $3, 0, $4)
            ON CONFLICT (member_id) DO NOTHING
            RETURNING version
            ",
        )
        .bind(account.member_id.as_uuid())
        .bind(Json(account))
        .bind(account.entitlement.holding.is_some())
        .bind(account.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("create account"))?;
        Ok(row.map(|(version,)| version))
    }

    async fn replace(
        &self,
        account: &MemberAccount,
        expected: Version,
    ) -> Result<Option<i64>, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as(
            r"
            UPDATE member_accounts
            SET document = $2,
                has_package = $3,
                updated_at = $4,
                version = version + 1
            WHERE member_id = $1 AND version = $5
            RETURNING version
            ",
        )
        .bind(account.member_id.as_uuid())
        .bind(Json(account))
        .bind(account.entitlement.holding.is_some())
        .bind(account.updated_at)
        .bind(to_column(expected)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("save account"))?;
        Ok(row.map(|(version,)| version))
    }
}

impl EntitlementStore for PostgresEntitlementStore {
    fn load(
        &self,
        member_id: MemberId,
    ) -> BoxFuture<'_, Result<Option<Versioned<MemberAccount>>, StoreError>> {
        Box::pin(async move {
            let row: Option<(Json<MemberAccount>, i64)> = sqlx::query_as(
                "SELECT document, version FROM member_accounts WHERE member_id = $1",
            )
            .bind(member_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("load account"))?;

            row.map(|(Json(account), version)| Ok(Versioned::new(account, from_column(version)?)))
                .transpose()
        })
    }

    fn save(
        &self,
        account: MemberAccount,
        expected: Option<Version>,
    ) -> BoxFuture<'_, Result<Version, StoreError>> {
        Box::pin(async move {
            let written = match expected {
                None => self.create(&account).await?,
                Some(version) => self.replace(&account, version).await?,
            };

            match written {
                Some(version) => from_column(version),
                None => {
                    let actual = self.current_version(account.member_id).await?;
                    Err(version_mismatch(
                        TABLE,
                        format!("member:{}", account.member_id),
                        expected,
                        actual,
                    ))
                },
            }
        })
    }

    fn members_with_package(&self) -> BoxFuture<'_, Result<Vec<MemberId>, StoreError>> {
        Box::pin(async move {
            let rows: Vec<(Uuid,)> = sqlx::query_as(
                "SELECT member_id FROM member_accounts WHERE has_package ORDER BY member_id",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list members with package"))?;

            Ok(rows.into_iter().map(|(id,)| MemberId::from_uuid(id)).collect())
        })
    }
}
