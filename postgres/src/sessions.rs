//! Session documents in the `studio_sessions` table.

use crate::{db_error, from_column, is_unique_violation, to_column, version_mismatch, violates};
use futures::future::BoxFuture;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use studio_core::error::StoreError;
use studio_core::store::{slot_taken, SessionQuery, SessionStore, Version, Versioned};
use studio_core::types::{Session, SessionId};

const TABLE: &str = "studio_sessions";
const SLOT_INDEX: &str = "uq_studio_sessions_slot";

/// `PostgreSQL`-backed [`SessionStore`].
///
/// Date range, class, status and member filters run in SQL; members are matched by JSONB
/// containment on the embedded registrations. The decoded documents are filtered once more in
/// Rust, which narrows member matches to live registrations and applies the instructor filter.
#[derive(Clone, Debug)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
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

    async fn current_version(&self, id: SessionId) -> Result<Option<Version>, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM studio_sessions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("read session version"))?;
        row.map(|(version,)| from_column(version)).transpose()
    }
}

impl SessionStore for PostgresSessionStore {
    fn insert(&self, session: Session) -> BoxFuture<'_, Result<Version, StoreError>> {
        Box::pin(async move {
            let id = session.id;
            let result = sqlx::query(
                r"
                INSERT INTO studio_sessions (id, class_id, session_date, start_time, document, version)
                VALUES ($1, $2, $3, $4, $5, 0)
                ",
            )
            .bind(id.as_uuid())
            .bind(session.class_id.as_uuid())
            .bind(session.date)
            .bind(session.start_time)
            .bind(Json(&session))
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(Version::INITIAL),
                Err(e) if violates(&e, SLOT_INDEX) => Err(slot_taken(&session)),
                Err(e) if is_unique_violation(&e) => {
                    Err(StoreError::Duplicate(format!("session:{id}")))
                },
                Err(e) => Err(db_error("insert session")(e)),
            }
        })
    }

    fn load(&self, id: SessionId) -> BoxFuture<'_, Result<Option<Versioned<Session>>, StoreError>> {
        Box::pin(async move {
            let row: Option<(Json<Session>, i64)> =
                sqlx::query_as("SELECT document, version FROM studio_sessions WHERE id = $1")
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_error("load session"))?;

            row.map(|(Json(session), version)| Ok(Versioned::new(session, from_column(version)?)))
                .transpose()
        })
    }

    fn save(
        &self,
        session: Session,
        expected: Version,
    ) -> BoxFuture<'_, Result<Version, StoreError>> {
        Box::pin(async move {
            let id = session.id;
            let row: Option<(i64,)> = sqlx::query_as(
                r"
                UPDATE studio_sessions
                SET document = $2,
                    session_date = $3,
                    start_time = $4,
                    version = version + 1,
                    updated_at = now()
                WHERE id = $1 AND version = $5
                RETURNING version
                ",
            )
            .bind(id.as_uuid())
            .bind(Json(&session))
            .bind(session.date)
            .bind(session.start_time)
            .bind(to_column(expected)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if violates(&e, SLOT_INDEX) {
                    slot_taken(&session)
                } else {
                    db_error("save session")(e)
                }
            })?;

            match row {
                Some((version,)) => from_column(version),
                None => {
                    let actual = self.current_version(id).await?;
                    Err(version_mismatch(TABLE, format!("session:{id}"), Some(expected), actual))
                },
            }
        })
    }

    fn delete(&self, id: SessionId, expected: Version) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM studio_sessions WHERE id = $1 AND version = $2")
                .bind(id.as_uuid())
                .bind(to_column(expected)?)
                .execute(&self.pool)
                .await
                .map_err(db_error("delete session"))?;

            if result.rows_affected() == 0 {
                let actual = self.current_version(id).await?;
                return Err(version_mismatch(
                    TABLE,
                    format!("session:{id}"),
                    Some(expected),
                    actual,
                ));
            }
            Ok(())
        })
    }

    fn find(&self, query: SessionQuery) -> BoxFuture<'_, Result<Vec<Session>, StoreError>> {
        Box::pin(async move {
            let mut sql = QueryBuilder::<Postgres>::new("SELECT document FROM studio_sessions WHERE TRUE");
            if let Some(from) = query.from {
                sql.push(" AND session_date >= ").push_bind(from);
            }
            if let Some(to) = query.to {
                sql.push(" AND session_date <= ").push_bind(to);
            }
            if let Some(class_id) = query.class_id {
                sql.push(" AND class_id = ").push_bind(*class_id.as_uuid());
            }
            if let Some(status) = query.status {
                sql.push(" AND document ->> 'status' = ").push_bind(status.as_str());
            }
            for member_id in [query.member_id, query.any_registration_of].into_iter().flatten() {
                sql.push(" AND document -> 'registrations' @> jsonb_build_array(jsonb_build_object('member_id', ")
                    .push_bind(*member_id.as_uuid())
                    .push("::text))");
            }
            sql.push(" ORDER BY session_date, start_time, id");
            // Only safe when the Rust-side filter below cannot drop rows.
            if query.instructor.is_none() && query.member_id.is_none() {
                if let Some(limit) = query.limit {
                    sql.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
                }
            }

            let rows: Vec<(Json<Session>,)> = sql
                .build_query_as()
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("find sessions"))?;

            let mut sessions: Vec<Session> = rows
                .into_iter()
                .map(|(Json(session),)| session)
                .filter(|session| query.matches(session))
                .collect();
            query.finish(&mut sessions);
            Ok(sessions)
        })
    }
}
