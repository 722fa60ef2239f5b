//! In-memory stores for single-process deployments and tests.
//!
//! Documents live in a `HashMap` behind a `RwLock` together with their version. The version
//! check and the write happen under the same write lock, which gives the same compare-and-swap
//! guarantee the Postgres stores get from `UPDATE ... WHERE version = $n`.

use crate::error::StoreError;
use crate::store::{slot_taken, EntitlementStore, SessionQuery, SessionStore, Version, Versioned};
use crate::types::{MemberAccount, MemberId, Session, SessionId};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Database("in-memory store lock poisoned".to_string())
}

fn conflict(document: String, expected: Option<Version>, actual: Option<Version>) -> StoreError {
    StoreError::ConcurrencyConflict {
        document,
        expected,
        actual,
    }
}

/// Session store backed by a map.
#[derive(Clone, Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, (Session, Version)>>>,
}

impl InMemorySessionStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().map_or(0, |map| map.len())
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn holds_slot(other: &Session, session: &Session) -> bool {
    other.id != session.id
        && other.class_id == session.class_id
        && other.date == session.date
        && other.start_time == session.start_time
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, session: Session) -> BoxFuture<'_, Result<Version, StoreError>> {
        Box::pin(async move {
            let mut map = self.sessions.write().map_err(poisoned)?;
            if map.contains_key(&session.id) {
                return Err(StoreError::Duplicate(format!("session:{}", session.id)));
            }
            if map.values().any(|(other, _)| holds_slot(other, &session)) {
                return Err(slot_taken(&session));
            }
            map.insert(session.id, (session, Version::INITIAL));
            Ok(Version::INITIAL)
        })
    }

    fn load(&self, id: SessionId) -> BoxFuture<'_, Result<Option<Versioned<Session>>, StoreError>> {
        Box::pin(async move {
            let map = self.sessions.read().map_err(poisoned)?;
            Ok(map
                .get(&id)
                .map(|(session, version)| Versioned::new(session.clone(), *version)))
        })
    }

    fn save(
        &self,
        session: Session,
        expected: Version,
    ) -> BoxFuture<'_, Result<Version, StoreError>> {
        Box::pin(async move {
            let mut map = self.sessions.write().map_err(poisoned)?;
            let document = format!("session:{}", session.id);
            let current = map.get(&session.id).map(|(_, version)| *version);
            if current == Some(expected)
                && map.values().any(|(other, _)| holds_slot(other, &session))
            {
                return Err(slot_taken(&session));
            }
            match map.get_mut(&session.id) {
                Some((stored, version)) if *version == expected => {
                    *stored = session;
                    *version = version.next();
                    Ok(*version)
                },
                Some((_, version)) => Err(conflict(document, Some(expected), Some(*version))),
                None => Err(conflict(document, Some(expected), None)),
            }
        })
    }

    fn delete(&self, id: SessionId, expected: Version) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut map = self.sessions.write().map_err(poisoned)?;
            let actual = map.get(&id).map(|(_, version)| *version);
            if actual != Some(expected) {
                return Err(conflict(format!("session:{id}"), Some(expected), actual));
            }
            map.remove(&id);
            Ok(())
        })
    }

    fn find(&self, query: SessionQuery) -> BoxFuture<'_, Result<Vec<Session>, StoreError>> {
        Box::pin(async move {
            let mut sessions: Vec<Session> = {
                let map = self.sessions.read().map_err(poisoned)?;
                map.values()
                    .filter(|(session, _)| query.matches(session))
                    .map(|(session, _)| session.clone())
                    .collect()
            };
            query.finish(&mut sessions);
            Ok(sessions)
        })
    }
}

/// Entitlement store backed by a map.
#[derive(Clone, Debug, Default)]
pub struct InMemoryEntitlementStore {
    accounts: Arc<RwLock<HashMap<MemberId, (MemberAccount, Version)>>>,
}

impl InMemoryEntitlementStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntitlementStore for InMemoryEntitlementStore {
    fn load(
        &self,
        member_id: MemberId,
    ) -> BoxFuture<'_, Result<Option<Versioned<MemberAccount>>, StoreError>> {
        Box::pin(async move {
            let map = self.accounts.read().map_err(poisoned)?;
            Ok(map
                .get(&member_id)
                .map(|(account, version)| Versioned::new(account.clone(), *version)))
        })
    }

    fn save(
        &self,
        account: MemberAccount,
        expected: Option<Version>,
    ) -> BoxFuture<'_, Result<Version, StoreError>> {
        Box::pin(async move {
            let mut map = self.accounts.write().map_err(poisoned)?;
            let actual = map.get(&account.member_id).map(|(_, version)| *version);
            if actual != expected {
                return Err(conflict(
                    format!("member:{}", account.member_id),
                    expected,
                    actual,
                ));
            }
            let version = actual.map_or(Version::INITIAL, Version::next);
            map.insert(account.member_id, (account, version));
            Ok(version)
        })
    }

    fn members_with_package(&self) -> BoxFuture<'_, Result<Vec<MemberId>, StoreError>> {
        Box::pin(async move {
            let map = self.accounts.read().map_err(poisoned)?;
            let mut members: Vec<MemberId> = map
                .values()
                .filter(|(account, _)| account.entitlement.holding.is_some())
                .map(|(account, _)| account.member_id)
                .collect();
            members.sort();
            Ok(members)
        })
    }
}
