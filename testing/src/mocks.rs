//! Mock implementations of the environment traits.

use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use studio_core::environment::{ClassCatalog, Clock, IdGenerator, MemberDirectory};
use studio_core::error::StoreError;
use studio_core::types::{ClassId, ClassInfo, MemberId, MemberProfile};
use uuid::Uuid;

/// Controllable clock for deterministic tests
///
/// Returns the same instant until moved with [`set`](Self::set) or
/// [`advance`](Self::advance). Clones share the same time.
///
/// # Example
///
/// ```
/// use studio_testing::mocks::FixedClock;
/// use studio_core::environment::Clock;
/// use chrono::{Duration, Utc};
///
/// let clock = FixedClock::new(Utc::now());
/// let time1 = clock.now();
/// assert_eq!(time1, clock.now()); // Always the same!
///
/// clock.advance(Duration::days(1));
/// assert_eq!(clock.now() - time1, Duration::days(1));
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(RwLock::new(time)),
        }
    }

    /// Move the clock to `time`
    ///
    /// # Panics
    ///
    /// Panics if the clock's lock is poisoned.
    #[allow(clippy::unwrap_used)] // Test helper
    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.write().unwrap() = time;
    }

    /// Move the clock forward (or backward, for a negative duration)
    ///
    /// # Panics
    ///
    /// Panics if the clock's lock is poisoned.
    #[allow(clippy::unwrap_used)] // Test helper
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.write().unwrap();
        *time += by;
    }
}

impl Clock for FixedClock {
    #[allow(clippy::unwrap_used)] // Test helper
    fn now(&self) -> DateTime<Utc> {
        *self.time.read().unwrap()
    }
}

/// Create a default fixed clock for tests (2024-01-01 08:00:00 UTC)
///
/// # Panics
///
/// This function will panic if the hardcoded timestamp fails to parse,
/// which should never happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2024-01-01T08:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

/// Predictable identifiers: `00000000-0000-0000-0000-000000000001`, `...0002`, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    /// Start counting at 1
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_uuid(&self) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Uuid::from_u128(u128::from(n))
    }
}

/// Class catalog double. Classes can be edited after sessions are created from them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClassCatalog {
    classes: Arc<RwLock<HashMap<ClassId, ClassInfo>>>,
}

impl InMemoryClassCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a class
    ///
    /// # Panics
    ///
    /// Panics if the catalog's lock is poisoned.
    #[allow(clippy::unwrap_used)] // Test helper
    pub fn put(&self, class_id: ClassId, class: ClassInfo) {
        self.classes.write().unwrap().insert(class_id, class);
    }

    /// Add a class under a fresh id
    #[must_use]
    pub fn add(&self, class: ClassInfo) -> ClassId {
        let class_id = ClassId::new();
        self.put(class_id, class);
        class_id
    }
}

impl ClassCatalog for InMemoryClassCatalog {
    fn get_class(&self, class_id: ClassId) -> BoxFuture<'_, Result<Option<ClassInfo>, StoreError>> {
        Box::pin(async move {
            let classes = self
                .classes
                .read()
                .map_err(|_| StoreError::Database("class catalog lock poisoned".to_string()))?;
            Ok(classes.get(&class_id).cloned())
        })
    }
}

/// Member directory double.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMemberDirectory {
    members: Arc<RwLock<HashMap<MemberId, MemberProfile>>>,
}

impl InMemoryMemberDirectory {
    /// Create an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a member
    ///
    /// # Panics
    ///
    /// Panics if the directory's lock is poisoned.
    #[allow(clippy::unwrap_used)] // Test helper
    pub fn put(&self, member_id: MemberId, profile: MemberProfile) {
        self.members.write().unwrap().insert(member_id, profile);
    }

    /// Add a member named `name` with a derived email address
    #[must_use]
    pub fn add(&self, name: &str) -> MemberId {
        let member_id = MemberId::new();
        self.put(
            member_id,
            MemberProfile {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            },
        );
        member_id
    }
}

impl MemberDirectory for InMemoryMemberDirectory {
    fn get_member(
        &self,
        member_id: MemberId,
    ) -> BoxFuture<'_, Result<Option<MemberProfile>, StoreError>> {
        Box::pin(async move {
            let members = self
                .members
                .read()
                .map_err(|_| StoreError::Database("member directory lock poisoned".to_string()))?;
            Ok(members.get(&member_id).cloned())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn clones_share_time() {
        let clock = test_clock();
        let shared = clock.clone();
        clock.advance(Duration::minutes(90));
        assert_eq!(shared.now(), clock.now());
    }

    #[test]
    fn sequential_ids_start_at_one() {
        let ids = SequentialIds::new();
        assert_eq!(ids.next_uuid(), Uuid::from_u128(1));
        assert_eq!(ids.next_uuid(), Uuid::from_u128(2));
    }

    #[tokio::test]
    async fn directory_derives_email() {
        let directory = InMemoryMemberDirectory::new();
        let id = directory.add("Sam Lee");
        let profile = directory.get_member(id).await.unwrap().unwrap();
        assert_eq!(profile.email, "sam.lee@example.com");
    }
}
