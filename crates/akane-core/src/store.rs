//! User/group record store contract and the in-memory implementation.
//!
//! The dispatcher reads one [`UserRecord`] and (for group chats) one
//! [`GroupRecord`] per message, and writes exactly one thing: a cooldown
//! timestamp after a successful rate-limited command. Everything else about
//! persistence belongs to the implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::StoreResult;
use crate::record::{GroupRecord, UserRecord};

/// A deferred in-place edit of a user record.
pub type UserUpdate = Box<dyn FnOnce(&mut UserRecord) + Send>;

/// Key-value access to persisted user and group records.
///
/// Implementations must populate a record with the provided seed the first
/// time an id is seen, so callers never observe a missing record.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the record for `id`, inserting `seed` first if absent.
    async fn load_user(&self, id: &str, seed: UserRecord) -> StoreResult<UserRecord>;

    /// Returns the record for group `id`, inserting `seed` first if absent.
    async fn load_group(&self, id: &str, seed: GroupRecord) -> StoreResult<GroupRecord>;

    /// Applies `update` to the record for `id`, creating a default one if absent.
    async fn modify_user(&self, id: &str, update: UserUpdate) -> StoreResult<()>;
}

/// Shared, type-erased store handle.
pub type BoxedStore = Arc<dyn Store>;

// =============================================================================
// StoreSnapshot
// =============================================================================

/// Serializable image of every record held by a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub users: HashMap<String, UserRecord>,
    pub groups: HashMap<String, GroupRecord>,
}

// =============================================================================
// MemoryStore
// =============================================================================

/// A [`Store`] that keeps all records in process memory.
///
/// Used directly in tests and as the working set of file-backed stores.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreSnapshot>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            data: RwLock::new(snapshot),
        }
    }

    /// Returns a copy of every record.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.data.read().clone()
    }

    /// Returns the current record for `id` without seeding.
    pub fn user(&self, id: &str) -> Option<UserRecord> {
        self.data.read().users.get(id).cloned()
    }

    /// Returns the current group record for `id` without seeding.
    pub fn group(&self, id: &str) -> Option<GroupRecord> {
        self.data.read().groups.get(id).cloned()
    }

    /// Inserts or replaces a user record.
    pub fn put_user(&self, id: impl Into<String>, record: UserRecord) {
        self.data.write().users.insert(id.into(), record);
    }

    /// Inserts or replaces a group record.
    pub fn put_group(&self, id: impl Into<String>, record: GroupRecord) {
        self.data.write().groups.insert(id.into(), record);
    }

    /// Number of user records held.
    pub fn user_count(&self) -> usize {
        self.data.read().users.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_user(&self, id: &str, seed: UserRecord) -> StoreResult<UserRecord> {
        if let Some(user) = self.data.read().users.get(id) {
            return Ok(user.clone());
        }
        trace!(user = %id, "Seeding new user record");
        let mut data = self.data.write();
        Ok(data.users.entry(id.to_string()).or_insert(seed).clone())
    }

    async fn load_group(&self, id: &str, seed: GroupRecord) -> StoreResult<GroupRecord> {
        if let Some(group) = self.data.read().groups.get(id) {
            return Ok(group.clone());
        }
        trace!(group = %id, "Seeding new group record");
        let mut data = self.data.write();
        Ok(data.groups.entry(id.to_string()).or_insert(seed).clone())
    }

    async fn modify_user(&self, id: &str, update: UserUpdate) -> StoreResult<()> {
        let mut data = self.data.write();
        update(data.users.entry(id.to_string()).or_default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_user_seeds_once() {
        let store = MemoryStore::new();
        let seed = UserRecord {
            premium: true,
            ..Default::default()
        };
        let first = store.load_user("alice", seed).await.unwrap();
        assert!(first.premium);

        // A different seed is ignored once the record exists.
        let second = store.load_user("alice", UserRecord::default()).await.unwrap();
        assert!(second.premium);
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_modify_user_persists() {
        let store = MemoryStore::new();
        store
            .modify_user(
                "bob",
                Box::new(|u| {
                    u.cooldowns.insert("ping".into(), 1_000);
                }),
            )
            .await
            .unwrap();
        assert_eq!(store.user("bob").unwrap().cooldowns.get("ping"), Some(&1_000));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_keeps_groups() {
        let store = MemoryStore::new();
        store
            .load_group(
                "g1",
                GroupRecord {
                    nsfw: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let restored = MemoryStore::from_snapshot(store.snapshot());
        assert!(restored.group("g1").unwrap().nsfw);
    }
}
