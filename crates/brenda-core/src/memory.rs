//! Durable per-user memory: sled long-term store with a DashMap hot cache.
//!
//! Writes go cache-first, then to sled with bounded retries; when the
//! backend stays down the store degrades to cache-only for the turn and the
//! turn still completes. Per-user operations are serialised through the lock
//! table handed out by [`MemoryStore::user_lock`].

use crate::error::{CoreError, CoreResult};
use crate::profile::{LearnedTraits, MessageRecord, UserProfile, MAX_LOG_ENTRIES};
use dashmap::DashMap;
use sled::Db;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const PROFILE_PREFIX: &str = "profile/";
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_MS: u64 = 200;

pub struct MemoryStore {
    db: Db,
    cache: DashMap<i64, UserProfile>,
    locks: DashMap<i64, Arc<tokio::sync::Mutex<()>>>,
}

fn profile_key(user_id: i64) -> String {
    format!("{}{}", PROFILE_PREFIX, user_id)
}

impl MemoryStore {
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db, cache: DashMap::new(), locks: DashMap::new() })
    }

    /// The per-user turn lock. One user's events are processed FIFO under
    /// this mutex; across users no ordering is implied.
    pub fn user_lock(&self, user_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Loads a profile, cache first. A persistently failing backend degrades
    /// to a cache miss rather than failing the turn.
    pub async fn load(&self, user_id: i64) -> CoreResult<Option<UserProfile>> {
        if let Some(hit) = self.cache.get(&user_id) {
            return Ok(Some(hit.clone()));
        }
        let key = profile_key(user_id);
        let bytes = match self.get_with_retry(&key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(user_id, "memory backend unavailable on load ({}); cache-only", e);
                return Ok(None);
            }
        };
        match bytes {
            Some(raw) => {
                let profile: UserProfile = serde_json::from_slice(&raw)?;
                self.cache.insert(user_id, profile.clone());
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Write-through save. The conversation log is truncated to the last
    /// [`MAX_LOG_ENTRIES`] on write; truncation never drops the newest entry.
    pub async fn save(&self, profile: &UserProfile) -> CoreResult<()> {
        let mut to_store = profile.clone();
        if to_store.log.len() > MAX_LOG_ENTRIES {
            let excess = to_store.log.len() - MAX_LOG_ENTRIES;
            to_store.log.drain(..excess);
        }
        self.cache.insert(to_store.user_id, to_store.clone());

        let key = profile_key(to_store.user_id);
        let bytes = serde_json::to_vec(&to_store)?;
        if let Err(e) = self.insert_with_retry(&key, bytes).await {
            tracing::warn!(
                user_id = to_store.user_id,
                "memory backend unavailable on save ({}); degraded to cache-only for this turn",
                e
            );
        }
        Ok(())
    }

    /// Appends one message to the user's log and persists.
    pub async fn append_message(&self, user_id: i64, record: MessageRecord) -> CoreResult<()> {
        let mut profile = self
            .load(user_id)
            .await?
            .ok_or(CoreError::InvalidInput("append_message on unknown user"))?;
        profile.push_message(record);
        self.save(&profile).await
    }

    /// Idempotent set-union merge of learned attributes.
    pub async fn update_attributes(&self, user_id: i64, delta: &LearnedTraits) -> CoreResult<()> {
        if let Some(mut profile) = self.load(user_id).await? {
            profile.traits.merge(delta);
            self.save(&profile).await?;
        }
        Ok(())
    }

    async fn get_with_retry(&self, key: &str) -> Result<Option<Vec<u8>>, sled::Error> {
        let mut delay = Duration::from_millis(RETRY_BASE_MS);
        let mut last_err = None;
        for attempt in 0..RETRY_ATTEMPTS {
            match self.db.get(key.as_bytes()) {
                Ok(v) => return Ok(v.map(|iv| iv.to_vec())),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < RETRY_ATTEMPTS {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }
        Err(last_err.expect("retry loop ran at least once"))
    }

    async fn insert_with_retry(&self, key: &str, bytes: Vec<u8>) -> Result<(), sled::Error> {
        let mut delay = Duration::from_millis(RETRY_BASE_MS);
        let mut last_err = None;
        for attempt in 0..RETRY_ATTEMPTS {
            match self.db.insert(key.as_bytes(), bytes.clone()) {
                Ok(_) => return Ok(()),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < RETRY_ATTEMPTS {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }
        Err(last_err.expect("retry loop ran at least once"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::MessageRecord;

    fn store() -> (MemoryStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (MemoryStore::open(dir.path()).unwrap(), dir)
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let (store, _dir) = store();
        let mut profile = UserProfile::new(42, "María", Some("maria_g".to_string()));
        profile.accept_privacy();
        store.save(&profile).await.unwrap();

        let loaded = store.load(42).await.unwrap().unwrap();
        assert_eq!(loaded.first_name, "María");
        assert!(loaded.privacy_accepted);
    }

    #[tokio::test]
    async fn unknown_user_loads_none() {
        let (store, _dir) = store();
        assert!(store.load(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn log_truncated_on_write_keeps_newest() {
        let (store, _dir) = store();
        let mut profile = UserProfile::new(1, "Ana", None);
        store.save(&profile).await.unwrap();
        for i in 0..40 {
            profile.push_message(MessageRecord::user(format!("m{}", i)));
        }
        store.save(&profile).await.unwrap();
        let loaded = store.load(1).await.unwrap().unwrap();
        assert_eq!(loaded.log.len(), MAX_LOG_ENTRIES);
        assert_eq!(loaded.log.last().unwrap().content, "m39");
    }

    #[tokio::test]
    async fn update_attributes_is_idempotent() {
        let (store, _dir) = store();
        let profile = UserProfile::new(5, "Luis", None);
        store.save(&profile).await.unwrap();

        let mut delta = LearnedTraits::default();
        delta.interests.insert("automatización".to_string());
        store.update_attributes(5, &delta).await.unwrap();
        store.update_attributes(5, &delta).await.unwrap();

        let loaded = store.load(5).await.unwrap().unwrap();
        assert_eq!(loaded.traits.interests.len(), 1);
    }

    #[tokio::test]
    async fn per_user_lock_is_stable() {
        let (store, _dir) = store();
        let a = store.user_lock(7);
        let b = store.user_lock(7);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
