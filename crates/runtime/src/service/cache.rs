//! Sharded entity cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use leveling_core::{EntityId, ProgressionRecord};

use crate::api::{LevelingError, Result};

const SHARDS: usize = 16;

/// Cached record guarded by its own lock.
///
/// The service holds this lock across read-level, mutate, persist and
/// re-read, so mutations of one entity never interleave.
pub(crate) type Entry = Arc<Mutex<Slot>>;

/// Cached record plus the eviction mark.
pub(crate) struct Slot {
    pub(crate) record: ProgressionRecord,
    retired: bool,
}

impl Slot {
    fn new(record: ProgressionRecord) -> Self {
        Self {
            record,
            retired: false,
        }
    }

    /// Set once the entry left the cache. A caller still holding the `Arc`
    /// must look the entity up again instead of touching this record.
    pub(crate) fn is_retired(&self) -> bool {
        self.retired
    }
}

/// Lock-striped map from entity to its cached record.
pub(crate) struct EntityCache {
    shards: Vec<RwLock<HashMap<EntityId, Entry>>>,
}

impl EntityCache {
    pub(crate) fn new() -> Self {
        Self {
            shards: (0..SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, id: EntityId) -> &RwLock<HashMap<EntityId, Entry>> {
        let index = (id.as_uuid().as_u128() % SHARDS as u128) as usize;
        &self.shards[index]
    }

    /// Cached entry for `id`, creating it with `load` on a miss.
    ///
    /// `load` runs without any shard lock held; if another thread populated
    /// the slot meanwhile, its entry wins.
    pub(crate) fn get_or_load(
        &self,
        id: EntityId,
        load: impl FnOnce() -> Result<ProgressionRecord>,
    ) -> Result<Entry> {
        let shard = self.shard(id);
        if let Some(entry) = shard
            .read()
            .map_err(|_| LevelingError::LockPoisoned)?
            .get(&id)
        {
            return Ok(Arc::clone(entry));
        }

        let record = load()?;
        let mut map = shard.write().map_err(|_| LevelingError::LockPoisoned)?;
        let entry = map
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(Slot::new(record))));
        Ok(Arc::clone(entry))
    }

    /// Evicts and retires the entry for `id`.
    ///
    /// Waits for any mutation holding the entry lock to finish. The shard
    /// stays write-locked meanwhile, so no replacement entry can load from
    /// a store that is still missing that mutation's write.
    pub(crate) fn remove(&self, id: EntityId) -> Result<bool> {
        let mut map = self
            .shard(id)
            .write()
            .map_err(|_| LevelingError::LockPoisoned)?;
        let Some(entry) = map.remove(&id) else {
            return Ok(false);
        };
        entry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retired = true;
        Ok(true)
    }

    pub(crate) fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().map(|map| map.len()).unwrap_or(0))
            .sum()
    }
}
