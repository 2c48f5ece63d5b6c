//! In-memory ProgressionRepository implementation for tests and local runs.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use leveling_core::{EntityId, ProgressionRecord, Xp};

use crate::repository::traits::check_all_metadata;
use crate::repository::{MetaEntries, ProgressionRepository, RepositoryError, Result, XpRemap};

#[derive(Default)]
struct Store {
    records: HashMap<EntityId, Xp>,
    meta: HashMap<String, String>,
}

/// In-memory implementation of ProgressionRepository.
///
/// Nothing survives the process; useful for tests and throwaway sessions.
#[derive(Default)]
pub struct InMemoryProgressionRepo {
    store: RwLock<Store>,
    closed: AtomicBool,
}

impl InMemoryProgressionRepo {
    /// Create a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create pre-populated with the given records.
    pub fn with_records(records: impl IntoIterator<Item = ProgressionRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.entity_id(), record.xp()))
            .collect();
        Self {
            store: RwLock::new(Store {
                records,
                meta: HashMap::new(),
            }),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RepositoryError::Closed);
        }
        Ok(())
    }
}

impl ProgressionRepository for InMemoryProgressionRepo {
    fn save(&self, record: &ProgressionRecord) -> Result<()> {
        self.ensure_open()?;
        let mut store = self
            .store
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        store.records.insert(record.entity_id(), record.xp());
        Ok(())
    }

    fn load(&self, id: EntityId) -> Result<Option<ProgressionRecord>> {
        self.ensure_open()?;
        let store = self
            .store
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(store
            .records
            .get(&id)
            .map(|&xp| ProgressionRecord::with_xp(id, xp)))
    }

    fn exists(&self, id: EntityId) -> Result<bool> {
        self.ensure_open()?;
        let store = self
            .store
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(store.records.contains_key(&id))
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn meta_get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        let store = self
            .store
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(store.meta.get(key).cloned())
    }

    fn meta_put_all(&self, entries: &MetaEntries<'_>) -> Result<()> {
        self.ensure_open()?;
        check_all_metadata(entries)?;
        let mut store = self
            .store
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        store.meta.extend(
            entries
                .iter()
                .map(|&(key, value)| (key.to_string(), value.to_string())),
        );
        Ok(())
    }

    fn rewrite_xp(
        &self,
        batch_size: usize,
        remap: &mut XpRemap<'_>,
        meta: &MetaEntries<'_>,
    ) -> Result<u64> {
        self.ensure_open()?;
        check_all_metadata(meta)?;
        let mut store = self
            .store
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        let mut ids: Vec<EntityId> = store.records.keys().copied().collect();
        ids.sort_unstable();

        // Stage everything first; the live map is only touched once all
        // remaps succeeded.
        let mut staged = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(batch_size.max(1)) {
            for &id in chunk {
                let record = ProgressionRecord::with_xp(id, store.records[&id]);
                staged.push((id, remap(&record)?.max(0)));
            }
        }

        let visited = staged.len() as u64;
        store.records.extend(staged);
        store.meta.extend(
            meta.iter()
                .map(|&(key, value)| (key.to_string(), value.to_string())),
        );
        Ok(visited)
    }

    fn list_ids(&self) -> Result<Vec<EntityId>> {
        self.ensure_open()?;
        let store = self
            .store
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let mut ids: Vec<EntityId> = store.records.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn count(&self) -> Result<u64> {
        self.ensure_open()?;
        let store = self
            .store
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(store.records.len() as u64)
    }
}
