//! File-based ProgressionRepository implementation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use leveling_core::{EntityId, ProgressionRecord, Xp};
use serde::{Deserialize, Serialize};

use crate::repository::traits::check_all_metadata;
use crate::repository::{MetaEntries, ProgressionRepository, RepositoryError, Result, XpRemap};

const SNAPSHOT_FILE: &str = "progression.bin";

#[derive(Default, Deserialize)]
struct Snapshot {
    records: BTreeMap<EntityId, Xp>,
    meta: BTreeMap<String, String>,
}

/// Borrowing twin of [`Snapshot`]; same wire layout.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    records: &'a BTreeMap<EntityId, Xp>,
    meta: &'a BTreeMap<String, String>,
}

/// File-based implementation of ProgressionRepository.
///
/// # File Format
///
/// `progression.bin` is a bincode snapshot holding every record and every
/// metadata entry. It is rewritten whole through a temp file and an atomic
/// rename, so a crash leaves either the previous or the new contents on
/// disk, and a migration's records and formula descriptor always land in
/// the same rename. The snapshot is mirrored in memory; reads never touch
/// the disk.
///
/// # Cost
///
/// Every [`save`](ProgressionRepository::save) serializes and writes the
/// full snapshot, so a write costs O(N) in the number of stored entities.
/// That suits save files of a few thousand entities; larger populations
/// belong in [`SqliteProgressionRepository`](crate::repository::SqliteProgressionRepository),
/// whose upserts touch a single row.
pub struct FileProgressionRepository {
    base_dir: PathBuf,
    state: RwLock<Snapshot>,
    closed: AtomicBool,
}

impl FileProgressionRepository {
    /// Open (or create) a repository rooted at `base_dir`.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).map_err(RepositoryError::Io)?;

        let snapshot_path = base_dir.join(SNAPSHOT_FILE);
        let snapshot = if snapshot_path.exists() {
            let bytes = fs::read(&snapshot_path).map_err(RepositoryError::Io)?;
            bincode::deserialize(&bytes).map_err(|e| {
                RepositoryError::CorruptedData(format!("{}: {e}", snapshot_path.display()))
            })?
        } else {
            Snapshot::default()
        };

        tracing::debug!(
            records = snapshot.records.len(),
            meta = snapshot.meta.len(),
            "Opened progression store at {}",
            base_dir.display()
        );

        Ok(Self {
            base_dir,
            state: RwLock::new(snapshot),
            closed: AtomicBool::new(false),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RepositoryError::Closed);
        }
        Ok(())
    }

    fn write_snapshot(
        &self,
        records: &BTreeMap<EntityId, Xp>,
        meta: &BTreeMap<String, String>,
    ) -> Result<()> {
        let bytes = bincode::serialize(&SnapshotRef { records, meta })
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        write_atomic(&self.base_dir.join(SNAPSHOT_FILE), &bytes)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    // Write to temp file
    fs::write(&temp_path, bytes).map_err(RepositoryError::Io)?;

    // Atomic rename
    fs::rename(&temp_path, path).map_err(RepositoryError::Io)?;

    Ok(())
}

fn merged(base: &BTreeMap<String, String>, entries: &MetaEntries<'_>) -> BTreeMap<String, String> {
    let mut meta = base.clone();
    meta.extend(
        entries
            .iter()
            .map(|&(key, value)| (key.to_string(), value.to_string())),
    );
    meta
}

impl ProgressionRepository for FileProgressionRepository {
    fn save(&self, record: &ProgressionRecord) -> Result<()> {
        self.ensure_open()?;
        let mut state = self
            .state
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        let id = record.entity_id();
        let previous = state.records.insert(id, record.xp());
        if let Err(e) = self.write_snapshot(&state.records, &state.meta) {
            match previous {
                Some(xp) => state.records.insert(id, xp),
                None => state.records.remove(&id),
            };
            return Err(e);
        }

        tracing::debug!(entity = %id, xp = record.xp(), "Saved progression record");
        Ok(())
    }

    fn load(&self, id: EntityId) -> Result<Option<ProgressionRecord>> {
        self.ensure_open()?;
        let state = self
            .state
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(state
            .records
            .get(&id)
            .map(|&xp| ProgressionRecord::with_xp(id, xp)))
    }

    fn exists(&self, id: EntityId) -> Result<bool> {
        self.ensure_open()?;
        let state = self
            .state
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(state.records.contains_key(&id))
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Closed progression store at {}", self.base_dir.display());
        }
        Ok(())
    }

    fn meta_get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        let state = self
            .state
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(state.meta.get(key).cloned())
    }

    fn meta_put_all(&self, entries: &MetaEntries<'_>) -> Result<()> {
        self.ensure_open()?;
        check_all_metadata(entries)?;
        let mut state = self
            .state
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        let meta = merged(&state.meta, entries);
        self.write_snapshot(&state.records, &meta)?;
        state.meta = meta;
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
        let mut state = self
            .state
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        let entries: Vec<(EntityId, Xp)> = state.records.iter().map(|(&id, &xp)| (id, xp)).collect();
        let mut rewritten = state.records.clone();
        for chunk in entries.chunks(batch_size.max(1)) {
            for &(id, xp) in chunk {
                let record = ProgressionRecord::with_xp(id, xp);
                rewritten.insert(id, remap(&record)?.max(0));
            }
        }

        // One snapshot write commits the records and the metadata together.
        let meta = merged(&state.meta, meta);
        self.write_snapshot(&rewritten, &meta)?;
        state.records = rewritten;
        state.meta = meta;
        Ok(entries.len() as u64)
    }

    fn list_ids(&self) -> Result<Vec<EntityId>> {
        self.ensure_open()?;
        let state = self
            .state
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(state.records.keys().copied().collect())
    }

    fn count(&self) -> Result<u64> {
        self.ensure_open()?;
        let state = self
            .state
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(state.records.len() as u64)
    }
}
