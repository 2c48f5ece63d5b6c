//! Persistence port for per-entity progression records.

use leveling_core::{EntityId, ProgressionRecord, Xp};

use super::{RepositoryError, Result};

/// Longest metadata key accepted by every adapter.
pub const META_KEY_MAX_LEN: usize = 64;

/// Longest metadata value accepted by every adapter.
pub const META_VALUE_MAX_LEN: usize = 255;

/// Per-record XP transform applied by [`ProgressionRepository::rewrite_xp`].
///
/// Returning an error aborts the whole rewrite.
pub type XpRemap<'a> = dyn FnMut(&ProgressionRecord) -> Result<Xp> + 'a;

/// Metadata entries written as one unit, as `(key, value)` pairs.
pub type MetaEntries<'a> = [(&'a str, &'a str)];

/// Key-value store of progression records keyed by entity.
///
/// Records are upserted whole; the store never derives levels. A small
/// metadata slot sits next to the records so the migration engine can
/// remember which formula produced them. Metadata is only ever written in
/// groups that land together or not at all.
///
/// After [`close`](Self::close) every operation fails with
/// [`RepositoryError::Closed`].
pub trait ProgressionRepository: Send + Sync {
    /// Upsert: update if present, insert otherwise.
    fn save(&self, record: &ProgressionRecord) -> Result<()>;

    fn load(&self, id: EntityId) -> Result<Option<ProgressionRecord>>;

    fn exists(&self, id: EntityId) -> Result<bool>;

    /// Releases the underlying resources. Calling it twice is harmless.
    fn close(&self) -> Result<()>;

    fn meta_get(&self, key: &str) -> Result<Option<String>>;

    /// Upsert several metadata entries atomically: a reader sees either all
    /// of them or none. Keys are limited to [`META_KEY_MAX_LEN`] chars and
    /// values to [`META_VALUE_MAX_LEN`]; one oversized entry rejects the
    /// whole group before anything is written.
    fn meta_put_all(&self, entries: &MetaEntries<'_>) -> Result<()>;

    /// Upsert a single metadata entry.
    fn meta_put(&self, key: &str, value: &str) -> Result<()> {
        self.meta_put_all(&[(key, value)])
    }

    /// Replaces every stored XP with `remap(record)` and upserts `meta` as one
    /// atomic unit.
    ///
    /// Records are visited in chunks of `batch_size`; chunking never weakens
    /// atomicity: either every record is rewritten and `meta` recorded, or
    /// nothing changes. Returns the number of records visited.
    fn rewrite_xp(
        &self,
        batch_size: usize,
        remap: &mut XpRemap<'_>,
        meta: &MetaEntries<'_>,
    ) -> Result<u64>;

    /// Every stored entity, sorted.
    fn list_ids(&self) -> Result<Vec<EntityId>>;

    fn count(&self) -> Result<u64> {
        Ok(self.list_ids()?.len() as u64)
    }
}

pub(crate) fn check_metadata(key: &str, value: &str) -> Result<()> {
    for (field, text, limit) in [
        ("key", key, META_KEY_MAX_LEN),
        ("value", value, META_VALUE_MAX_LEN),
    ] {
        let len = text.chars().count();
        if len > limit {
            return Err(RepositoryError::MetadataTooLong {
                key: key.chars().take(META_KEY_MAX_LEN).collect(),
                field,
                len,
                limit,
            });
        }
    }
    Ok(())
}

pub(crate) fn check_all_metadata(entries: &MetaEntries<'_>) -> Result<()> {
    entries
        .iter()
        .try_for_each(|&(key, value)| check_metadata(key, value))
}

pub(crate) fn aborted(record: &ProgressionRecord, reason: impl ToString) -> RepositoryError {
    RepositoryError::RewriteAborted {
        entity: record.entity_id().to_string(),
        reason: reason.to_string(),
    }
}
