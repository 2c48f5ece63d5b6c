//! Startup migration that keeps levels stable across formula changes.
//!
//! The repository's metadata slot remembers which formula produced the stored
//! XP. When the configured formula differs, every record is remapped through
//! `new.xp_for_level(old.level_for_xp(xp))` inside one atomic rewrite that
//! also records the new descriptor. Records and descriptor therefore commit
//! together: a failed run leaves both untouched, so the next startup retries
//! from scratch, and a committed run is never re-applied to its own output.
//!
//! Must run before any [`LevelService`](crate::LevelService) serves the same
//! repository.

use leveling_core::{Formula, FormulaDescriptor, LevelFormula, TableSource};
use tracing::info;

use crate::api::{LevelingError, Result};
use crate::repository::traits::{aborted, check_all_metadata};
use crate::repository::ProgressionRepository;

/// Metadata key holding the recorded formula type tag.
pub const META_FORMULA_TYPE: &str = "formula.type";

/// Metadata key holding the recorded canonical formula parameters.
pub const META_FORMULA_PARAMS: &str = "formula.params";

/// Records visited per chunk while rewriting.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// What a migration run did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No formula was recorded; the current one was recorded as-is.
    Initialized,
    /// The recorded formula matches the current one.
    UpToDate,
    /// Stored XP was remapped from `from` to `to`.
    Migrated {
        records: u64,
        from: FormulaDescriptor,
        to: FormulaDescriptor,
    },
}

pub struct MigrationEngine<'a> {
    repository: &'a dyn ProgressionRepository,
    tables: &'a dyn TableSource,
    batch_size: usize,
}

impl<'a> MigrationEngine<'a> {
    /// `tables` resolves TABLE formulas when rebuilding the recorded one.
    pub fn new(repository: &'a dyn ProgressionRepository, tables: &'a dyn TableSource) -> Self {
        Self {
            repository,
            tables,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Descriptor recorded by the last successful run, if both keys exist.
    pub fn recorded_descriptor(&self) -> Result<Option<FormulaDescriptor>> {
        let kind = self
            .repository
            .meta_get(META_FORMULA_TYPE)
            .map_err(|e| LevelingError::persistence("read formula metadata", e))?;
        let params = self
            .repository
            .meta_get(META_FORMULA_PARAMS)
            .map_err(|e| LevelingError::persistence("read formula metadata", e))?;

        Ok(match (kind, params) {
            (Some(kind), Some(params)) => Some(FormulaDescriptor::new(kind, params)),
            _ => None,
        })
    }

    /// Brings stored XP in line with `current`.
    pub fn run(&self, current: &Formula) -> Result<MigrationOutcome> {
        let desired = current.descriptor();

        // Refuse an unrecordable descriptor before any record is visited.
        let entries = descriptor_entries(&desired);
        check_all_metadata(&entries)
            .map_err(|e| LevelingError::Configuration(format!("formula {desired}: {e}")))?;

        let Some(recorded) = self.recorded_descriptor()? else {
            self.repository
                .meta_put_all(&entries)
                .map_err(|e| LevelingError::persistence("record formula metadata", e))?;
            info!(target: "leveling::migration", formula = %desired, "Recorded initial formula");
            return Ok(MigrationOutcome::Initialized);
        };

        if recorded == desired {
            tracing::debug!(target: "leveling::migration", formula = %desired, "Formula unchanged");
            return Ok(MigrationOutcome::UpToDate);
        }

        let previous = Formula::from_descriptor(&recorded, self.tables).map_err(|e| {
            LevelingError::Configuration(format!("cannot rebuild recorded formula {recorded}: {e}"))
        })?;

        info!(
            target: "leveling::migration",
            from = %recorded,
            to = %desired,
            batch_size = self.batch_size,
            "Migrating stored XP to new formula"
        );

        let records = self
            .repository
            .rewrite_xp(
                self.batch_size,
                &mut |record| {
                    let level = previous
                        .level_for_xp(record.xp())
                        .map_err(|e| aborted(record, e))?;
                    current.xp_for_level(level).map_err(|e| aborted(record, e))
                },
                &entries,
            )
            .map_err(|e| LevelingError::persistence("xp migration", e))?;

        info!(target: "leveling::migration", records, "Migration complete");

        Ok(MigrationOutcome::Migrated {
            records,
            from: recorded,
            to: desired,
        })
    }
}

/// Both descriptor halves; always written as one group.
fn descriptor_entries(descriptor: &FormulaDescriptor) -> [(&str, &str); 2] {
    [
        (META_FORMULA_TYPE, descriptor.kind()),
        (META_FORMULA_PARAMS, descriptor.params()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryProgressionRepo;
    use leveling_core::{
        CustomFormula, EntityId, ExponentialFormula, LinearFormula, NoTables, ProgressionRecord,
    };
    use std::collections::BTreeMap;

    fn linear(per_level: i64) -> Formula {
        LinearFormula::new(per_level).unwrap().into()
    }

    #[test]
    fn first_run_only_records_descriptor() {
        let repo = InMemoryProgressionRepo::with_records([ProgressionRecord::with_xp(
            EntityId::from_u128(1),
            450,
        )]);
        let engine = MigrationEngine::new(&repo, &NoTables);

        let outcome = engine.run(&linear(100)).unwrap();
        assert_eq!(outcome, MigrationOutcome::Initialized);
        assert_eq!(
            repo.meta_get(META_FORMULA_TYPE).unwrap().as_deref(),
            Some("LINEAR")
        );
        assert_eq!(
            repo.meta_get(META_FORMULA_PARAMS).unwrap().as_deref(),
            Some("xpPerLevel=100")
        );
        assert_eq!(repo.load(EntityId::from_u128(1)).unwrap().unwrap().xp(), 450);
    }

    #[test]
    fn partial_metadata_counts_as_unmigrated() {
        let repo = InMemoryProgressionRepo::new();
        repo.meta_put(META_FORMULA_TYPE, "LINEAR").unwrap();
        let engine = MigrationEngine::new(&repo, &NoTables);
        assert_eq!(engine.run(&linear(100)).unwrap(), MigrationOutcome::Initialized);
    }

    #[test]
    fn case_insensitive_type_is_up_to_date() {
        let repo = InMemoryProgressionRepo::new();
        repo.meta_put(META_FORMULA_TYPE, "linear").unwrap();
        repo.meta_put(META_FORMULA_PARAMS, "xpPerLevel=100").unwrap();
        let engine = MigrationEngine::new(&repo, &NoTables);
        assert_eq!(engine.run(&linear(100)).unwrap(), MigrationOutcome::UpToDate);
    }

    #[test]
    fn unrecordable_descriptor_is_rejected_before_rewrite() {
        let repo = InMemoryProgressionRepo::with_records([ProgressionRecord::with_xp(
            EntityId::from_u128(1),
            450,
        )]);
        let engine = MigrationEngine::new(&repo, &NoTables);
        engine.run(&linear(100)).unwrap();

        let long_expr = format!("{} * (level - 1)", "1".repeat(300));
        let custom: Formula = CustomFormula::new(&long_expr, BTreeMap::new(), 100)
            .unwrap()
            .into();
        assert!(matches!(
            engine.run(&custom),
            Err(LevelingError::Configuration(_))
        ));
        assert_eq!(repo.load(EntityId::from_u128(1)).unwrap().unwrap().xp(), 450);
    }

    #[test]
    fn migrates_linear_to_exponential() {
        let id = EntityId::from_u128(3);
        let repo = InMemoryProgressionRepo::with_records([ProgressionRecord::with_xp(id, 650)]);
        let engine = MigrationEngine::new(&repo, &NoTables).with_batch_size(1);
        engine.run(&linear(100)).unwrap();

        let exponential: Formula = ExponentialFormula::new(100.0, 1.7).unwrap().into();
        let outcome = engine.run(&exponential).unwrap();
        assert!(matches!(outcome, MigrationOutcome::Migrated { records: 1, .. }));

        let stored = repo.load(id).unwrap().unwrap().xp();
        assert_eq!(stored, exponential.xp_for_level(7).unwrap());
        assert_eq!(exponential.level_for_xp(stored).unwrap(), 7);
    }
}
