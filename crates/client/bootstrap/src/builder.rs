//! Builds the storage, formula and service bundle used by front-ends.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use leveling_runtime::{
    FileProgressionRepository, InMemoryProgressionRepo, LevelService, MigrationEngine,
    MigrationOutcome, ProgressionRepository, SqliteProgressionRepository,
};

use crate::config::{DatabaseConfig, LevelingConfig, StorageBackend};
use crate::formulas::{CsvTableSource, formula_from_config};

/// Builder that assembles storage, migration and the level service for clients.
pub struct LevelingBuilder {
    config: LevelingConfig,
    data_dir: PathBuf,
    repository: Option<Arc<dyn ProgressionRepository>>,
}

impl LevelingBuilder {
    /// `data_dir` anchors relative database paths and table files.
    pub fn new(config: LevelingConfig, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            data_dir: data_dir.into(),
            repository: None,
        }
    }

    /// Use an already opened store instead of the configured backend.
    pub fn repository(mut self, repository: Arc<dyn ProgressionRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn build(self) -> Result<LevelingSetup> {
        let tables = CsvTableSource::new(&self.data_dir);
        let formula = formula_from_config(&self.config.formula, &tables)?;
        tracing::info!(formula = %formula.descriptor(), "Formula configured");

        let repository = match self.repository {
            Some(repository) => repository,
            None => open_repository(&self.config.database, &self.data_dir)?,
        };

        // Migration must finish before the service serves the store.
        let migration = if self.config.formula.migrate_xp {
            let outcome = MigrationEngine::new(repository.as_ref(), &tables).run(&formula);
            match outcome {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    if let Err(close_err) = repository.close() {
                        tracing::warn!(error = %close_err, "Failed to close store after migration error");
                    }
                    return Err(err).context("XP migration failed");
                }
            }
        } else {
            tracing::info!("XP migration disabled by configuration");
            None
        };

        let service = Arc::new(LevelService::new(formula, Arc::clone(&repository)));

        Ok(LevelingSetup {
            config: self.config,
            data_dir: self.data_dir,
            tables,
            service,
            repository,
            migration,
            closed: AtomicBool::new(false),
        })
    }
}

/// Open the configured backend.
pub fn open_repository(
    database: &DatabaseConfig,
    data_dir: &Path,
) -> Result<Arc<dyn ProgressionRepository>> {
    let path = database.resolve_path(data_dir);
    let repository: Arc<dyn ProgressionRepository> = match database.backend {
        StorageBackend::Sqlite => Arc::new(
            SqliteProgressionRepository::open(&path)
                .with_context(|| format!("Failed to open SQLite store {}", path.display()))?,
        ),
        StorageBackend::File => Arc::new(
            FileProgressionRepository::open(&path)
                .with_context(|| format!("Failed to open file store {}", path.display()))?,
        ),
        StorageBackend::Memory => Arc::new(InMemoryProgressionRepo::new()),
    };

    tracing::info!(backend = %database.backend, path = %path.display(), "Progression store opened");
    Ok(repository)
}

pub struct LevelingSetup {
    pub config: LevelingConfig,
    pub data_dir: PathBuf,
    pub service: Arc<LevelService>,
    pub repository: Arc<dyn ProgressionRepository>,
    /// Result of the startup migration; `None` when it is disabled.
    pub migration: Option<MigrationOutcome>,
    tables: CsvTableSource,
    closed: AtomicBool,
}

impl LevelingSetup {
    /// Run the migration for the service's formula now, regardless of the
    /// `migrate_xp` setting.
    ///
    /// Only call this while no mutation is in flight; cached entries are not
    /// refreshed.
    pub fn migrate(&self) -> Result<MigrationOutcome> {
        MigrationEngine::new(self.repository.as_ref(), &self.tables)
            .run(self.service.formula())
            .context("XP migration failed")
    }

    /// Close the store. Later calls are no-ops.
    pub fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.repository
            .close()
            .context("Failed to close progression store")?;
        tracing::info!("Progression store closed");
        Ok(())
    }
}
