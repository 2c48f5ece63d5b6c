//! Runtime half of the leveling system: storage, migration and the service.
//!
//! This crate wires the pure formulas from `leveling-core` to durable storage.
//! Hosts open a [`ProgressionRepository`], run the [`MigrationEngine`] once so
//! stored XP matches the configured formula, then serve requests through a
//! [`LevelService`].
//!
//! Modules are organized by responsibility:
//! - [`repository`] defines the persistence port and its adapters
//! - [`migration`] keeps levels stable when the formula changes
//! - [`service`] hosts the cache, mutation API and listener registries
//! - [`api`] exposes the unified error type
pub mod api;
pub mod migration;
pub mod repository;
pub mod service;

pub use api::{LevelingError, Result};
pub use migration::{
    DEFAULT_BATCH_SIZE, META_FORMULA_PARAMS, META_FORMULA_TYPE, MigrationEngine, MigrationOutcome,
};
#[cfg(feature = "sqlite")]
pub use repository::SqliteProgressionRepository;
pub use repository::{
    FileProgressionRepository, InMemoryProgressionRepo, ProgressionRepository, RepositoryError,
};
pub use service::{
    LevelChangeListener, LevelDownListener, LevelService, LevelUpListener, ListenerRegistry,
    Listeners, XpGainListener, XpLossListener,
};
