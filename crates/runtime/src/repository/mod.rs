//! Repository layer for progression records.
//!
//! Repositories own the durable copy of every entity's XP plus a small
//! metadata slot. Levels are never stored; they are derived by the active
//! formula on read.
//!
//! Adapters:
//! - [`InMemoryProgressionRepo`]: process-local, for tests
//! - [`FileProgressionRepository`]: one bincode snapshot of records and metadata
//! - [`SqliteProgressionRepository`]: relational layout (feature `sqlite`)

mod error;
mod file;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
pub(crate) mod traits;

pub use error::{RepositoryError, Result};
pub use file::FileProgressionRepository;
pub use memory::InMemoryProgressionRepo;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteProgressionRepository;
pub use traits::{
    META_KEY_MAX_LEN, META_VALUE_MAX_LEN, MetaEntries, ProgressionRepository, XpRemap,
};
