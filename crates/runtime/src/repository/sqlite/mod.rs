//! SQLite repository implementations.

mod progression;

pub use progression::SqliteProgressionRepository;
