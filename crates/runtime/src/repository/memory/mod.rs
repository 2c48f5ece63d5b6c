//! In-memory repository implementations.

mod progression;

pub use progression::InMemoryProgressionRepo;
