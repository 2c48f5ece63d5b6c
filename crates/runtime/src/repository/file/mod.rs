//! File-based repository implementations.

mod progression;

pub use progression::FileProgressionRepository;
