//! Public runtime API surface.
//!
//! Types exposed to consumers of the runtime crate that are not tied to a
//! single subsystem.

pub mod errors;

pub use errors::{LevelingError, Result};
