//! Repository implementations for database operations

pub mod sessions;
pub mod snapshots;

pub use sessions::*;
pub use snapshots::*;
