//! Storage module for persisting jobs
//!
//! This module handles:
//! - The `JobStorage` trait shared by the coordinator and bulk workers
//! - A write-through JSON file job store
//! - The saved (reusable) job configurations store

mod file;
mod json;
mod saved;
mod traits;

pub use json::JsonJobStore;
pub use saved::{InputMethod, SavedJob, SavedJobStore};
pub use traits::{JobStorage, StorageError, StorageResult};
