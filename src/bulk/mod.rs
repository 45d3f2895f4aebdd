//! Bulk extraction
//!
//! This module runs many extractions as one job:
//! - CSV intake into validated rows
//! - Row-over-global authentication precedence
//! - Sequential execution with per-row persistence
//! - Optional merging of text outputs into one combined result

mod auth;
mod orchestrator;
mod rows;

pub use auth::{parse_cookie_string, parse_header_json, resolve_auth, AuthBlock, AuthMethod};
pub use orchestrator::{run_bulk, BulkSpec};
pub use rows::{parse_bulk_csv, parse_flag, BulkRow};
