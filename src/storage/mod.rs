//! SQLite storage layer for the mirror.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode and a busy timeout
//! - Transaction discipline for every mirror write
//! - A run log of every sync invocation
//!
//! # Submodules
//!
//! - [`runs`] - Sync run log
//! - [`schema`] - Bookkeeping schema definitions
//! - [`sqlite`] - Mirror table operations

pub mod runs;
pub mod schema;
pub mod sqlite;

pub use runs::{RunStatus, SyncRun};
pub use sqlite::SqliteStorage;
