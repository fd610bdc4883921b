//! SQLite persistence for the work-item orchestration server
//!
//! Implements the four repository contracts from `item-core` over one
//! `sqlx` connection pool, with the atomic item+audit transition write the
//! engine relies on.

mod common;
mod sqlite;

pub use sqlite::SqliteStore;
