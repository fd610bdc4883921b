//! Test doubles for the orchestration workspace
//!
//! An in-memory store with the same observable semantics as the SQLite
//! store, plus fluent fixture builders. Engine scenario tests live in this
//! crate's `tests/` directory because it can depend on everything.

pub mod builders;
pub mod repository;

pub use builders::{blocks, is_blocked_by, relates_to, WorkItemBuilder};
pub use repository::MemoryStore;
