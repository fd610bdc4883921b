//! Work-Item Orchestration Core
//!
//! Foundational domain models, the role/trigger transition engine and its
//! surrounding coordinators, and the trait interfaces every other crate in
//! the workspace builds on.
//!
//! # Architecture
//!
//! - [`models`] - Work items, dependencies, notes, audit records
//! - [`roles`] - The role ladder, triggers and priorities
//! - [`error`] - Error taxonomy and result handling
//! - [`repository`] - Persistence contracts composed by the engine
//! - [`engine`] - The transition state machine with dependency and gate checks
//! - [`cascade`] / [`unblock`] - Derived-effect detectors
//! - [`batch`] / [`tree`] - The `advance_item` and `complete_tree` orchestrators
//! - [`gate`] / [`schema`] - Role-entry gates and the note-schema provider
//! - [`advisory`] - Read-only recommendation and context computations
//! - [`items`] / [`deps`] / [`notes`] - Entity managers behind the manage tools
//! - [`protocol`] - Tool handler trait and typed parameter/result structs
//! - [`validation`] - Input validation utilities

pub mod advisory;
pub mod batch;
pub mod blockers;
pub mod cascade;
pub mod deps;
pub mod engine;
pub mod error;
pub mod gate;
pub mod items;
pub mod models;
pub mod notes;
pub mod protocol;
pub mod repository;
pub mod roles;
pub mod schema;
pub mod tree;
pub mod unblock;
pub mod validation;

// Re-export commonly used types at the crate root for convenience
pub use batch::{AdvanceEntryResult, AdvanceReport, AdvanceSummary};
pub use cascade::CascadeEvent;
pub use engine::{TransitionEngine, TransitionOutcome, TransitionRequest};
pub use error::{Result, WorkItemError};
pub use gate::GateStatus;
pub use models::{
    BlockerStatus, Dependency, DependencyType, NewDependency, NewRoleTransition, NewWorkItem,
    Note, NoteUpsert, RoleTransition, UpdateWorkItem, WorkItem, WorkItemFilter, MAX_DEPTH,
};
pub use protocol::{HealthStatus, ProtocolHandler};
pub use repository::{
    DependencyRepository, NoteRepository, OrchestratorStore, TransitionRepository,
    WorkItemRepository,
};
pub use roles::{Priority, Role, Trigger};
pub use schema::{NoOpNoteSchemaService, NoteRequirement, NoteSchemaService, StaticNoteSchemaService};
pub use tree::{TreeReport, TreeSelection, TreeSummary};
pub use unblock::UnblockedItem;
pub use validation::ItemValidator;

/// Current version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
