//! Content tree domain model.
//!
//! # Responsibility
//! - Define the persisted shapes of questionnaires, aspects, questions and
//!   help items.
//! - Keep soft-delete state explicit through [`lifecycle::Lifecycle`].
//!
//! # Invariants
//! - Child nodes are identified by a stable `NodeId` and addressed by
//!   `(parent, LocalId)` during import.
//! - Deletion is represented by a deletion timestamp, never by row removal.

pub mod content;
pub mod lifecycle;
