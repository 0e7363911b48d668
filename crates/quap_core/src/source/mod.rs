//! Import source document.
//!
//! # Responsibility
//! - Describe the shape of the externally produced content document.
//! - Read its top-level records lazily, one questionnaire at a time.
//!
//! # Invariants
//! - At most one top-level record (with its subtree) is held in memory.

pub mod record;
pub mod stream;
