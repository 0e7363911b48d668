//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define natural-key lookup and per-node commit contracts.
//! - Isolate SQLite query details from the import walk.
//!
//! # Invariants
//! - Lookups report absence as `Ok(None)`, never as an error.

pub mod content_repo;
