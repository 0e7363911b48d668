//! Deprecation cascade through the content tree.
//!
//! # Invariants
//! - An explicit per-node flag is authoritative for that node and becomes
//!   the default handed to its children, including an explicit `false`
//!   under a deprecated parent.
//! - A node without a flag inherits its parent's effective value.
//! - A deprecated node gets a deletion timestamp once; a non-deprecated
//!   node is left untouched, so deletion is never undone.

use crate::model::lifecycle::{EpochMs, Lifecycle};

/// Effective value handed to the aspects of every questionnaire.
pub const ROOT_DEPRECATION: bool = false;

/// Resolves the effective deprecation of one node.
pub fn effective_deprecation(explicit: Option<bool>, inherited: bool) -> bool {
    explicit.unwrap_or(inherited)
}

/// Applies an effective deprecation value to a node lifecycle.
///
/// Returns `true` when the node became deleted by this call.
pub fn apply_deprecation(lifecycle: &mut Lifecycle, deprecated: bool, now: EpochMs) -> bool {
    deprecated && lifecycle.mark_deleted(now)
}
