//! Soft-delete lifecycle of imported content nodes.
//!
//! # Invariants
//! - Transitions only go `Active -> DeletedAt`; nothing in the import path
//!   moves a node back to `Active`.
//! - The first deletion timestamp wins; later deletions keep it.

/// Unix epoch milliseconds.
pub type EpochMs = i64;

/// Soft-delete state of one content node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lifecycle {
    /// Visible node.
    #[default]
    Active,
    /// Tombstoned node with the time it was first marked deleted.
    DeletedAt(EpochMs),
}

impl Lifecycle {
    /// Maps a nullable `deleted_at` column to lifecycle state.
    pub fn from_deleted_at(deleted_at: Option<EpochMs>) -> Self {
        match deleted_at {
            Some(at) => Self::DeletedAt(at),
            None => Self::Active,
        }
    }

    /// Returns the deletion timestamp, if any.
    pub fn deleted_at(&self) -> Option<EpochMs> {
        match self {
            Self::Active => None,
            Self::DeletedAt(at) => Some(*at),
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::DeletedAt(_))
    }

    /// Marks the node deleted at `now` unless it already is.
    ///
    /// Returns `true` only when this call performed the transition.
    pub fn mark_deleted(&mut self, now: EpochMs) -> bool {
        match self {
            Self::Active => {
                *self = Self::DeletedAt(now);
                true
            }
            Self::DeletedAt(_) => false,
        }
    }
}
