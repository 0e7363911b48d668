//! One reconciliation contract shared by the three child levels of the tree.
//!
//! # Responsibility
//! - Describe, per level, how to resolve a node by natural key, how to
//!   materialize it, which fields an import refreshes and how it is stored.
//! - Provide the create-vs-update decision in [`reconcile`].
//!
//! # Invariants
//! - `create` is the only place that sets identity, `created_at` and
//!   question answer options.
//! - `refresh` rewrites localized text, severity and the parent reference,
//!   and nothing else.

use crate::model::content::{
    Aspect, HelpItem, LocalId, NodeId, NodeKind, Question, QuestionnaireId,
};
use crate::model::lifecycle::{EpochMs, Lifecycle};
use crate::repo::content_repo::{ContentRepository, RepoResult};
use crate::source::record::{AspectRecord, HelpRecord, QuestionRecord};
use std::fmt::Display;

/// Whether reconciliation materialized a new node or reused a stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Created,
    Updated,
}

impl Reconciled {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

/// Per-level hooks driven by the generic tree walk.
pub trait ContentLevel {
    /// Identity of the owning node, the natural-key scope.
    type Parent: Copy + Display;
    /// Source document shape of one node.
    type Record;
    /// Persisted shape of one node.
    type Node;

    const KIND: NodeKind;

    fn local_id(record: &Self::Record) -> &LocalId;
    fn deprecated(record: &Self::Record) -> Option<bool>;

    fn find<R: ContentRepository>(
        repo: &R,
        parent: Self::Parent,
        local_id: &LocalId,
    ) -> RepoResult<Option<Self::Node>>;
    fn create(parent: Self::Parent, record: &Self::Record, now: EpochMs) -> Self::Node;
    fn refresh(node: &mut Self::Node, parent: Self::Parent, record: &Self::Record);
    fn lifecycle_mut(node: &mut Self::Node) -> &mut Lifecycle;

    fn insert<R: ContentRepository>(repo: &R, node: &Self::Node) -> RepoResult<()>;
    fn update<R: ContentRepository>(repo: &R, node: &Self::Node) -> RepoResult<()>;
}

/// Reuses `existing` or materializes a new node, then refreshes it.
pub fn reconcile<L: ContentLevel>(
    existing: Option<L::Node>,
    parent: L::Parent,
    record: &L::Record,
    now: EpochMs,
) -> (L::Node, Reconciled) {
    let (mut node, outcome) = match existing {
        Some(node) => (node, Reconciled::Updated),
        None => (L::create(parent, record, now), Reconciled::Created),
    };
    L::refresh(&mut node, parent, record);
    (node, outcome)
}

/// Aspects, scoped by questionnaire.
pub struct AspectLevel;

impl ContentLevel for AspectLevel {
    type Parent = QuestionnaireId;
    type Record = AspectRecord;
    type Node = Aspect;

    const KIND: NodeKind = NodeKind::Aspect;

    fn local_id(record: &AspectRecord) -> &LocalId {
        &record.id
    }

    fn deprecated(record: &AspectRecord) -> Option<bool> {
        record.deprecated
    }

    fn find<R: ContentRepository>(
        repo: &R,
        parent: QuestionnaireId,
        local_id: &LocalId,
    ) -> RepoResult<Option<Aspect>> {
        repo.find_aspect(parent, local_id)
    }

    fn create(parent: QuestionnaireId, record: &AspectRecord, now: EpochMs) -> Aspect {
        Aspect::new(parent, record.id.clone(), record.name(), now)
    }

    fn refresh(node: &mut Aspect, parent: QuestionnaireId, record: &AspectRecord) {
        node.name = record.name();
        node.questionnaire_id = parent;
    }

    fn lifecycle_mut(node: &mut Aspect) -> &mut Lifecycle {
        &mut node.lifecycle
    }

    fn insert<R: ContentRepository>(repo: &R, node: &Aspect) -> RepoResult<()> {
        repo.create_aspect(node)
    }

    fn update<R: ContentRepository>(repo: &R, node: &Aspect) -> RepoResult<()> {
        repo.update_aspect(node)
    }
}

/// Questions, scoped by aspect.
pub struct QuestionLevel;

impl ContentLevel for QuestionLevel {
    type Parent = NodeId;
    type Record = QuestionRecord;
    type Node = Question;

    const KIND: NodeKind = NodeKind::Question;

    fn local_id(record: &QuestionRecord) -> &LocalId {
        &record.id
    }

    fn deprecated(record: &QuestionRecord) -> Option<bool> {
        record.deprecated
    }

    fn find<R: ContentRepository>(
        repo: &R,
        parent: NodeId,
        local_id: &LocalId,
    ) -> RepoResult<Option<Question>> {
        repo.find_question(parent, local_id)
    }

    fn create(parent: NodeId, record: &QuestionRecord, now: EpochMs) -> Question {
        Question::new(
            parent,
            record.id.clone(),
            record.text(),
            record.answer_options.clone(),
            now,
        )
    }

    fn refresh(node: &mut Question, parent: NodeId, record: &QuestionRecord) {
        node.text = record.text();
        node.aspect_uuid = parent;
    }

    fn lifecycle_mut(node: &mut Question) -> &mut Lifecycle {
        &mut node.lifecycle
    }

    fn insert<R: ContentRepository>(repo: &R, node: &Question) -> RepoResult<()> {
        repo.create_question(node)
    }

    fn update<R: ContentRepository>(repo: &R, node: &Question) -> RepoResult<()> {
        repo.update_question(node)
    }
}

/// Help items, scoped by question.
pub struct HelpItemLevel;

impl ContentLevel for HelpItemLevel {
    type Parent = NodeId;
    type Record = HelpRecord;
    type Node = HelpItem;

    const KIND: NodeKind = NodeKind::HelpItem;

    fn local_id(record: &HelpRecord) -> &LocalId {
        &record.id
    }

    fn deprecated(record: &HelpRecord) -> Option<bool> {
        record.deprecated
    }

    fn find<R: ContentRepository>(
        repo: &R,
        parent: NodeId,
        local_id: &LocalId,
    ) -> RepoResult<Option<HelpItem>> {
        repo.find_help_item(parent, local_id)
    }

    fn create(parent: NodeId, record: &HelpRecord, now: EpochMs) -> HelpItem {
        HelpItem::new(
            parent,
            record.id.clone(),
            record.text(),
            record.severity.as_str(),
            now,
        )
    }

    fn refresh(node: &mut HelpItem, parent: NodeId, record: &HelpRecord) {
        node.text = record.text();
        node.severity = record.severity.clone();
        node.question_uuid = parent;
    }

    fn lifecycle_mut(node: &mut HelpItem) -> &mut Lifecycle {
        &mut node.lifecycle
    }

    fn insert<R: ContentRepository>(repo: &R, node: &HelpItem) -> RepoResult<()> {
        repo.create_help_item(node)
    }

    fn update<R: ContentRepository>(repo: &R, node: &HelpItem) -> RepoResult<()> {
        repo.update_help_item(node)
    }
}
