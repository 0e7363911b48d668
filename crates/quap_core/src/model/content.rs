//! Questionnaire content tree entities.
//!
//! # Responsibility
//! - Define the four persisted levels: questionnaire, aspect, question and
//!   help item.
//! - Define `LocalId`, the source-supplied key scoped to one parent.
//!
//! # Invariants
//! - `created_at` is assigned by the constructors and never changed after.
//! - `Question::answer_options` is assigned by the constructor only.
//! - Every child node carries exactly one parent reference.

use crate::model::lifecycle::{EpochMs, Lifecycle};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Store identifier of a questionnaire.
pub type QuestionnaireId = i64;

/// Stable store identifier of aspects, questions and help items.
pub type NodeId = Uuid;

/// Level of the content tree, used in logs, errors and run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Questionnaire,
    Aspect,
    Question,
    HelpItem,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Questionnaire => "questionnaire",
            Self::Aspect => "aspect",
            Self::Question => "question",
            Self::HelpItem => "help_item",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier meaningful only within one parent's scope.
///
/// Source documents carry it either as a string or as an integer; integers
/// are kept as their decimal text so `1` and `"1"` name the same node.
/// Comparison is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LocalId(String);

impl LocalId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for LocalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocalId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for LocalId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        text_or_integer(deserializer).map(Self)
    }
}

/// Deserializes a JSON string or integer into its textual form.
pub(crate) fn text_or_integer<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(TextOrIntegerVisitor)
}

struct TextOrIntegerVisitor;

impl Visitor<'_> for TextOrIntegerVisitor {
    type Value = String;

    fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("a string or an integer")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<String, E> {
        Ok(value)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
        Ok(value.to_string())
    }
}

/// German, French and Italian variants of one text field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalizedText {
    pub de: String,
    pub fr: String,
    pub it: String,
}

impl LocalizedText {
    pub fn new(de: impl Into<String>, fr: impl Into<String>, it: impl Into<String>) -> Self {
        Self {
            de: de.into(),
            fr: fr.into(),
            it: it.into(),
        }
    }
}

/// Root of one content tree. Never deleted by the importer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Questionnaire {
    pub id: QuestionnaireId,
    /// Type tag read APIs address the questionnaire by.
    pub kind: String,
}

/// Thematic group of questions inside one questionnaire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aspect {
    pub uuid: NodeId,
    pub questionnaire_id: QuestionnaireId,
    pub local_id: LocalId,
    pub name: LocalizedText,
    pub created_at: EpochMs,
    pub lifecycle: Lifecycle,
}

impl Aspect {
    /// Materializes a new aspect with a fresh id and creation time `now`.
    pub fn new(
        questionnaire_id: QuestionnaireId,
        local_id: LocalId,
        name: LocalizedText,
        now: EpochMs,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            questionnaire_id,
            local_id,
            name,
            created_at: now,
            lifecycle: Lifecycle::Active,
        }
    }
}

/// Prompt shown to the user, with a fixed set of answer options.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub uuid: NodeId,
    pub aspect_uuid: NodeId,
    pub local_id: LocalId,
    pub text: LocalizedText,
    /// Set once at creation. Later imports never revise it.
    pub answer_options: Vec<serde_json::Value>,
    pub created_at: EpochMs,
    pub lifecycle: Lifecycle,
}

impl Question {
    pub fn new(
        aspect_uuid: NodeId,
        local_id: LocalId,
        text: LocalizedText,
        answer_options: Vec<serde_json::Value>,
        now: EpochMs,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            aspect_uuid,
            local_id,
            text,
            answer_options,
            created_at: now,
            lifecycle: Lifecycle::Active,
        }
    }
}

/// Explanatory text attached to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpItem {
    pub uuid: NodeId,
    pub question_uuid: NodeId,
    pub local_id: LocalId,
    pub text: LocalizedText,
    pub severity: String,
    pub created_at: EpochMs,
    pub lifecycle: Lifecycle,
}

impl HelpItem {
    pub fn new(
        question_uuid: NodeId,
        local_id: LocalId,
        text: LocalizedText,
        severity: impl Into<String>,
        now: EpochMs,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            question_uuid,
            local_id,
            text,
            severity: severity.into(),
            created_at: now,
            lifecycle: Lifecycle::Active,
        }
    }
}
