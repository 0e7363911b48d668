//! Serde shapes of the import document.
//!
//! A missing `deprecated` key deserializes to `None` and means "inherit the
//! parent's effective value". A present key always overrides the parent;
//! `"deprecated": null` counts as an explicit `false`.

use crate::model::content::{text_or_integer, LocalId, LocalizedText, QuestionnaireId};
use serde::{Deserialize, Deserializer};

/// One top-level element of the import array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionnaireRecord {
    /// Store id of an existing questionnaire; `null` resolves by `type`.
    #[serde(default)]
    pub id: Option<QuestionnaireId>,
    #[serde(rename = "type")]
    pub kind: String,
    pub aspects: Vec<AspectRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AspectRecord {
    pub id: LocalId,
    pub name_de: String,
    pub name_fr: String,
    pub name_it: String,
    #[serde(default, deserialize_with = "present_flag")]
    pub deprecated: Option<bool>,
    pub questions: Vec<QuestionRecord>,
}

impl AspectRecord {
    pub fn name(&self) -> LocalizedText {
        LocalizedText::new(&self.name_de, &self.name_fr, &self.name_it)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionRecord {
    pub id: LocalId,
    pub question_de: String,
    pub question_fr: String,
    pub question_it: String,
    pub answer_options: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "present_flag")]
    pub deprecated: Option<bool>,
    pub help: Vec<HelpRecord>,
}

impl QuestionRecord {
    pub fn text(&self) -> LocalizedText {
        LocalizedText::new(&self.question_de, &self.question_fr, &self.question_it)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HelpRecord {
    pub id: LocalId,
    pub help_de: String,
    pub help_fr: String,
    pub help_it: String,
    #[serde(deserialize_with = "text_or_integer")]
    pub severity: String,
    #[serde(default, deserialize_with = "present_flag")]
    pub deprecated: Option<bool>,
}

impl HelpRecord {
    pub fn text(&self) -> LocalizedText {
        LocalizedText::new(&self.help_de, &self.help_fr, &self.help_it)
    }
}

// Only called when the key is present; absence is handled by `default`.
fn present_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let flag = Option::<bool>::deserialize(deserializer)?;
    Ok(Some(flag.unwrap_or(false)))
}
