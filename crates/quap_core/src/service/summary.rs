//! Per-run import counters.

use crate::model::content::NodeKind;
use crate::service::level::Reconciled;
use std::fmt::{Display, Formatter};

/// Counters for one tree level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelCounts {
    pub created: usize,
    pub updated: usize,
    /// Nodes that received their deletion timestamp during this run.
    pub deleted: usize,
}

/// Outcome counters of one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub questionnaires: LevelCounts,
    pub aspects: LevelCounts,
    pub questions: LevelCounts,
    pub help_items: LevelCounts,
}

impl ImportSummary {
    pub fn counts(&self, kind: NodeKind) -> LevelCounts {
        match kind {
            NodeKind::Questionnaire => self.questionnaires,
            NodeKind::Aspect => self.aspects,
            NodeKind::Question => self.questions,
            NodeKind::HelpItem => self.help_items,
        }
    }

    pub(crate) fn record(&mut self, kind: NodeKind, outcome: Reconciled, newly_deleted: bool) {
        let counts = match kind {
            NodeKind::Questionnaire => &mut self.questionnaires,
            NodeKind::Aspect => &mut self.aspects,
            NodeKind::Question => &mut self.questions,
            NodeKind::HelpItem => &mut self.help_items,
        };
        match outcome {
            Reconciled::Created => counts.created += 1,
            Reconciled::Updated => counts.updated += 1,
        }
        if newly_deleted {
            counts.deleted += 1;
        }
    }
}

impl Display for ImportSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let levels = [
            NodeKind::Questionnaire,
            NodeKind::Aspect,
            NodeKind::Question,
            NodeKind::HelpItem,
        ];
        for (position, kind) in levels.into_iter().enumerate() {
            let counts = self.counts(kind);
            if position > 0 {
                f.write_str("; ")?;
            }
            write!(
                f,
                "{kind}: {} created, {} updated, {} deprecated",
                counts.created, counts.updated, counts.deleted
            )?;
        }
        Ok(())
    }
}
