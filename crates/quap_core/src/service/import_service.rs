//! Questionnaire content import use-case.
//!
//! # Responsibility
//! - Walk each questionnaire tree top-down: resolve, reconcile, persist,
//!   propagate deprecation, then descend.
//! - Drive one import run from the configured document and database.
//!
//! # Invariants
//! - A node is committed before any of its children is resolved.
//! - Records are processed in document order; duplicate local ids inside one
//!   parent reconcile onto the same stored node, last one wins.
//! - The first failure aborts the run; nodes committed before it stay.
//! - A missing document is detected before the database is opened.

use crate::clock::Clock;
use crate::config::ImportConfig;
use crate::db::{open_db, DbError};
use crate::model::content::{NodeKind, Questionnaire};
use crate::repo::content_repo::{ContentRepository, RepoError, SqliteContentRepository};
use crate::service::deprecation::{apply_deprecation, effective_deprecation, ROOT_DEPRECATION};
use crate::service::level::{
    reconcile, AspectLevel, ContentLevel, HelpItemLevel, QuestionLevel, Reconciled,
};
use crate::service::summary::ImportSummary;
use crate::source::record::QuestionnaireRecord;
use crate::source::stream::{QuestionnaireStream, StreamError};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type ImportResult<T> = Result<T, ImportError>;

/// Errors that end an import run.
#[derive(Debug)]
pub enum ImportError {
    /// Reading or decoding the source document failed.
    Stream(StreamError),
    /// Opening or migrating the database failed.
    Db(DbError),
    /// A lookup or commit failed.
    Repo(RepoError),
}

impl ImportError {
    /// Whether the run ended because the source document does not exist.
    pub fn is_source_absent(&self) -> bool {
        matches!(self, Self::Stream(StreamError::SourceAbsent(_)))
    }
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Stream(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<StreamError> for ImportError {
    fn from(value: StreamError) -> Self {
        Self::Stream(value)
    }
}

impl From<DbError> for ImportError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Import service facade over a content repository and a clock.
pub struct ImportService<R: ContentRepository, C: Clock> {
    repo: R,
    clock: C,
}

impl<R: ContentRepository, C: Clock> ImportService<R, C> {
    pub fn new(repo: R, clock: C) -> Self {
        Self { repo, clock }
    }

    /// Imports every record of `records` in order.
    ///
    /// Stops at the first error; earlier records stay committed.
    pub fn import_records<I>(&self, records: I) -> ImportResult<ImportSummary>
    where
        I: IntoIterator<Item = Result<QuestionnaireRecord, StreamError>>,
    {
        let mut summary = ImportSummary::default();
        for record in records {
            let record = record?;
            self.import_questionnaire(&record, &mut summary)?;
        }
        Ok(summary)
    }

    /// Reconciles one questionnaire and its whole subtree.
    ///
    /// A record with an `id` resolves by store id and is created under that
    /// id when missing; a record without one resolves by its type tag and
    /// attaches to the lowest-id questionnaire of that type, whichever record
    /// created it.
    pub fn import_questionnaire(
        &self,
        record: &QuestionnaireRecord,
        summary: &mut ImportSummary,
    ) -> ImportResult<Questionnaire> {
        let existing = match record.id {
            Some(id) => self.repo.find_questionnaire(id)?,
            None => self.repo.find_questionnaire_by_kind(&record.kind)?,
        };

        let (questionnaire, outcome) = match existing {
            Some(mut questionnaire) => {
                questionnaire.kind = record.kind.clone();
                self.repo.update_questionnaire(&questionnaire)?;
                (questionnaire, Reconciled::Updated)
            }
            None => {
                let questionnaire = self.repo.create_questionnaire(record.id, &record.kind)?;
                (questionnaire, Reconciled::Created)
            }
        };
        summary.record(NodeKind::Questionnaire, outcome, false);
        info!(
            "event=questionnaire_sync module=import status=ok questionnaire_id={} outcome={} aspects={}",
            questionnaire.id,
            outcome.as_str(),
            record.aspects.len()
        );

        self.sync_level::<AspectLevel, _>(
            questionnaire.id,
            &record.aspects,
            ROOT_DEPRECATION,
            summary,
            |service, aspect, record, deprecated, summary| {
                service.sync_level::<QuestionLevel, _>(
                    aspect.uuid,
                    &record.questions,
                    deprecated,
                    summary,
                    |service, question, record, deprecated, summary| {
                        service.sync_level::<HelpItemLevel, _>(
                            question.uuid,
                            &record.help,
                            deprecated,
                            summary,
                            |_, _, _, _, _| Ok(()),
                        )
                    },
                )
            },
        )?;

        Ok(questionnaire)
    }

    /// Reconciles the children of one parent, descending after each commit.
    fn sync_level<L, F>(
        &self,
        parent: L::Parent,
        records: &[L::Record],
        inherited: bool,
        summary: &mut ImportSummary,
        mut descend: F,
    ) -> ImportResult<()>
    where
        L: ContentLevel,
        F: FnMut(&Self, &L::Node, &L::Record, bool, &mut ImportSummary) -> ImportResult<()>,
    {
        for record in records {
            let local_id = L::local_id(record);
            let existing = L::find(&self.repo, parent, local_id)?;
            let now = self.clock.now_ms();
            let (mut node, outcome) = reconcile::<L>(existing, parent, record, now);

            let deprecated = effective_deprecation(L::deprecated(record), inherited);
            let newly_deleted = apply_deprecation(L::lifecycle_mut(&mut node), deprecated, now);

            let committed = match outcome {
                Reconciled::Created => L::insert(&self.repo, &node),
                Reconciled::Updated => L::update(&self.repo, &node),
            };
            if let Err(err) = committed {
                error!(
                    "event=node_commit module=import status=error kind={} parent={} local_id={} error={}",
                    L::KIND,
                    parent,
                    local_id,
                    err
                );
                return Err(err.into());
            }

            summary.record(L::KIND, outcome, newly_deleted);
            debug!(
                "event=node_sync module=import status=ok kind={} parent={} local_id={} outcome={} deprecated={}",
                L::KIND,
                parent,
                local_id,
                outcome.as_str(),
                deprecated
            );

            descend(self, &node, record, deprecated, &mut *summary)?;
        }
        Ok(())
    }
}

/// Runs one import with the locations in `config`.
///
/// The document is located first: when it is absent the run returns
/// `StreamError::SourceAbsent` without touching the database.
pub fn run_import(config: &ImportConfig, clock: impl Clock) -> ImportResult<ImportSummary> {
    let started_at = Instant::now();
    info!(
        "event=import_run module=import status=start source={} db={}",
        config.import_path.display(),
        config.db_path.display()
    );

    let result = open_and_import(config, clock);
    match &result {
        Ok(summary) => info!(
            "event=import_run module=import status=ok duration_ms={} summary=\"{}\"",
            started_at.elapsed().as_millis(),
            summary
        ),
        Err(err) if err.is_source_absent() => info!(
            "event=import_run module=import status=skipped duration_ms={} reason=source_absent",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=import_run module=import status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn open_and_import(config: &ImportConfig, clock: impl Clock) -> ImportResult<ImportSummary> {
    let stream = QuestionnaireStream::open(&config.import_path)?;
    let conn = open_db(&config.db_path)?;
    let repo = SqliteContentRepository::try_new(&conn)?;
    ImportService::new(repo, clock).import_records(stream)
}
