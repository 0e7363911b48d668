//! Content tree repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Resolve child nodes by natural key `(parent, local_id)`.
//! - Persist one node per call so every commit is durable before the import
//!   walk moves on.
//!
//! # Invariants
//! - Natural-key lookups are exact, case-sensitive and scoped to one parent.
//! - Update paths never touch `created_at` or `Question::answer_options`.
//! - Update paths never clear an existing `deleted_at`.
//! - Child listings are returned in insertion order.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::content::{
    Aspect, HelpItem, LocalId, LocalizedText, NodeId, NodeKind, Question, Questionnaire,
    QuestionnaireId,
};
use crate::model::lifecycle::Lifecycle;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ASPECT_SELECT_SQL: &str = "SELECT
    uuid,
    questionnaire_id,
    local_id,
    name_de,
    name_fr,
    name_it,
    created_at,
    deleted_at
FROM aspects";

const QUESTION_SELECT_SQL: &str = "SELECT
    uuid,
    aspect_uuid,
    local_id,
    question_de,
    question_fr,
    question_it,
    answer_options,
    created_at,
    deleted_at
FROM questions";

const HELP_ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    question_uuid,
    local_id,
    help_de,
    help_fr,
    help_it,
    severity,
    created_at,
    deleted_at
FROM help_items";

const REQUIRED_TABLES: [&str; 4] = ["questionnaires", "aspects", "questions", "help_items"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from content repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Update target does not exist.
    NotFound { kind: NodeKind, id: String },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "content repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "content repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted content: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the questionnaire content tree.
///
/// `find_*` methods return `Ok(None)` when nothing matches; absence is the
/// normal signal to create.
pub trait ContentRepository {
    fn find_questionnaire(&self, id: QuestionnaireId) -> RepoResult<Option<Questionnaire>>;
    /// Returns the lowest-id questionnaire carrying `kind`.
    ///
    /// Any stored questionnaire matches, including one first created from a
    /// record with an explicit id; the type tag is not unique in the store.
    fn find_questionnaire_by_kind(&self, kind: &str) -> RepoResult<Option<Questionnaire>>;
    /// Inserts a questionnaire, with a store-assigned id when `id` is `None`.
    fn create_questionnaire(
        &self,
        id: Option<QuestionnaireId>,
        kind: &str,
    ) -> RepoResult<Questionnaire>;
    fn update_questionnaire(&self, questionnaire: &Questionnaire) -> RepoResult<()>;
    fn list_questionnaires(&self) -> RepoResult<Vec<Questionnaire>>;

    fn find_aspect(
        &self,
        questionnaire_id: QuestionnaireId,
        local_id: &LocalId,
    ) -> RepoResult<Option<Aspect>>;
    fn create_aspect(&self, aspect: &Aspect) -> RepoResult<()>;
    fn update_aspect(&self, aspect: &Aspect) -> RepoResult<()>;
    fn list_aspects(&self, questionnaire_id: QuestionnaireId) -> RepoResult<Vec<Aspect>>;

    fn find_question(&self, aspect_uuid: NodeId, local_id: &LocalId)
        -> RepoResult<Option<Question>>;
    fn create_question(&self, question: &Question) -> RepoResult<()>;
    fn update_question(&self, question: &Question) -> RepoResult<()>;
    fn list_questions(&self, aspect_uuid: NodeId) -> RepoResult<Vec<Question>>;

    fn find_help_item(
        &self,
        question_uuid: NodeId,
        local_id: &LocalId,
    ) -> RepoResult<Option<HelpItem>>;
    fn create_help_item(&self, help_item: &HelpItem) -> RepoResult<()>;
    fn update_help_item(&self, help_item: &HelpItem) -> RepoResult<()>;
    fn list_help_items(&self, question_uuid: NodeId) -> RepoResult<Vec<HelpItem>>;
}

/// SQLite-backed content repository.
pub struct SqliteContentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContentRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_content_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ContentRepository for SqliteContentRepository<'_> {
    fn find_questionnaire(&self, id: QuestionnaireId) -> RepoResult<Option<Questionnaire>> {
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT type FROM questionnaires WHERE id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(kind.map(|kind| Questionnaire { id, kind }))
    }

    fn find_questionnaire_by_kind(&self, kind: &str) -> RepoResult<Option<Questionnaire>> {
        let found = self
            .conn
            .query_row(
                "SELECT id, type
                 FROM questionnaires
                 WHERE type = ?1
                 ORDER BY id ASC
                 LIMIT 1;",
                [kind],
                parse_questionnaire_row,
            )
            .optional()?;
        Ok(found)
    }

    fn create_questionnaire(
        &self,
        id: Option<QuestionnaireId>,
        kind: &str,
    ) -> RepoResult<Questionnaire> {
        self.conn.execute(
            "INSERT INTO questionnaires (id, type) VALUES (?1, ?2);",
            params![id, kind],
        )?;
        Ok(Questionnaire {
            id: id.unwrap_or_else(|| self.conn.last_insert_rowid()),
            kind: kind.to_string(),
        })
    }

    fn update_questionnaire(&self, questionnaire: &Questionnaire) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE questionnaires SET type = ?2 WHERE id = ?1;",
            params![questionnaire.id, questionnaire.kind.as_str()],
        )?;
        ensure_changed(changed, NodeKind::Questionnaire, questionnaire.id)
    }

    fn list_questionnaires(&self) -> RepoResult<Vec<Questionnaire>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, type FROM questionnaires ORDER BY id ASC;")?;
        let rows = stmt.query_map([], parse_questionnaire_row)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn find_aspect(
        &self,
        questionnaire_id: QuestionnaireId,
        local_id: &LocalId,
    ) -> RepoResult<Option<Aspect>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ASPECT_SELECT_SQL}
             WHERE questionnaire_id = ?1
               AND local_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![questionnaire_id, local_id.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_aspect_row(row)?));
        }
        Ok(None)
    }

    fn create_aspect(&self, aspect: &Aspect) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO aspects (
                uuid,
                questionnaire_id,
                local_id,
                name_de,
                name_fr,
                name_it,
                created_at,
                deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                aspect.uuid.to_string(),
                aspect.questionnaire_id,
                aspect.local_id.as_str(),
                aspect.name.de.as_str(),
                aspect.name.fr.as_str(),
                aspect.name.it.as_str(),
                aspect.created_at,
                aspect.lifecycle.deleted_at(),
            ],
        )?;
        Ok(())
    }

    fn update_aspect(&self, aspect: &Aspect) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE aspects
             SET
                questionnaire_id = ?2,
                name_de = ?3,
                name_fr = ?4,
                name_it = ?5,
                deleted_at = COALESCE(deleted_at, ?6)
             WHERE uuid = ?1;",
            params![
                aspect.uuid.to_string(),
                aspect.questionnaire_id,
                aspect.name.de.as_str(),
                aspect.name.fr.as_str(),
                aspect.name.it.as_str(),
                aspect.lifecycle.deleted_at(),
            ],
        )?;
        ensure_changed(changed, NodeKind::Aspect, aspect.uuid)
    }

    fn list_aspects(&self, questionnaire_id: QuestionnaireId) -> RepoResult<Vec<Aspect>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ASPECT_SELECT_SQL}
             WHERE questionnaire_id = ?1
             ORDER BY rowid ASC;"
        ))?;
        let mut rows = stmt.query([questionnaire_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_aspect_row(row)?);
        }
        Ok(items)
    }

    fn find_question(
        &self,
        aspect_uuid: NodeId,
        local_id: &LocalId,
    ) -> RepoResult<Option<Question>> {
        let mut stmt = self.conn.prepare(&format!(
            "{QUESTION_SELECT_SQL}
             WHERE aspect_uuid = ?1
               AND local_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![aspect_uuid.to_string(), local_id.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_question_row(row)?));
        }
        Ok(None)
    }

    fn create_question(&self, question: &Question) -> RepoResult<()> {
        let answer_options = serde_json::to_string(&question.answer_options).map_err(|err| {
            RepoError::InvalidData(format!(
                "answer options of question {} cannot be encoded: {err}",
                question.uuid
            ))
        })?;
        self.conn.execute(
            "INSERT INTO questions (
                uuid,
                aspect_uuid,
                local_id,
                question_de,
                question_fr,
                question_it,
                answer_options,
                created_at,
                deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                question.uuid.to_string(),
                question.aspect_uuid.to_string(),
                question.local_id.as_str(),
                question.text.de.as_str(),
                question.text.fr.as_str(),
                question.text.it.as_str(),
                answer_options,
                question.created_at,
                question.lifecycle.deleted_at(),
            ],
        )?;
        Ok(())
    }

    fn update_question(&self, question: &Question) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE questions
             SET
                aspect_uuid = ?2,
                question_de = ?3,
                question_fr = ?4,
                question_it = ?5,
                deleted_at = COALESCE(deleted_at, ?6)
             WHERE uuid = ?1;",
            params![
                question.uuid.to_string(),
                question.aspect_uuid.to_string(),
                question.text.de.as_str(),
                question.text.fr.as_str(),
                question.text.it.as_str(),
                question.lifecycle.deleted_at(),
            ],
        )?;
        ensure_changed(changed, NodeKind::Question, question.uuid)
    }

    fn list_questions(&self, aspect_uuid: NodeId) -> RepoResult<Vec<Question>> {
        let mut stmt = self.conn.prepare(&format!(
            "{QUESTION_SELECT_SQL}
             WHERE aspect_uuid = ?1
             ORDER BY rowid ASC;"
        ))?;
        let mut rows = stmt.query([aspect_uuid.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_question_row(row)?);
        }
        Ok(items)
    }

    fn find_help_item(
        &self,
        question_uuid: NodeId,
        local_id: &LocalId,
    ) -> RepoResult<Option<HelpItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{HELP_ITEM_SELECT_SQL}
             WHERE question_uuid = ?1
               AND local_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![question_uuid.to_string(), local_id.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_help_item_row(row)?));
        }
        Ok(None)
    }

    fn create_help_item(&self, help_item: &HelpItem) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO help_items (
                uuid,
                question_uuid,
                local_id,
                help_de,
                help_fr,
                help_it,
                severity,
                created_at,
                deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                help_item.uuid.to_string(),
                help_item.question_uuid.to_string(),
                help_item.local_id.as_str(),
                help_item.text.de.as_str(),
                help_item.text.fr.as_str(),
                help_item.text.it.as_str(),
                help_item.severity.as_str(),
                help_item.created_at,
                help_item.lifecycle.deleted_at(),
            ],
        )?;
        Ok(())
    }

    fn update_help_item(&self, help_item: &HelpItem) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE help_items
             SET
                question_uuid = ?2,
                help_de = ?3,
                help_fr = ?4,
                help_it = ?5,
                severity = ?6,
                deleted_at = COALESCE(deleted_at, ?7)
             WHERE uuid = ?1;",
            params![
                help_item.uuid.to_string(),
                help_item.question_uuid.to_string(),
                help_item.text.de.as_str(),
                help_item.text.fr.as_str(),
                help_item.text.it.as_str(),
                help_item.severity.as_str(),
                help_item.lifecycle.deleted_at(),
            ],
        )?;
        ensure_changed(changed, NodeKind::HelpItem, help_item.uuid)
    }

    fn list_help_items(&self, question_uuid: NodeId) -> RepoResult<Vec<HelpItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{HELP_ITEM_SELECT_SQL}
             WHERE question_uuid = ?1
             ORDER BY rowid ASC;"
        ))?;
        let mut rows = stmt.query([question_uuid.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_help_item_row(row)?);
        }
        Ok(items)
    }
}

fn ensure_changed(changed: usize, kind: NodeKind, id: impl Display) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

fn parse_questionnaire_row(row: &Row<'_>) -> rusqlite::Result<Questionnaire> {
    Ok(Questionnaire {
        id: row.get("id")?,
        kind: row.get("type")?,
    })
}

fn parse_aspect_row(row: &Row<'_>) -> RepoResult<Aspect> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Aspect {
        uuid: parse_uuid(&uuid_text, "aspects.uuid")?,
        questionnaire_id: row.get("questionnaire_id")?,
        local_id: LocalId::new(row.get::<_, String>("local_id")?),
        name: LocalizedText {
            de: row.get("name_de")?,
            fr: row.get("name_fr")?,
            it: row.get("name_it")?,
        },
        created_at: row.get("created_at")?,
        lifecycle: Lifecycle::from_deleted_at(row.get("deleted_at")?),
    })
}

fn parse_question_row(row: &Row<'_>) -> RepoResult<Question> {
    let uuid_text: String = row.get("uuid")?;
    let aspect_text: String = row.get("aspect_uuid")?;
    let options_text: String = row.get("answer_options")?;
    let answer_options = serde_json::from_str(&options_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid answer options `{options_text}` in questions.answer_options"
        ))
    })?;

    Ok(Question {
        uuid: parse_uuid(&uuid_text, "questions.uuid")?,
        aspect_uuid: parse_uuid(&aspect_text, "questions.aspect_uuid")?,
        local_id: LocalId::new(row.get::<_, String>("local_id")?),
        text: LocalizedText {
            de: row.get("question_de")?,
            fr: row.get("question_fr")?,
            it: row.get("question_it")?,
        },
        answer_options,
        created_at: row.get("created_at")?,
        lifecycle: Lifecycle::from_deleted_at(row.get("deleted_at")?),
    })
}

fn parse_help_item_row(row: &Row<'_>) -> RepoResult<HelpItem> {
    let uuid_text: String = row.get("uuid")?;
    let question_text: String = row.get("question_uuid")?;
    Ok(HelpItem {
        uuid: parse_uuid(&uuid_text, "help_items.uuid")?,
        question_uuid: parse_uuid(&question_text, "help_items.question_uuid")?,
        local_id: LocalId::new(row.get::<_, String>("local_id")?),
        text: LocalizedText {
            de: row.get("help_de")?,
            fr: row.get("help_fr")?,
            it: row.get("help_it")?,
        },
        severity: row.get("severity")?,
        created_at: row.get("created_at")?,
        lifecycle: Lifecycle::from_deleted_at(row.get("deleted_at")?),
    })
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_content_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
