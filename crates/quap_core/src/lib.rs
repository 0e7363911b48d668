//! Questionnaire content import core.
//!
//! Reconciles an externally produced questionnaire document against the
//! persisted content tree (questionnaire, aspect, question, help item) so that
//! repeated imports converge without duplicating or losing history.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod source;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, ImportConfig};
pub use logging::{
    default_log_level, flush_logging, init_logging, logging_status, LoggingError,
};
pub use model::content::{
    Aspect, HelpItem, LocalId, LocalizedText, NodeId, NodeKind, Question, Questionnaire,
    QuestionnaireId,
};
pub use model::lifecycle::{EpochMs, Lifecycle};
pub use repo::content_repo::{
    ContentRepository, RepoError, RepoResult, SqliteContentRepository,
};
pub use service::import_service::{run_import, ImportError, ImportResult, ImportService};
pub use service::summary::{ImportSummary, LevelCounts};
pub use source::record::{AspectRecord, HelpRecord, QuestionRecord, QuestionnaireRecord};
pub use source::stream::{QuestionnaireStream, StreamError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
