use crate::pipeline::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Reason a loader operation did not complete.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("consolidated file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("failed to read workbook {}: {source}", path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook {} has no sheets", .0.display())]
    NoSheets(PathBuf),

    #[error("table {0} already exists")]
    TableExists(String),

    #[error("table {0} does not exist")]
    TableMissing(String),

    #[error("table {0} has no rows")]
    EmptySource(String),

    #[error("input has no column for {0}")]
    MissingColumn(&'static str),

    #[error("input has more than one column for {0}")]
    DuplicateColumn(&'static str),

    #[error("input has unrecognized column {0:?}")]
    UnknownColumn(String),

    #[error("line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("statement failed: {0}")]
    Statement(#[from] sqlx::Error),
}

impl PipelineError {
    /// Turn a `duplicate_table` failure into `TableExists`.
    pub fn from_create(error: sqlx::Error, table: &str) -> Self {
        if let sqlx::Error::Database(db) = &error {
            if db.code().as_deref() == Some("42P07") {
                return PipelineError::TableExists(table.to_string());
            }
        }
        PipelineError::Statement(error)
    }
}

/// A pipeline stage failure, tagged with the stage that failed.
#[derive(Debug, Error)]
#[error("stage {stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}
