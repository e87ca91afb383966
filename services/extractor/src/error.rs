use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while extracting or consolidating yearly blocks.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected payload: {0}")]
    Payload(String),

    #[error("payload has no header row")]
    EmptyPayload,

    #[error("failed to write workbook: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("failed to read workbook: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("workbook {} has no sheets", .0.display())]
    NoSheets(PathBuf),

    #[error("cell at row {row}, column {col} is outside the sheet")]
    CellOutOfRange { row: usize, col: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("header of {} does not match: expected {expected:?}, found {found:?}", path.display())]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("no yearly files found for {first_year}..{until_year}")]
    NothingToConsolidate { first_year: i32, until_year: i32 },
}
