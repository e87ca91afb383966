//! Header renaming and missing-value normalization.
//!
//! Cells are kept as text; interpreting them as numbers is left to the loader.

use crate::fields::{Field, MISSING_VALUE_TOKENS};

/// Rectangular input as read from the consolidated workbook.
/// `None` is an empty cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Field(Field),
    /// Header with no canonical name; carried through untouched.
    Other(String),
}

impl Column {
    pub fn name(&self) -> &str {
        match self {
            Column::Field(field) => field.column_name(),
            Column::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformedTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Option<String>>>,
}

pub fn rename_header(header: String) -> Column {
    match Field::from_source_header(&header) {
        Some(field) => Column::Field(field),
        None => Column::Other(header),
    }
}

pub fn is_missing_marker(cell: &str) -> bool {
    MISSING_VALUE_TOKENS.contains(&cell)
}

/// Rename headers, then null out missing-value tokens in the nullable fields.
pub fn transform(raw: RawTable) -> TransformedTable {
    let columns: Vec<Column> = raw.headers.into_iter().map(rename_header).collect();

    let nullable: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, column)| matches!(column, Column::Field(f) if f.accepts_missing_marker()))
        .map(|(i, _)| i)
        .collect();

    let rows = raw
        .rows
        .into_iter()
        .map(|mut row| {
            for &i in &nullable {
                if let Some(cell) = row.get_mut(i) {
                    if cell.as_deref().is_some_and(is_missing_marker) {
                        *cell = None;
                    }
                }
            }
            row
        })
        .collect();

    TransformedTable { columns, rows }
}
