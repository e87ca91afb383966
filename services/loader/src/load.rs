//! Append transformed rows to the destination table.
//!
//! Loads are append-only: re-loading a year duplicates its rows.

use crate::error::PipelineError;
use crate::fields::Field;
use crate::sql::table_exists;
use crate::transform::{Column, TransformedTable};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use tracing::info;

/// One observation, typed for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionRecord {
    pub territorial_level_code: i32,
    pub territorial_level: String,
    pub unit_code: Option<i32>,
    pub unit: Option<String>,
    pub value: Option<f64>,
    pub municipality_code: i32,
    pub municipality: String,
    pub year_code: i32,
    pub year: i32,
    pub variable_code: i32,
    pub variable: String,
    pub product_type_code: i32,
    pub product_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Input had no data rows; nothing was written.
    NoRows,
    Appended(u64),
}

/// Position of every canonical field in the input columns.
#[derive(Debug)]
pub struct ColumnIndex([usize; Field::COUNT]);

impl ColumnIndex {
    pub fn resolve(columns: &[Column]) -> Result<Self, PipelineError> {
        let mut positions = [None; Field::COUNT];
        for (i, column) in columns.iter().enumerate() {
            match column {
                Column::Field(field) => {
                    let slot = &mut positions[field.index()];
                    if slot.is_some() {
                        return Err(PipelineError::DuplicateColumn(field.column_name()));
                    }
                    *slot = Some(i);
                }
                Column::Other(name) => return Err(PipelineError::UnknownColumn(name.clone())),
            }
        }

        let mut resolved = [0; Field::COUNT];
        for field in Field::ALL {
            resolved[field.index()] = positions[field.index()]
                .ok_or(PipelineError::MissingColumn(field.column_name()))?;
        }
        Ok(Self(resolved))
    }
}

/// Cell accessor for one input row; `line` is the 1-based sheet line for messages.
///
/// Text cells are kept as read. Whitespace is only ignored when parsing numbers.
struct RowReader<'a> {
    index: &'a ColumnIndex,
    row: &'a [Option<String>],
    line: usize,
}

impl RowReader<'_> {
    fn cell(&self, field: Field) -> Option<&str> {
        self.row
            .get(self.index.0[field.index()])
            .and_then(|cell| cell.as_deref())
    }

    fn malformed(&self, reason: String) -> PipelineError {
        PipelineError::MalformedRow {
            line: self.line,
            reason,
        }
    }

    fn text(&self, field: Field) -> Result<String, PipelineError> {
        self.cell(field)
            .map(str::to_string)
            .ok_or_else(|| self.malformed(format!("{} is empty", field.column_name())))
    }

    fn optional_text(&self, field: Field) -> Option<String> {
        self.cell(field).map(str::to_string)
    }

    fn integer(&self, field: Field) -> Result<i32, PipelineError> {
        self.optional_integer(field)?
            .ok_or_else(|| self.malformed(format!("{} is empty", field.column_name())))
    }

    fn optional_integer(&self, field: Field) -> Result<Option<i32>, PipelineError> {
        self.cell(field)
            .map(str::trim)
            .map(|s| {
                parse_integer(s).ok_or_else(|| {
                    self.malformed(format!("{} is not an integer: {:?}", field.column_name(), s))
                })
            })
            .transpose()
    }

    fn optional_decimal(&self, field: Field) -> Result<Option<f64>, PipelineError> {
        self.cell(field)
            .map(str::trim)
            .map(|s| {
                s.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(|| {
                    self.malformed(format!("{} is not a number: {:?}", field.column_name(), s))
                })
            })
            .transpose()
    }
}

/// Integers arrive either as text ("1100015") or as whole spreadsheet floats.
fn parse_integer(s: &str) -> Option<i32> {
    if let Ok(v) = s.parse::<i32>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 {
        Some(f as i32)
    } else {
        None
    }
}

impl ProductionRecord {
    pub fn from_row(
        index: &ColumnIndex,
        row: &[Option<String>],
        line: usize,
    ) -> Result<Self, PipelineError> {
        let r = RowReader { index, row, line };
        Ok(Self {
            territorial_level_code: r.integer(Field::TerritorialLevelCode)?,
            territorial_level: r.text(Field::TerritorialLevel)?,
            unit_code: r.optional_integer(Field::UnitCode)?,
            unit: r.optional_text(Field::Unit),
            value: r.optional_decimal(Field::Value)?,
            municipality_code: r.integer(Field::MunicipalityCode)?,
            municipality: r.text(Field::Municipality)?,
            year_code: r.integer(Field::YearCode)?,
            year: r.integer(Field::Year)?,
            variable_code: r.integer(Field::VariableCode)?,
            variable: r.text(Field::Variable)?,
            product_type_code: r.integer(Field::ProductTypeCode)?,
            product_type: r.text(Field::ProductType)?,
        })
    }

    /// Bind in `Field::ALL` order, matching `insert_statement`.
    fn bind<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        query
            .bind(self.territorial_level_code)
            .bind(&self.territorial_level)
            .bind(self.unit_code)
            .bind(self.unit.as_deref())
            .bind(self.value)
            .bind(self.municipality_code)
            .bind(&self.municipality)
            .bind(self.year_code)
            .bind(self.year)
            .bind(self.variable_code)
            .bind(&self.variable)
            .bind(self.product_type_code)
            .bind(&self.product_type)
    }
}

pub fn insert_statement(table: &str) -> String {
    let columns: Vec<&str> = Field::ALL.iter().map(|f| f.column_name()).collect();
    let placeholders: Vec<String> = Field::ALL
        .iter()
        .map(|f| match f.sql_type() {
            crate::fields::SqlType::Decimal => format!("${}::numeric", f.index() + 1),
            _ => format!("${}", f.index() + 1),
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Convert every row first, so a malformed row fails the batch before any write.
pub fn to_records(table: &TransformedTable) -> Result<Vec<ProductionRecord>, PipelineError> {
    let index = ColumnIndex::resolve(&table.columns)?;
    table
        .rows
        .iter()
        .enumerate()
        // +2: 1-based, header on line 1
        .map(|(i, row)| ProductionRecord::from_row(&index, row, i + 2))
        .collect()
}

/// Append all rows in a single transaction. Any failure rolls back the batch.
///
/// Empty input returns `NoRows` without touching the database.
pub async fn append_rows(
    pool: &PgPool,
    destination: &str,
    table: &TransformedTable,
) -> Result<LoadOutcome, PipelineError> {
    if table.rows.is_empty() {
        info!("no rows to load");
        return Ok(LoadOutcome::NoRows);
    }
    if !table_exists(pool, destination).await? {
        return Err(PipelineError::TableMissing(destination.to_string()));
    }

    let records = to_records(table)?;
    info!(rows = records.len(), table = destination, "rows ready to load");

    let sql = insert_statement(destination);
    let mut tx = pool.begin().await?;
    for record in &records {
        record.bind(sqlx::query(&sql)).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    Ok(LoadOutcome::Appended(records.len() as u64))
}
