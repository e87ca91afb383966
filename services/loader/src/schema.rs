//! Destination table lifecycle: create-if-absent and the destructive reset.

use crate::config::Config;
use crate::error::PipelineError;
use crate::fields::Field;
use crate::sql::table_exists;
use sqlx::PgPool;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOutcome {
    Created,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    pub truncated_rows: i64,
    pub map_dropped: bool,
}

pub fn create_destination_statement(table: &str) -> String {
    let mut columns = vec!["id SERIAL PRIMARY KEY".to_string()];
    columns.extend(
        Field::ALL
            .iter()
            .map(|f| format!("{} {}", f.column_name(), f.sql_type().ddl())),
    );
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        table,
        columns.join(",\n    ")
    )
}

pub fn truncate_statement(table: &str) -> String {
    format!("TRUNCATE TABLE {} RESTART IDENTITY", table)
}

pub fn drop_statement(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", table)
}

/// Create the destination table unless it is already there.
pub async fn ensure_schema(pool: &PgPool, config: &Config) -> Result<SchemaOutcome, PipelineError> {
    let table = config.destination();
    info!(table = %table, "checking destination table");

    let mut tx = pool.begin().await?;
    let existed = table_exists(&mut *tx, &table).await?;
    sqlx::query(&create_destination_statement(&table))
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(if existed {
        SchemaOutcome::AlreadyPresent
    } else {
        SchemaOutcome::Created
    })
}

/// Empty the destination table, restart its identity and drop the map table.
///
/// Both happen in one transaction: the map table is stale once its source is cleared.
pub async fn reset(pool: &PgPool, config: &Config) -> Result<ResetReport, PipelineError> {
    let destination = config.destination();
    let map = config.map();
    warn!(table = %destination, map = %map, "resetting destination table");

    let mut tx = pool.begin().await?;
    if !table_exists(&mut *tx, &destination).await? {
        return Err(PipelineError::TableMissing(destination));
    }
    let truncated_rows = crate::sql::row_count(&mut *tx, &destination).await?;
    let map_dropped = table_exists(&mut *tx, &map).await?;

    sqlx::query(&truncate_statement(&destination))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&drop_statement(&map)).execute(&mut *tx).await?;
    tx.commit().await?;

    Ok(ResetReport {
        truncated_rows,
        map_dropped,
    })
}
