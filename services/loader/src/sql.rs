use sqlx::PgExecutor;

/// Quote an identifier for interpolation into a statement.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `"schema"."table"`
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Whether a (quoted, qualified) relation name resolves in the current database.
pub async fn table_exists<'e, E>(executor: E, table: &str) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
        .bind(table)
        .fetch_one(executor)
        .await
}

pub async fn row_count<'e, E>(executor: E, table: &str) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT count(*) FROM {}", table);
    sqlx::query_scalar(&sql).fetch_one(executor)
        .await
}
