//! Map table: production rows joined to municipality boundaries.

use crate::config::Config;
use crate::error::PipelineError;
use crate::fields::Field;
use crate::sql::{quote_ident, row_count, table_exists};
use sqlx::PgPool;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinReport {
    pub source_rows: u64,
    pub map_rows: u64,
}

impl JoinReport {
    /// Rows whose municipality code has no boundary.
    pub fn excluded(&self) -> u64 {
        self.source_rows.saturating_sub(self.map_rows)
    }
}

pub fn create_map_statement(config: &Config) -> String {
    let boundary = &config.boundary;
    let columns: Vec<String> = Field::ALL
        .iter()
        .map(|f| format!("dp.{}", f.column_name()))
        .collect();

    format!(
        "CREATE TABLE {map} AS\n\
         SELECT\n    {columns},\n    rm.{name} AS nm_mun,\n    rm.{geometry} AS geom\n\
         FROM {destination} AS dp\n\
         INNER JOIN {boundary_table} AS rm\n    \
         ON CAST(dp.municipio_codigo AS VARCHAR) = rm.{code}",
        map = config.map(),
        columns = columns.join(",\n    "),
        name = quote_ident(&boundary.name_column),
        geometry = quote_ident(&boundary.geometry_column),
        destination = config.destination(),
        boundary_table = config.boundary(),
        code = quote_ident(&boundary.code_column),
    )
}

pub fn add_identity_statement(map: &str) -> String {
    format!("ALTER TABLE {} ADD COLUMN id SERIAL PRIMARY KEY", map)
}

/// Build the map table from scratch.
///
/// Fails with `TableExists` if the map table is already there, unless `replace`
/// is set, in which case it is dropped first inside the same transaction.
pub async fn build_map_table(
    pool: &PgPool,
    config: &Config,
    replace: bool,
) -> Result<JoinReport, PipelineError> {
    let destination = config.destination();
    let boundary = config.boundary();
    let map = config.map();

    let mut tx = pool.begin().await?;

    if !table_exists(&mut *tx, &destination).await? {
        return Err(PipelineError::TableMissing(destination));
    }
    if !table_exists(&mut *tx, &boundary).await? {
        return Err(PipelineError::TableMissing(boundary));
    }
    let source_rows = row_count(&mut *tx, &destination).await?;
    if source_rows == 0 {
        return Err(PipelineError::EmptySource(destination));
    }

    if table_exists(&mut *tx, &map).await? {
        if !replace {
            return Err(PipelineError::TableExists(map));
        }
        warn!(table = %map, "replacing existing map table");
        sqlx::query(&crate::schema::drop_statement(&map))
            .execute(&mut *tx)
            .await?;
    }

    info!(table = %map, source = %destination, boundary = %boundary, "creating map table");
    sqlx::query(&create_map_statement(config))
        .execute(&mut *tx)
        .await
        .map_err(|e| PipelineError::from_create(e, &map))?;
    sqlx::query(&add_identity_statement(&map))
        .execute(&mut *tx)
        .await?;
    let map_rows = row_count(&mut *tx, &map).await?;

    tx.commit().await?;

    Ok(JoinReport {
        source_rows: source_rows as u64,
        map_rows: map_rows as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "DB_URL" => Some("postgres://u:p@localhost/gisdb".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_map_statement_joins_on_text_code() {
        let sql = create_map_statement(&config());

        assert!(sql.starts_with(
            "CREATE TABLE \"gisadmin\".\"mapa_ppm_producao_origem_animal\" AS\nSELECT\n"
        ));
        assert!(sql.contains("FROM \"gisadmin\".\"dados_ppm_producao_origem_animal\" AS dp"));
        assert!(sql.contains("INNER JOIN \"gisadmin\".\"ro_municipios_2022\" AS rm"));
        assert!(sql.ends_with("ON CAST(dp.municipio_codigo AS VARCHAR) = rm.\"cd_mun\""));
        assert!(sql.contains("rm.\"nm_mun\" AS nm_mun,"));
        assert!(sql.contains("rm.\"shape\" AS geom"));
    }

    #[test]
    fn test_map_statement_carries_every_field() {
        let sql = create_map_statement(&config());
        for field in Field::ALL {
            assert!(
                sql.contains(&format!("dp.{},", field.column_name())),
                "missing {}",
                field.column_name()
            );
        }
        assert!(!sql.contains("dp.id"));
    }

    #[test]
    fn test_map_statement_uses_configured_boundary() {
        let mut config = config();
        config.boundary.table = "municipios".to_string();
        config.boundary.code_column = "geocodigo".to_string();
        config.boundary.geometry_column = "the_geom".to_string();

        let sql = create_map_statement(&config);

        assert!(sql.contains("INNER JOIN \"gisadmin\".\"municipios\" AS rm"));
        assert!(sql.contains("= rm.\"geocodigo\""));
        assert!(sql.contains("rm.\"the_geom\" AS geom"));
    }

    #[test]
    fn test_add_identity_statement() {
        assert_eq!(
            add_identity_statement("\"s\".\"m\""),
            "ALTER TABLE \"s\".\"m\" ADD COLUMN id SERIAL PRIMARY KEY"
        );
    }

    #[test]
    fn test_excluded_rows() {
        let report = JoinReport {
            source_rows: 10,
            map_rows: 7,
        };
        assert_eq!(report.excluded(), 3);
    }
}
