use crate::sql::qualified;
use anyhow::{Context, Result};
use sqlx::postgres::PgConnectOptions;
use std::path::PathBuf;
use std::str::FromStr;

/// External table holding municipality polygons.
#[derive(Debug, Clone)]
pub struct BoundaryTable {
    pub table: String,
    pub code_column: String,
    pub name_column: String,
    pub geometry_column: String,
}

/// Everything the loader needs, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub connect_options: PgConnectOptions,
    pub schema: String,
    pub destination_table: String,
    pub map_table: String,
    pub boundary: BoundaryTable,
    pub data_dir: PathBuf,
    pub consolidated_file: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `DB_URL` wins over the individual `DB_*` parts.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let connect_options = match get("DB_URL") {
            Some(url) => PgConnectOptions::from_str(&url).context("DB_URL is not a valid URL")?,
            None => {
                let port: u16 = or("DB_PORT", "5432")
                    .parse()
                    .context("DB_PORT must be a port number")?;
                let mut options = PgConnectOptions::new()
                    .host(&get("DB_HOST").context("DB_HOST env var missing")?)
                    .port(port)
                    .database(&get("DB_NAME").context("DB_NAME env var missing")?)
                    .username(&get("DB_USER").context("DB_USER env var missing")?);
                if let Some(password) = get("DB_PASSWORD") {
                    options = options.password(&password);
                }
                options
            }
        };

        Ok(Self {
            connect_options,
            schema: or("DB_SCHEMA", "gisadmin"),
            destination_table: or("PPM_TABLE", "dados_ppm_producao_origem_animal"),
            map_table: or("PPM_MAP_TABLE", "mapa_ppm_producao_origem_animal"),
            boundary: BoundaryTable {
                table: or("BOUNDARY_TABLE", "ro_municipios_2022"),
                code_column: or("BOUNDARY_CODE_COLUMN", "cd_mun"),
                name_column: or("BOUNDARY_NAME_COLUMN", "nm_mun"),
                geometry_column: or("BOUNDARY_GEOMETRY_COLUMN", "shape"),
            },
            data_dir: PathBuf::from(or("DATA_DIR", "./files")),
            consolidated_file: or(
                "CONSOLIDATED_FILE",
                "PPM_RO_PRODUCAO_ORIGEM_ANIMAL_FINAL.xlsx",
            ),
        })
    }

    pub fn destination(&self) -> String {
        qualified(&self.schema, &self.destination_table)
    }

    pub fn map(&self) -> String {
        qualified(&self.schema, &self.map_table)
    }

    pub fn boundary(&self) -> String {
        qualified(&self.schema, &self.boundary.table)
    }

    pub fn consolidated_path(&self) -> PathBuf {
        self.data_dir.join(&self.consolidated_file)
    }
}
