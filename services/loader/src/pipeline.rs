//! Named stages over one database session.
//!
//! | Stage        | Requires                                          | Leaves                                  |
//! |--------------|---------------------------------------------------|-----------------------------------------|
//! | EnsureSchema | connection                                        | destination table exists                |
//! | Load         | destination exists unless input is empty          | destination grew by the input row count |
//! | SpatialJoin  | destination non-empty, boundary exists, no map    | map table rebuilt                       |
//! | Reset        | destination exists                                | destination empty, ids restart, no map  |

use crate::config::Config;
use crate::error::{PipelineError, StageError};
use crate::load::{append_rows, LoadOutcome};
use crate::schema::{self, ResetReport, SchemaOutcome};
use crate::spatial::{build_map_table, JoinReport};
use crate::transform::TransformedTable;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::fmt;
use std::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    EnsureSchema,
    Load,
    SpatialJoin,
    Reset,
}

impl Stage {
    /// Stages of a full ingestion run, in order.
    pub const RUN: [Stage; 3] = [Stage::EnsureSchema, Stage::Load, Stage::SpatialJoin];

    pub fn name(self) -> &'static str {
        match self {
            Stage::EnsureSchema => "ensure-schema",
            Stage::Load => "load",
            Stage::SpatialJoin => "spatial-join",
            Stage::Reset => "reset",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Schema(SchemaOutcome),
    Load(LoadOutcome),
    Join(JoinReport),
    Reset(ResetReport),
}

/// A single-connection session against the destination database.
pub struct Pipeline<'a> {
    config: &'a Config,
    pool: PgPool,
}

impl<'a> Pipeline<'a> {
    pub async fn connect(config: &'a Config) -> Result<Self, PipelineError> {
        info!("connecting to database");
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(config.connect_options.clone())
            .await
            .map_err(PipelineError::Connect)?;
        info!("database connected");

        Ok(Self { config, pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<SchemaOutcome, PipelineError> {
        let outcome = schema::ensure_schema(&self.pool, self.config)
            .instrument(info_span!("stage", name = %Stage::EnsureSchema))
            .await?;
        info!(?outcome, table = %self.config.destination(), "destination table checked");
        Ok(outcome)
    }

    pub async fn load(&self, table: &TransformedTable) -> Result<LoadOutcome, PipelineError> {
        let destination = self.config.destination();
        let outcome = append_rows(&self.pool, &destination, table)
            .instrument(info_span!("stage", name = %Stage::Load))
            .await?;
        info!(?outcome, table = %destination, "load finished");
        Ok(outcome)
    }

    pub async fn spatial_join(&self, replace: bool) -> Result<JoinReport, PipelineError> {
        let report = build_map_table(&self.pool, self.config, replace)
            .instrument(info_span!("stage", name = %Stage::SpatialJoin))
            .await?;
        info!(
            map_rows = report.map_rows,
            excluded = report.excluded(),
            table = %self.config.map(),
            "map table created"
        );
        Ok(report)
    }

    pub async fn reset(&self) -> Result<ResetReport, PipelineError> {
        let report = schema::reset(&self.pool, self.config)
            .instrument(info_span!("stage", name = %Stage::Reset))
            .await?;
        info!(
            truncated_rows = report.truncated_rows,
            map_dropped = report.map_dropped,
            "destination table reset"
        );
        Ok(report)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        table: &TransformedTable,
        replace_map: bool,
    ) -> Result<StageOutcome, PipelineError> {
        match stage {
            Stage::EnsureSchema => self.ensure_schema().await.map(StageOutcome::Schema),
            Stage::Load => self.load(table).await.map(StageOutcome::Load),
            Stage::SpatialJoin => self.spatial_join(replace_map).await.map(StageOutcome::Join),
            Stage::Reset => self.reset().await.map(StageOutcome::Reset),
        }
    }

    /// EnsureSchema, Load, SpatialJoin; stops at the first failed stage.
    ///
    /// The spatial join is skipped when the load had no rows.
    pub async fn run(
        &self,
        table: &TransformedTable,
        replace_map: bool,
    ) -> Result<Vec<StageOutcome>, StageError> {
        let mut outcomes = Vec::with_capacity(Stage::RUN.len());
        for stage in Stage::RUN {
            if stage == Stage::SpatialJoin
                && outcomes.contains(&StageOutcome::Load(LoadOutcome::NoRows))
            {
                info!("nothing loaded, map table left as is");
                break;
            }
            let outcome = self
                .run_stage(stage, table, replace_map)
                .await
                .map_err(|source| StageError { stage, source })?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Release the connection. Call on every exit path.
    pub async fn close(self) {
        self.pool.close().await;
        info!("database connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_order() {
        assert_eq!(
            Stage::RUN,
            [Stage::EnsureSchema, Stage::Load, Stage::SpatialJoin]
        );
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::EnsureSchema.to_string(), "ensure-schema");
        assert_eq!(Stage::SpatialJoin.to_string(), "spatial-join");
        assert_eq!(Stage::Reset.name(), "reset");
    }

    #[test]
    fn test_stage_error_message() {
        let err = StageError {
            stage: Stage::SpatialJoin,
            source: PipelineError::TableExists("\"gisadmin\".\"mapa\"".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "stage spatial-join failed: table \"gisadmin\".\"mapa\" already exists"
        );
    }
}
