//! Loader Service - Loads consolidated PPM statistics into PostGIS
//!
//! Responsibilities:
//! - Create the destination table if absent
//! - Rename source headers and null out missing-value tokens
//! - Append rows in one transaction per run
//! - Rebuild the map table by joining against municipality boundaries
//! - Reset the destination table between full reloads

pub mod config;
pub mod error;
pub mod fields;
pub mod load;
pub mod pipeline;
pub mod schema;
pub mod spatial;
pub mod sql;
pub mod transform;
pub mod workbook;
