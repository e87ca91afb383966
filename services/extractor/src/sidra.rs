//! SIDRA values API client and payload handling.
//!
//! The API answers with a JSON array of flat objects. The first object
//! carries the human-readable column labels (e.g. `"V": "Valor"`), every
//! following object is one observation keyed by the same short codes.

use crate::error::ExtractError;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://apisidra.ibge.gov.br/values";

/// Rectangular block of text cells under a single header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Promote the first payload row to the header and keep the rest as data.
    ///
    /// Column order follows the key order of the header object.
    pub fn from_payload(payload: Vec<Map<String, Value>>) -> Result<Self, ExtractError> {
        let mut objects = payload.into_iter();
        let header_row = objects.next().ok_or(ExtractError::EmptyPayload)?;

        let keys: Vec<String> = header_row.keys().cloned().collect();
        let headers = header_row.values().map(cell_text).collect();

        let rows = objects
            .map(|object| {
                keys.iter()
                    .map(|key| object.get(key).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();

        Ok(Self { headers, rows })
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parameters of one `/values` request.
#[derive(Debug, Clone, PartialEq)]
pub struct SidraQuery {
    pub table_code: String,
    pub territorial_level: String,
    pub territorial_codes: Vec<String>,
    pub period: String,
    pub variable: String,
    /// (classification code, comma-joined category codes)
    pub classifications: Vec<(String, String)>,
}

impl SidraQuery {
    pub fn path(&self) -> String {
        let mut path = format!(
            "/t/{}/n{}/{}/v/{}/p/{}",
            self.table_code,
            self.territorial_level,
            self.territorial_codes.join(","),
            self.variable,
            self.period
        );
        for (classification, categories) in &self.classifications {
            path.push_str(&format!("/c{}/{}", classification, categories));
        }
        path
    }
}

/// Anything that can answer a yearly query with a table.
pub trait StatisticsSource {
    async fn fetch(&self, query: &SidraQuery) -> Result<Table, ExtractError>;
}

pub struct SidraClient {
    client: reqwest::Client,
    base_url: String,
}

impl SidraClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent("ppm-etl/0.1 (extractor)")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl StatisticsSource for SidraClient {
    async fn fetch(&self, query: &SidraQuery) -> Result<Table, ExtractError> {
        let url = format!("{}{}", self.base_url, query.path());
        debug!(%url, "fetching");

        let payload: Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let objects = match payload {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(ExtractError::Payload(format!(
                        "expected an object per row, found {}",
                        other
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(ExtractError::Payload(format!(
                    "expected a JSON array, found {}",
                    other
                )))
            }
        };

        Table::from_payload(objects)
    }
}
