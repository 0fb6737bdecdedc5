//! Batch classification contract.
//!
//! Inference itself runs in an external backend. This module only shapes the
//! request, checks the structural invariants of the response (row count,
//! confidence range) and carries the backend's binary labels through as-is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::BatchConfig;
use crate::error::{EngineError, Result};
use crate::registry::ModelId;
use crate::scoring::BinaryLabel;

pub type Row = Map<String, Value>;

/// Columns the backend models were trained on. Informational only.
pub const EXPECTED_COLUMNS: [&str; 18] = [
    "platform",
    "content_type",
    "topic",
    "language",
    "region",
    "views",
    "likes",
    "comments",
    "shares",
    "engagement_rate",
    "sentiment_score",
    "hour",
    "dayofweek",
    "month",
    "is_weekend",
    "num_hashtags",
    "hashtags_len",
    "has_trending",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub model_name: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvPredictionRow {
    pub row_index: usize,
    pub prediction: BinaryLabel,
    pub confidence: f64,
    pub data: Row,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub model: String,
    pub results: Vec<CsvPredictionRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub model: String,
    pub rows: usize,
    pub viral: usize,
    pub not_viral: usize,
    pub mean_confidence: f64,
}

impl BatchResponse {
    pub fn summary(&self) -> BatchSummary {
        let viral = self
            .results
            .iter()
            .filter(|row| row.prediction.is_viral())
            .count();
        let mean_confidence = if self.results.is_empty() {
            0.0
        } else {
            self.results.iter().map(|row| row.confidence).sum::<f64>() / self.results.len() as f64
        };
        BatchSummary {
            model: self.model.clone(),
            rows: self.results.len(),
            viral,
            not_viral: self.results.len() - viral,
            mean_confidence,
        }
    }
}

#[async_trait]
pub trait BatchBackend: Send + Sync {
    async fn predict(&self, request: &BatchRequest) -> Result<BatchResponse>;
}

pub struct BatchPredictor<B> {
    backend: B,
}

impl<B: BatchBackend> BatchPredictor<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Sends every row to the backend with a single model. The response
    /// order is authoritative; any structural violation aborts the batch.
    pub async fn predict(&self, model: ModelId, rows: Vec<Row>) -> Result<BatchResponse> {
        let missing = missing_expected_columns(&rows);
        if !missing.is_empty() {
            debug!(?missing, "batch rows lack expected columns");
        }

        let expected = rows.len();
        let request = BatchRequest {
            model_name: model.slug().to_string(),
            rows,
        };
        let response = self.backend.predict(&request).await?;
        validate_response(expected, &response)?;

        let summary = response.summary();
        info!(
            model = %summary.model,
            rows = summary.rows,
            viral = summary.viral,
            "batch prediction complete"
        );
        Ok(response)
    }
}

pub fn validate_response(expected_rows: usize, response: &BatchResponse) -> Result<()> {
    if response.results.len() != expected_rows {
        return Err(EngineError::MismatchedRowCount {
            expected: expected_rows,
            actual: response.results.len(),
        });
    }

    for (position, row) in response.results.iter().enumerate() {
        if !(0.0..=1.0).contains(&row.confidence) {
            return Err(EngineError::InvalidConfidence {
                row_index: row.row_index,
                confidence: row.confidence,
            });
        }
        if row.row_index != position {
            warn!(
                position,
                row_index = row.row_index,
                "batch row index differs from its position"
            );
        }
    }

    Ok(())
}

/// Expected columns present in none of the rows.
pub fn missing_expected_columns(rows: &[Row]) -> Vec<&'static str> {
    let present: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();
    EXPECTED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !present.contains(column))
        .collect()
}

pub fn read_csv_rows<R: io::Read>(reader: R) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|err| EngineError::InvalidInput(format!("failed to read csv header: {}", err)))?
        .clone();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|err| {
            EngineError::InvalidInput(format!("failed to read csv row {}: {}", line, err))
        })?;
        // Short rows are allowed; extra cells would have no column name.
        if record.len() > headers.len() {
            return Err(EngineError::InvalidInput(format!(
                "csv row {} has {} cells but the header has {} columns",
                line + 1,
                record.len(),
                headers.len()
            )));
        }
        let mut row = Map::new();
        for (column, cell) in headers.iter().zip(record.iter()) {
            row.insert(column.to_string(), parse_cell(cell));
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn read_csv_path(path: &Path) -> Result<Vec<Row>> {
    let file = std::fs::File::open(path).map_err(|err| {
        EngineError::InvalidInput(format!("failed to open {}: {}", path.display(), err))
    })?;
    read_csv_rows(file)
}

fn parse_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(value) = cell.parse::<i64>() {
        return Value::Number(value.into());
    }
    if let Some(number) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    match cell.to_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

#[derive(Clone)]
pub struct HttpBatchBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpBatchBackend {
    pub fn from_config(config: &BatchConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        HttpBatchBackend::new(config.endpoint.clone(), timeout)
    }

    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| EngineError::Backend(format!("failed to build batch client: {}", err)))?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl BatchBackend for HttpBatchBackend {
    async fn predict(&self, request: &BatchRequest) -> Result<BatchResponse> {
        let url = format!("{}/predict/batch", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| EngineError::Backend(format!("batch request failed: {}", err)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Backend(format!("backend error {}: {}", status, body)));
        }

        response
            .json::<BatchResponse>()
            .await
            .map_err(|err| EngineError::Backend(format!("batch response parse failed: {}", err)))
    }
}
