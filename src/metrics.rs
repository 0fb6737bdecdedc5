//! Evaluation metrics for trained models.
//!
//! `ModelMetrics` is read-only reference data. The scalar metrics it carries
//! are authoritative and are never recomputed from the confusion matrix; the
//! matrix may come from a different evaluation slice. `MetricsAggregator`
//! only derives per-cell percentages and display bands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::registry::ModelId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    /// Indexed `[actual][predicted]`.
    pub matrix: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    pub fn new(labels: Vec<String>, matrix: Vec<Vec<u64>>) -> Result<Self> {
        let confusion = Self { labels, matrix };
        confusion.validate()?;
        Ok(confusion)
    }

    pub fn size(&self) -> usize {
        self.matrix.len()
    }

    pub fn validate(&self) -> Result<()> {
        let k = self.matrix.len();
        if self.labels.len() != k {
            return Err(EngineError::InvalidMatrix(format!(
                "{} labels for {} rows",
                self.labels.len(),
                k
            )));
        }
        if let Some((row, values)) = self
            .matrix
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != k)
        {
            return Err(EngineError::InvalidMatrix(format!(
                "row {} has {} columns, expected {}",
                row,
                values.len(),
                k
            )));
        }
        Ok(())
    }

    pub fn label(&self, index: usize) -> &str {
        self.labels.get(index).map(String::as_str).unwrap_or("?")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub model_name: String,
    pub accuracy: f64,
    pub f1_score: f64,
    pub precision_score: f64,
    pub recall_score: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub training_date: DateTime<Utc>,
    pub dataset_size: u64,
}

/// Coarse quality band for a scalar metric in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl MetricBand {
    pub fn from_value(value: f64) -> Self {
        if value >= 0.85 {
            MetricBand::Excellent
        } else if value >= 0.75 {
            MetricBand::Good
        } else if value >= 0.65 {
            MetricBand::Fair
        } else {
            MetricBand::Poor
        }
    }
}

/// Misclassification intensity relative to the largest cell in the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellIntensity {
    Strong,
    Moderate,
    Weak,
    Faint,
}

impl CellIntensity {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 0.8 {
            CellIntensity::Strong
        } else if ratio >= 0.5 {
            CellIntensity::Moderate
        } else if ratio >= 0.2 {
            CellIntensity::Weak
        } else {
            CellIntensity::Faint
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellView {
    pub count: u64,
    /// Share of the actual class's samples; `None` when the class has none.
    pub percentage: Option<f64>,
    pub diagonal: bool,
    /// Set for off-diagonal cells only.
    pub intensity: Option<CellIntensity>,
}

impl CellView {
    pub fn percentage_label(&self) -> String {
        match self.percentage {
            Some(value) => format!("{:.0}%", value * 100.0),
            None => "n/a".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricBands {
    pub accuracy: MetricBand,
    pub f1_score: MetricBand,
    pub precision_score: MetricBand,
    pub recall_score: MetricBand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixBreakdown {
    pub model_name: String,
    pub labels: Vec<String>,
    pub row_totals: Vec<u64>,
    pub cells: Vec<Vec<CellView>>,
    pub max_cell: u64,
    pub bands: MetricBands,
    #[serde(serialize_with = "serialize_warnings")]
    pub warnings: Vec<EngineError>,
}

fn serialize_warnings<S>(warnings: &[EngineError], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(warnings.iter().map(|warning| warning.to_string()))
}

pub struct MetricsAggregator;

impl MetricsAggregator {
    pub fn row_total(matrix: &ConfusionMatrix, row: usize) -> u64 {
        matrix
            .matrix
            .get(row)
            .map(|values| values.iter().sum())
            .unwrap_or(0)
    }

    pub fn row_totals(matrix: &ConfusionMatrix) -> Vec<u64> {
        (0..matrix.size())
            .map(|row| Self::row_total(matrix, row))
            .collect()
    }

    pub fn cell_percentage(matrix: &ConfusionMatrix, row: usize, col: usize) -> Result<f64> {
        let value = matrix
            .matrix
            .get(row)
            .and_then(|values| values.get(col))
            .copied()
            .ok_or_else(|| {
                EngineError::InvalidMatrix(format!("cell ({}, {}) out of bounds", row, col))
            })?;
        let total = Self::row_total(matrix, row);
        if total == 0 {
            return Err(EngineError::DivideByZeroClass {
                label: matrix.label(row).to_string(),
            });
        }
        Ok(value as f64 / total as f64)
    }

    pub fn max_cell(matrix: &ConfusionMatrix) -> u64 {
        matrix
            .matrix
            .iter()
            .flat_map(|values| values.iter().copied())
            .max()
            .unwrap_or(0)
    }

    /// Derives the display breakdown. Empty classes do not fail the call;
    /// they surface as `DivideByZeroClass` warnings with `n/a` percentages.
    pub fn breakdown(metrics: &ModelMetrics) -> Result<MatrixBreakdown> {
        let matrix = &metrics.confusion_matrix;
        matrix.validate()?;

        let row_totals = Self::row_totals(matrix);
        let max_cell = Self::max_cell(matrix);
        let mut warnings = Vec::new();
        let mut cells = Vec::with_capacity(matrix.size());

        for (row, values) in matrix.matrix.iter().enumerate() {
            let mut row_cells = Vec::with_capacity(values.len());
            for (col, &count) in values.iter().enumerate() {
                let percentage = match Self::cell_percentage(matrix, row, col) {
                    Ok(value) => Some(value),
                    Err(err @ EngineError::DivideByZeroClass { .. }) => {
                        if col == 0 {
                            warn!(model = %metrics.model_name, "{}", err);
                            warnings.push(err);
                        }
                        None
                    }
                    Err(err) => return Err(err),
                };
                let diagonal = row == col;
                let intensity = if diagonal {
                    None
                } else {
                    Some(CellIntensity::from_ratio(ratio(count, max_cell)))
                };
                row_cells.push(CellView {
                    count,
                    percentage,
                    diagonal,
                    intensity,
                });
            }
            cells.push(row_cells);
        }

        Ok(MatrixBreakdown {
            model_name: metrics.model_name.clone(),
            labels: matrix.labels.clone(),
            row_totals,
            cells,
            max_cell,
            bands: MetricBands {
                accuracy: MetricBand::from_value(metrics.accuracy),
                f1_score: MetricBand::from_value(metrics.f1_score),
                precision_score: MetricBand::from_value(metrics.precision_score),
                recall_score: MetricBand::from_value(metrics.recall_score),
            },
            warnings,
        })
    }

    /// Sorts a roster by descending accuracy; ties keep their input order.
    pub fn leaderboard(roster: &mut [ModelMetrics]) {
        roster.sort_by(|a, b| {
            b.accuracy
                .partial_cmp(&a.accuracy)
                .unwrap_or(Ordering::Equal)
        });
    }
}

/// Reference roster used to seed an empty store.
pub fn sample_roster(training_date: DateTime<Utc>) -> Vec<ModelMetrics> {
    // (model, accuracy, f1, precision, recall, [[tn, fp], [fn, tp]])
    let rows: [(ModelId, f64, f64, f64, f64, [[u64; 2]; 2]); 9] = [
        (ModelId::XgBoost, 0.89, 0.87, 0.88, 0.86, [[452, 48], [62, 438]]),
        (ModelId::RandomForest, 0.87, 0.85, 0.86, 0.84, [[441, 59], [71, 429]]),
        (ModelId::NeuralNetwork, 0.86, 0.84, 0.85, 0.83, [[437, 63], [77, 423]]),
        (ModelId::Mlp, 0.84, 0.82, 0.83, 0.81, [[428, 72], [88, 412]]),
        (ModelId::Svm, 0.82, 0.80, 0.81, 0.79, [[419, 81], [99, 401]]),
        (ModelId::LogisticRegression, 0.79, 0.77, 0.78, 0.76, [[404, 96], [114, 386]]),
        (ModelId::DecisionTree, 0.76, 0.74, 0.75, 0.73, [[389, 111], [129, 371]]),
        (ModelId::Knn, 0.74, 0.72, 0.73, 0.71, [[379, 121], [139, 361]]),
        (ModelId::NaiveBayes, 0.68, 0.66, 0.67, 0.65, [[349, 151], [169, 331]]),
    ];

    rows.into_iter()
        .map(|(model, accuracy, f1_score, precision_score, recall_score, matrix)| ModelMetrics {
            model_name: model.label().to_string(),
            accuracy,
            f1_score,
            precision_score,
            recall_score,
            confusion_matrix: ConfusionMatrix {
                labels: vec!["Not Viral".to_string(), "Viral".to_string()],
                matrix: matrix.iter().map(|row| row.to_vec()).collect(),
            },
            training_date,
            dataset_size: 5_000,
        })
        .collect()
}

fn ratio(value: u64, max: u64) -> f64 {
    if max == 0 {
        0.0
    } else {
        value as f64 / max as f64
    }
}
