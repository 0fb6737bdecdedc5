use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{EngineError, Result};
use crate::history::Prediction;
use crate::metrics::{MetricsAggregator, ModelMetrics};

const PREDICTIONS_FILE: &str = "predictions.json";
const METRICS_FILE: &str = "model_metrics.json";

/// Persistence seam used by the engine. Implementations must make a single
/// `insert` atomic: either the whole record is stored or nothing is.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn insert(&self, prediction: &Prediction) -> Result<String>;

    /// Newest first, at most `limit` records.
    async fn list_predictions(&self, limit: usize) -> Result<Vec<Prediction>>;

    /// Ordered by descending accuracy.
    async fn list_model_metrics(&self) -> Result<Vec<ModelMetrics>>;
}

/// JSON-file store. Predictions are append-only; model metrics are reference
/// data written only by `replace_model_metrics` (used for seeding).
///
/// Each write and the matching in-memory update run together on a spawned
/// task, so a caller dropped mid-write cannot leave the file ahead of the
/// cached state.
pub struct JsonFileStore {
    dir: PathBuf,
    predictions: Arc<Mutex<Vec<Prediction>>>,
    metrics: Arc<Mutex<Vec<ModelMetrics>>>,
}

impl JsonFileStore {
    pub async fn open(dir: PathBuf) -> Result<Self> {
        let predictions: Vec<Prediction> = read_json(&dir.join(PREDICTIONS_FILE)).await?;
        let metrics: Vec<ModelMetrics> = read_json(&dir.join(METRICS_FILE)).await?;
        info!(
            dir = %dir.display(),
            predictions = predictions.len(),
            models = metrics.len(),
            "opened prediction store"
        );
        Ok(Self {
            dir,
            predictions: Arc::new(Mutex::new(predictions)),
            metrics: Arc::new(Mutex::new(metrics)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn replace_model_metrics(&self, roster: Vec<ModelMetrics>) -> Result<()> {
        for model in &roster {
            model.confusion_matrix.validate()?;
        }
        let metrics = Arc::clone(&self.metrics);
        let path = self.dir.join(METRICS_FILE);
        commit(async move {
            let mut guard = metrics.lock().await;
            write_json(&path, &roster).await?;
            *guard = roster;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl PredictionStore for JsonFileStore {
    async fn insert(&self, prediction: &Prediction) -> Result<String> {
        let predictions = Arc::clone(&self.predictions);
        let path = self.dir.join(PREDICTIONS_FILE);
        let record = prediction.clone();
        commit(async move {
            let mut guard = predictions.lock().await;
            let mut next = guard.clone();
            next.push(record);
            write_json(&path, &next).await?;
            *guard = next;
            Ok(())
        })
        .await?;
        Ok(prediction.id.clone())
    }

    async fn list_predictions(&self, limit: usize) -> Result<Vec<Prediction>> {
        let guard = self.predictions.lock().await;
        let mut predictions = guard.clone();
        predictions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        predictions.truncate(limit);
        Ok(predictions)
    }

    async fn list_model_metrics(&self) -> Result<Vec<ModelMetrics>> {
        let guard = self.metrics.lock().await;
        let mut roster = guard.clone();
        MetricsAggregator::leaderboard(&mut roster);
        Ok(roster)
    }
}

async fn commit<F>(write: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(write)
        .await
        .map_err(|err| unavailable(format!("store write task failed: {}", err)))?
}

async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| unavailable(format!("failed to read {}: {}", path.display(), err)))?;
    if data.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&data)
        .map_err(|err| unavailable(format!("failed to parse {}: {}", path.display(), err)))
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| unavailable(format!("failed to serialize: {}", err)))?;
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, payload)
        .await
        .map_err(|err| unavailable(format!("failed to write {}: {}", tmp_path.display(), err)))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|err| unavailable(format!("failed to finalize {}: {}", path.display(), err)))?;
    Ok(())
}

async fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|err| unavailable(format!("failed to create store dir: {}", err)))
}

fn unavailable(message: String) -> EngineError {
    EngineError::PersistenceUnavailable(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;
    use crate::metrics::ConfusionMatrix;
    use crate::registry::ModelId;
    use crate::scoring::PredictedClass;
    use crate::{ContentItem, ContentType, Platform};
    use chrono::{Duration, TimeZone, Utc};

    fn prediction(id: &str, minutes: i64, score: u8) -> Prediction {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        Prediction {
            id: id.to_string(),
            content: ContentItem::new("Hello world! \u{1F600}", Platform::Linkedin, ContentType::Text)
                .with_hashtags("#career #growth"),
            predicted_class: PredictedClass::Medium,
            virality_score: score,
            model_used: ModelId::XgBoost,
            features: FeatureVector {
                text_length: 14.0,
                hashtag_count: 2.0,
                has_emoji: 1.0,
                has_cta: 1.0,
                platform_score: 0.6123456789,
            },
            created_at: base + Duration::minutes(minutes),
        }
    }

    fn model(name: &str, accuracy: f64) -> ModelMetrics {
        ModelMetrics {
            model_name: name.to_string(),
            accuracy,
            f1_score: accuracy,
            precision_score: accuracy,
            recall_score: accuracy,
            confusion_matrix: ConfusionMatrix {
                labels: vec!["Not Viral".to_string(), "Viral".to_string()],
                matrix: vec![vec![8, 2], vec![1, 9]],
            },
            training_date: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            dataset_size: 20,
        }
    }

    #[tokio::test]
    async fn insert_then_list_round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().to_path_buf()).await.unwrap();
        let original = prediction("p1", 0, 61);
        let id = store.insert(&original).await.unwrap();
        assert_eq!(id, "p1");

        let reopened = JsonFileStore::open(dir.path().to_path_buf()).await.unwrap();
        let listed = reopened.list_predictions(10).await.unwrap();
        assert_eq!(listed, vec![original]);
    }

    #[tokio::test]
    async fn lists_newest_first_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().to_path_buf()).await.unwrap();
        store.insert(&prediction("old", 0, 30)).await.unwrap();
        store.insert(&prediction("new", 10, 40)).await.unwrap();
        store.insert(&prediction("mid", 5, 50)).await.unwrap();

        let listed = store.list_predictions(2).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn metrics_listed_by_accuracy() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().to_path_buf()).await.unwrap();
        store
            .replace_model_metrics(vec![model("SVM", 0.71), model("XGBoost", 0.9), model("KNN", 0.8)])
            .await
            .unwrap();
        let roster = store.list_model_metrics().await.unwrap();
        let names: Vec<_> = roster.iter().map(|m| m.model_name.as_str()).collect();
        assert_eq!(names, vec!["XGBoost", "KNN", "SVM"]);
    }

    #[tokio::test]
    async fn corrupt_file_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PREDICTIONS_FILE), "{not json").unwrap();
        let result = JsonFileStore::open(dir.path().to_path_buf()).await;
        assert!(matches!(result, Err(EngineError::PersistenceUnavailable(_))));
    }

    #[tokio::test]
    async fn dropped_insert_keeps_file_and_listing_in_step() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().to_path_buf()).await.unwrap();

        let first = prediction("x", 0, 40);
        let dropped = tokio::time::timeout(std::time::Duration::ZERO, store.insert(&first)).await;
        assert!(dropped.is_err());
        store.insert(&prediction("y", 5, 60)).await.unwrap();

        let mut listed = Vec::new();
        for _ in 0..200 {
            listed = store.list_predictions(10).await.unwrap();
            if listed.len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let ids: Vec<_> = listed.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec!["y", "x"]);

        let reopened = JsonFileStore::open(dir.path().to_path_buf()).await.unwrap();
        let on_disk: Vec<_> = reopened
            .list_predictions(10)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(on_disk, ids);
    }

    #[tokio::test]
    async fn failed_write_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where the store directory should be
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "").unwrap();
        let store = JsonFileStore::open(blocked).await.unwrap();

        let result = store.insert(&prediction("p1", 0, 50)).await;
        assert!(matches!(result, Err(EngineError::PersistenceUnavailable(_))));
        assert!(store.list_predictions(10).await.unwrap().is_empty());
    }
}
