use chrono::Utc;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::features::extract_features;
use crate::history::{HistoryAggregator, HistoryFilter, HistoryView, Prediction, DEFAULT_HISTORY_LIMIT};
use crate::metrics::{MatrixBreakdown, MetricsAggregator, ModelMetrics};
use crate::registry::{ModelId, ModelRegistry};
use crate::scoring::{classify, ComparisonEntry, ModelComparator, ScoringPolicy};
use crate::store::PredictionStore;
use crate::ContentItem;

/// Random source for one request: seeded when configured, otherwise fresh
/// entropy. Each caller owns its own source.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub prediction: Prediction,
    /// Set when the history append failed. The prediction is still valid.
    pub persist_error: Option<EngineError>,
}

impl PredictionOutcome {
    pub fn persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

pub struct ViralityEngine<S> {
    policy: ScoringPolicy,
    comparator: ModelComparator,
    store: S,
    history_limit: usize,
}

impl<S: PredictionStore> ViralityEngine<S> {
    pub fn new(registry: ModelRegistry, store: S) -> Self {
        Self {
            policy: ScoringPolicy::new(registry),
            comparator: ModelComparator::new(),
            store,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &ModelRegistry {
        self.policy.registry()
    }

    /// Pure scoring: no I/O, only the injected random source.
    pub fn score<R: Rng + ?Sized>(
        &self,
        content: &ContentItem,
        model: ModelId,
        rng: &mut R,
    ) -> Result<Prediction> {
        let features = extract_features(content, rng);
        let virality_score = self.policy.score(&features, model, rng)?;
        Ok(Prediction {
            id: Uuid::new_v4().to_string(),
            content: content.clone(),
            predicted_class: classify(virality_score).into(),
            virality_score,
            model_used: model,
            features,
            created_at: Utc::now(),
        })
    }

    /// Appends a scored prediction to history. A store failure is reported
    /// on the outcome and never discards the prediction.
    pub async fn record(&self, prediction: Prediction) -> PredictionOutcome {
        match self.store.insert(&prediction).await {
            Ok(id) => {
                info!(
                    id = %id,
                    model = prediction.model_used.slug(),
                    score = prediction.virality_score,
                    "prediction stored"
                );
                PredictionOutcome {
                    prediction,
                    persist_error: None,
                }
            }
            Err(err) => {
                warn!(id = %prediction.id, "failed to store prediction: {}", err);
                PredictionOutcome {
                    prediction,
                    persist_error: Some(err),
                }
            }
        }
    }

    pub async fn predict<R: Rng + ?Sized>(
        &self,
        content: &ContentItem,
        model: ModelId,
        rng: &mut R,
    ) -> Result<PredictionOutcome> {
        let prediction = self.score(content, model, rng)?;
        Ok(self.record(prediction).await)
    }

    /// Roster ordered by descending accuracy, as served by the store.
    pub async fn roster(&self) -> Result<Vec<ModelMetrics>> {
        self.store.list_model_metrics().await
    }

    pub async fn compare<R: Rng + ?Sized>(
        &self,
        content: &ContentItem,
        rng: &mut R,
    ) -> Result<Vec<ComparisonEntry>> {
        let roster = self.roster().await?;
        Ok(self.comparator.compare(content, &roster, rng))
    }

    pub async fn history(&self, filter: &HistoryFilter) -> Result<HistoryView> {
        self.history_with_limit(filter, self.history_limit).await
    }

    pub async fn history_with_limit(&self, filter: &HistoryFilter, limit: usize) -> Result<HistoryView> {
        let predictions = self.store.list_predictions(limit).await?;
        Ok(HistoryAggregator::view(&predictions, filter))
    }

    /// Looks a model up by its stored name, falling back to registry aliases
    /// (`"svm"` finds a record named "Support Vector Machine (SVM)").
    pub async fn metrics_for(&self, name: &str) -> Result<(ModelMetrics, MatrixBreakdown)> {
        let roster = self.roster().await?;
        let alias = ModelId::from_str(name).ok();
        let found = roster
            .into_iter()
            .find(|model| {
                model.model_name.eq_ignore_ascii_case(name.trim())
                    || alias.map_or(false, |id| {
                        ModelId::from_str(&model.model_name).map_or(false, |other| other == id)
                    })
            })
            .ok_or_else(|| EngineError::UnknownModel(name.trim().to_string()))?;
        let breakdown = MetricsAggregator::breakdown(&found)?;
        Ok((found, breakdown))
    }
}
