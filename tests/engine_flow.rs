use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Mutex;
use trendify::metrics::sample_roster;
use trendify::store::{JsonFileStore, PredictionStore};
use trendify::{
    ContentItem, ContentType, EngineError, FeatureVector, HistoryFilter, ModelId, ModelMetrics,
    ModelRegistry, Platform, PredictedClass, Prediction, Result, ViralityEngine,
};

#[derive(Default)]
struct MemoryStore {
    predictions: Mutex<Vec<Prediction>>,
    metrics: Vec<ModelMetrics>,
}

impl MemoryStore {
    fn with_roster(metrics: Vec<ModelMetrics>) -> Self {
        Self {
            predictions: Mutex::new(Vec::new()),
            metrics,
        }
    }
}

#[async_trait]
impl PredictionStore for MemoryStore {
    async fn insert(&self, prediction: &Prediction) -> Result<String> {
        self.predictions.lock().unwrap().push(prediction.clone());
        Ok(prediction.id.clone())
    }

    async fn list_predictions(&self, limit: usize) -> Result<Vec<Prediction>> {
        let mut predictions = self.predictions.lock().unwrap().clone();
        predictions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        predictions.truncate(limit);
        Ok(predictions)
    }

    async fn list_model_metrics(&self) -> Result<Vec<ModelMetrics>> {
        let mut roster = self.metrics.clone();
        trendify::MetricsAggregator::leaderboard(&mut roster);
        Ok(roster)
    }
}

struct UnavailableStore;

#[async_trait]
impl PredictionStore for UnavailableStore {
    async fn insert(&self, _prediction: &Prediction) -> Result<String> {
        Err(EngineError::PersistenceUnavailable("disk full".to_string()))
    }

    async fn list_predictions(&self, _limit: usize) -> Result<Vec<Prediction>> {
        Err(EngineError::PersistenceUnavailable("disk full".to_string()))
    }

    async fn list_model_metrics(&self) -> Result<Vec<ModelMetrics>> {
        Err(EngineError::PersistenceUnavailable("disk full".to_string()))
    }
}

fn post() -> ContentItem {
    ContentItem::new(
        "Big news for everyone following our journey! Our new product drops tomorrow and we cannot wait for you to try it out with us",
        Platform::Instagram,
        ContentType::Image,
    )
    .with_hashtags("#launch #startup #product #news")
}

fn recorded(id: &str, minutes: i64, score: u8, class: PredictedClass) -> Prediction {
    Prediction {
        id: id.to_string(),
        content: ContentItem::new("stored post", Platform::Twitter, ContentType::Text),
        predicted_class: class,
        virality_score: score,
        model_used: ModelId::Svm,
        features: FeatureVector {
            text_length: 11.0,
            hashtag_count: 0.0,
            has_emoji: 0.0,
            has_cta: 0.0,
            platform_score: 0.7,
        },
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes),
    }
}

#[tokio::test]
async fn predict_records_history() {
    let engine = ViralityEngine::new(ModelRegistry::default(), MemoryStore::default());
    let mut rng = StdRng::seed_from_u64(11);

    let outcome = engine
        .predict(&post(), ModelId::XgBoost, &mut rng)
        .await
        .unwrap();
    assert!(outcome.persisted());
    let prediction = &outcome.prediction;
    assert!((10..=95).contains(&prediction.virality_score));
    assert_eq!(prediction.model_used, ModelId::XgBoost);
    assert_eq!(prediction.features.hashtag_count, 4.0);
    assert!(prediction.features.cta());

    let view = engine.history(&HistoryFilter::All).await.unwrap();
    assert_eq!(view.summary.total, 1);
    assert_eq!(view.predictions[0].id, prediction.id);
}

#[tokio::test]
async fn predict_survives_store_failure() {
    let engine = ViralityEngine::new(ModelRegistry::default(), UnavailableStore);
    let mut rng = StdRng::seed_from_u64(5);

    let outcome = engine
        .predict(&post(), ModelId::NaiveBayes, &mut rng)
        .await
        .unwrap();
    assert!(!outcome.persisted());
    assert!(matches!(
        outcome.persist_error,
        Some(EngineError::PersistenceUnavailable(_))
    ));
    assert!((10..=95).contains(&outcome.prediction.virality_score));

    let history = engine.history(&HistoryFilter::All).await;
    assert!(matches!(history, Err(EngineError::PersistenceUnavailable(_))));
}

#[tokio::test]
async fn compare_flags_top_performers() {
    let store = MemoryStore::with_roster(sample_roster(Utc::now()));
    let engine = ViralityEngine::new(ModelRegistry::default(), store);
    let mut rng = StdRng::seed_from_u64(21);

    let entries = engine.compare(&post(), &mut rng).await.unwrap();
    assert_eq!(entries.len(), ModelId::ALL.len());
    assert_eq!(entries[0].model_name, "XGBoost");

    let best = entries.iter().map(|entry| entry.score).max().unwrap();
    for entry in &entries {
        assert_eq!(entry.top_performer, entry.score == best);
    }
    let ranks: Vec<_> = entries.iter().map(|entry| entry.rank).collect();
    assert_eq!(ranks, (1..=ModelId::ALL.len()).collect::<Vec<_>>());
}

#[tokio::test]
async fn compare_with_empty_roster_is_empty() {
    let engine = ViralityEngine::new(ModelRegistry::default(), MemoryStore::default());
    let mut rng = StdRng::seed_from_u64(1);
    assert!(engine.compare(&post(), &mut rng).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_filter_keeps_full_summary() {
    let store = MemoryStore::default();
    store.insert(&recorded("a", 0, 80, PredictedClass::High)).await.unwrap();
    store.insert(&recorded("b", 1, 50, PredictedClass::Medium)).await.unwrap();
    store.insert(&recorded("c", 2, 20, PredictedClass::Low)).await.unwrap();
    store.insert(&recorded("d", 3, 65, PredictedClass::Medium)).await.unwrap();
    let engine = ViralityEngine::new(ModelRegistry::default(), store);

    let view = engine.history(&HistoryFilter::parse("medium")).await.unwrap();
    assert_eq!(view.summary.total, 4);
    assert_eq!(view.summary.average_score, 54);
    assert_eq!(view.summary.high, 1);
    assert_eq!(view.summary.medium, 2);
    assert_eq!(view.summary.low, 1);

    let ids: Vec<_> = view.predictions.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["d", "b"]);

    let limited = engine
        .history_with_limit(&HistoryFilter::All, 2)
        .await
        .unwrap();
    assert_eq!(limited.summary.total, 2);
}

#[tokio::test]
async fn metrics_lookup_by_alias() {
    let store = MemoryStore::with_roster(sample_roster(Utc::now()));
    let engine = ViralityEngine::new(ModelRegistry::default(), store);

    let (model, breakdown) = engine.metrics_for("svm").await.unwrap();
    assert_eq!(model.model_name, "Support Vector Machine (SVM)");
    assert_eq!(breakdown.row_totals, vec![500, 500]);
    assert!(breakdown.warnings.is_empty());

    let (model, _) = engine.metrics_for("random forest").await.unwrap();
    assert_eq!(model.model_name, "Random Forest");

    let missing = engine.metrics_for("gradient descent").await;
    assert!(matches!(missing, Err(EngineError::UnknownModel(_))));
}

#[tokio::test]
async fn json_store_persists_between_engines() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(8);

    let first = {
        let store = JsonFileStore::open(dir.path().to_path_buf()).await.unwrap();
        store
            .replace_model_metrics(sample_roster(Utc::now()))
            .await
            .unwrap();
        let engine = ViralityEngine::new(ModelRegistry::default(), store);
        engine
            .predict(&post(), ModelId::Mlp, &mut rng)
            .await
            .unwrap()
            .prediction
    };

    let store = JsonFileStore::open(dir.path().to_path_buf()).await.unwrap();
    let engine = ViralityEngine::new(ModelRegistry::default(), store).with_history_limit(10);
    let view = engine.history(&HistoryFilter::All).await.unwrap();
    assert_eq!(view.predictions.len(), 1);
    assert_eq!(view.predictions[0].id, first.id);
    assert_eq!(view.predictions[0].virality_score, first.virality_score);
    assert_eq!(view.predictions[0].created_at, first.created_at);

    let roster = engine.roster().await.unwrap();
    assert_eq!(roster.len(), ModelId::ALL.len());
    assert!(roster.windows(2).all(|pair| pair[0].accuracy >= pair[1].accuracy));
}
