use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::features::FeatureVector;
use crate::registry::ModelId;
use crate::scoring::PredictedClass;
use crate::ContentItem;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// One scoring result. Append-only: never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub content: ContentItem,
    pub predicted_class: PredictedClass,
    pub virality_score: u8,
    pub model_used: ModelId,
    pub features: FeatureVector,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryFilter {
    All,
    Class(String),
}

impl HistoryFilter {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            HistoryFilter::All
        } else {
            HistoryFilter::Class(trimmed.to_string())
        }
    }

    pub fn matches(&self, prediction: &Prediction) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::Class(label) => {
                normalize_label(prediction.predicted_class.label()) == normalize_label(label)
            }
        }
    }
}

// "Not Viral", "not-viral" and "NotViral" all compare equal.
fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|ch| !matches!(ch, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl Default for HistoryFilter {
    fn default() -> Self {
        HistoryFilter::All
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub total: usize,
    pub count_per_class: BTreeMap<String, usize>,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub average_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryView {
    pub summary: HistorySummary,
    pub predictions: Vec<Prediction>,
}

pub struct HistoryAggregator;

impl HistoryAggregator {
    /// Summary over the full history; unaffected by any list filter.
    pub fn summarize(predictions: &[Prediction]) -> HistorySummary {
        let mut count_per_class = BTreeMap::new();
        let mut score_sum = 0u64;

        for prediction in predictions {
            *count_per_class
                .entry(prediction.predicted_class.label().to_string())
                .or_insert(0) += 1;
            score_sum += u64::from(prediction.virality_score);
        }

        let average_score = if predictions.is_empty() {
            0
        } else {
            (score_sum as f64 / predictions.len() as f64).round() as u8
        };
        let count = |class: PredictedClass| count_per_class.get(class.label()).copied().unwrap_or(0);
        let (high, medium, low) = (
            count(PredictedClass::High),
            count(PredictedClass::Medium),
            count(PredictedClass::Low),
        );

        HistorySummary {
            total: predictions.len(),
            count_per_class,
            high,
            medium,
            low,
            average_score,
        }
    }

    /// Keeps the input (most-recent-first) order.
    pub fn filter<'a>(predictions: &'a [Prediction], filter: &HistoryFilter) -> Vec<&'a Prediction> {
        predictions
            .iter()
            .filter(|prediction| filter.matches(prediction))
            .collect()
    }

    pub fn view(predictions: &[Prediction], filter: &HistoryFilter) -> HistoryView {
        HistoryView {
            summary: Self::summarize(predictions),
            predictions: Self::filter(predictions, filter)
                .into_iter()
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContentType, Platform};

    fn prediction(id: &str, class: PredictedClass, score: u8) -> Prediction {
        Prediction {
            id: id.to_string(),
            content: ContentItem::new("post", Platform::Instagram, ContentType::Image),
            predicted_class: class,
            virality_score: score,
            model_used: ModelId::RandomForest,
            features: FeatureVector {
                text_length: 4.0,
                hashtag_count: 0.0,
                has_emoji: 0.0,
                has_cta: 0.0,
                platform_score: 0.7,
            },
            created_at: Utc::now(),
        }
    }

    fn sample() -> Vec<Prediction> {
        vec![
            prediction("a", PredictedClass::High, 80),
            prediction("b", PredictedClass::Medium, 50),
            prediction("c", PredictedClass::Low, 20),
            prediction("d", PredictedClass::Medium, 65),
        ]
    }

    #[test]
    fn average_is_rounded_over_full_history() {
        let summary = HistoryAggregator::summarize(&sample());
        assert_eq!(summary.total, 4);
        assert_eq!(summary.average_score, 54);
        assert_eq!(summary.high, 1);
        assert_eq!(summary.medium, 2);
        assert_eq!(summary.low, 1);
        assert_eq!(summary.count_per_class["Medium"], 2);
    }

    #[test]
    fn filter_is_case_insensitive_and_ignores_average() {
        let history = sample();
        let view = HistoryAggregator::view(&history, &HistoryFilter::parse("medium"));
        let ids: Vec<_> = view.predictions.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d"]);
        assert_eq!(view.summary.average_score, 54);
        assert_eq!(view.summary.total, 4);
    }

    #[test]
    fn filter_matches_exact_label_only() {
        let history = vec![
            prediction("v", PredictedClass::Viral, 90),
            prediction("n", PredictedClass::NotViral, 30),
        ];
        let viral = HistoryAggregator::filter(&history, &HistoryFilter::parse("viral"));
        assert_eq!(viral.len(), 1);
        assert_eq!(viral[0].id, "v");
        let not_viral = HistoryAggregator::filter(&history, &HistoryFilter::parse("NOT VIRAL"));
        assert_eq!(not_viral[0].id, "n");
    }

    #[test]
    fn not_viral_filter_accepts_every_spelling() {
        let history = vec![
            prediction("v", PredictedClass::Viral, 90),
            prediction("n", PredictedClass::NotViral, 30),
            prediction("l", PredictedClass::Low, 25),
        ];
        for spelling in ["Not-Viral", "not viral", "NotViral", "not_viral"] {
            let hits = HistoryAggregator::filter(&history, &HistoryFilter::parse(spelling));
            let ids: Vec<_> = hits.iter().map(|p| p.id.as_str()).collect();
            assert_eq!(ids, vec!["n"], "filter {:?}", spelling);
        }
    }

    #[test]
    fn all_filter_and_empty_history() {
        assert_eq!(HistoryFilter::parse(" All "), HistoryFilter::All);
        assert_eq!(HistoryAggregator::filter(&sample(), &HistoryFilter::All).len(), 4);

        let summary = HistoryAggregator::summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.average_score, 0);
        assert!(summary.count_per_class.is_empty());
    }
}
