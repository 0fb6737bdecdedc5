use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::metrics::ModelMetrics;
use crate::scoring::classifier::{classify, ViralityClass};
use crate::scoring::policy::clamp_score;
use crate::ContentItem;

const BASE: f64 = 50.0;
const LENGTH_DIVISOR: f64 = 10.0;
const EMOJI_BONUS: f64 = 15.0;
const ACCURACY_WEIGHT: f64 = 50.0;
const JITTER: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonEntry {
    /// 1-based position in the roster.
    pub rank: usize,
    pub model_name: String,
    pub score: u8,
    pub class: ViralityClass,
    pub accuracy: f64,
    pub f1_score: f64,
    pub top_performer: bool,
}

/// Runs one content item through every model in a roster. Scores are scaled
/// by each model's registered accuracy rather than the fixed registry bonus
/// used by `ScoringPolicy`.
#[derive(Debug, Clone, Default)]
pub struct ModelComparator;

impl ModelComparator {
    pub fn new() -> Self {
        Self
    }

    pub fn base_heuristic(&self, content: &ContentItem) -> f64 {
        let char_count = content.text.chars().count() as f64;
        let emoji = if content.text.chars().any(is_pictographic) {
            EMOJI_BONUS
        } else {
            0.0
        };
        BASE + char_count / LENGTH_DIVISOR + emoji
    }

    /// Output preserves roster order. Every entry holding the maximum score
    /// is flagged as top performer.
    pub fn compare<R: Rng + ?Sized>(
        &self,
        content: &ContentItem,
        roster: &[ModelMetrics],
        rng: &mut R,
    ) -> Vec<ComparisonEntry> {
        let base = self.base_heuristic(content);

        let mut entries: Vec<ComparisonEntry> = roster
            .iter()
            .enumerate()
            .map(|(idx, model)| {
                let jitter = rng.gen_range(-JITTER..JITTER);
                let score = clamp_score(base + model.accuracy * ACCURACY_WEIGHT + jitter);
                ComparisonEntry {
                    rank: idx + 1,
                    model_name: model.model_name.clone(),
                    score,
                    class: classify(score),
                    accuracy: model.accuracy,
                    f1_score: model.f1_score,
                    top_performer: false,
                }
            })
            .collect();

        if let Some(best) = entries.iter().map(|entry| entry.score).max() {
            for entry in entries.iter_mut() {
                entry.top_performer = entry.score == best;
            }
        }

        debug!(models = entries.len(), base, "compared models");
        entries
    }
}

fn is_pictographic(ch: char) -> bool {
    ('\u{1F300}'..='\u{1FAFF}').contains(&ch) || ('\u{2600}'..='\u{27BF}').contains(&ch)
}
