use rand::Rng;
use tracing::debug;

use crate::error::Result;
use crate::features::FeatureVector;
use crate::registry::{ModelId, ModelRegistry};

const BASE_SCORE: f64 = 50.0;
const LENGTH_BONUS: f64 = 15.0;
const HASHTAG_BONUS: f64 = 10.0;
const EMOJI_BONUS: f64 = 5.0;
const CTA_BONUS: f64 = 5.0;
const JITTER: f64 = 5.0;
pub const MIN_SCORE: f64 = 10.0;
pub const MAX_SCORE: f64 = 95.0;

/// Single-content scoring: fixed feature bonuses plus the model's registry
/// bonus and a bounded jitter.
#[derive(Debug, Clone, Default)]
pub struct ScoringPolicy {
    registry: ModelRegistry,
}

impl ScoringPolicy {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Deterministic part of the score, before model bonus and jitter.
    pub fn feature_score(&self, features: &FeatureVector) -> f64 {
        let mut score = BASE_SCORE;

        if features.text_length > 100.0 && features.text_length < 280.0 {
            score += LENGTH_BONUS;
        }
        if (3.0..=5.0).contains(&features.hashtag_count) {
            score += HASHTAG_BONUS;
        }
        if features.emoji() {
            score += EMOJI_BONUS;
        }
        if features.cta() {
            score += CTA_BONUS;
        }

        score
    }

    pub fn score<R: Rng + ?Sized>(
        &self,
        features: &FeatureVector,
        model: ModelId,
        rng: &mut R,
    ) -> Result<u8> {
        let bonus = self.registry.bonus(model)?;
        let jitter = rng.gen_range(-JITTER..JITTER);
        let raw = self.feature_score(features) + bonus + jitter;
        let score = clamp_score(raw);
        debug!(model = model.slug(), raw, score, "scored content");
        Ok(score)
    }
}

pub(crate) fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return MIN_SCORE as u8;
    }
    raw.clamp(MIN_SCORE, MAX_SCORE).round() as u8
}
