use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ContentItem;

pub const TEXT_LENGTH: &str = "text_length";
pub const HASHTAG_COUNT: &str = "hashtag_count";
pub const HAS_EMOJI: &str = "has_emoji";
pub const HAS_CTA: &str = "has_cta";
pub const PLATFORM_SCORE: &str = "platform_score";

/// Feature snapshot taken at scoring time. Serializes as a flat
/// `name -> value` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub text_length: f64,
    pub hashtag_count: f64,
    pub has_emoji: f64,
    pub has_cta: f64,
    pub platform_score: f64,
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            TEXT_LENGTH => Some(self.text_length),
            HASHTAG_COUNT => Some(self.hashtag_count),
            HAS_EMOJI => Some(self.has_emoji),
            HAS_CTA => Some(self.has_cta),
            PLATFORM_SCORE => Some(self.platform_score),
            _ => None,
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        [
            (TEXT_LENGTH, self.text_length),
            (HASHTAG_COUNT, self.hashtag_count),
            (HAS_EMOJI, self.has_emoji),
            (HAS_CTA, self.has_cta),
            (PLATFORM_SCORE, self.platform_score),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }

    pub fn emoji(&self) -> bool {
        self.has_emoji >= 0.5
    }

    pub fn cta(&self) -> bool {
        self.has_cta >= 0.5
    }
}

/// Derives the feature vector for one item. `platform_score` is drawn from
/// `rng`, so only a seeded source makes the result reproducible.
pub fn extract_features<R: Rng + ?Sized>(item: &ContentItem, rng: &mut R) -> FeatureVector {
    let mut char_count = 0usize;
    let mut has_emoji = false;
    let mut has_cta = false;

    for ch in item.text.chars() {
        char_count += 1;
        match ch {
            '?' | '!' => has_cta = true,
            _ => {
                if is_face_emoji(ch) {
                    has_emoji = true;
                }
            }
        }
    }

    FeatureVector {
        text_length: char_count as f64,
        hashtag_count: count_hashtags(&item.hashtags) as f64,
        has_emoji: bool_to_f64(has_emoji),
        has_cta: bool_to_f64(has_cta),
        platform_score: rng.gen_range(0.5..0.8),
    }
}

/// Counts non-empty `#`-separated tokens across all entries, so both
/// `["a", "b"]` and `["#a #b"]` count two tags.
pub fn count_hashtags(hashtags: &[String]) -> usize {
    hashtags
        .iter()
        .flat_map(|entry| entry.split('#'))
        .filter(|token| !token.trim().is_empty())
        .count()
}

// Emoticons block only.
fn is_face_emoji(ch: char) -> bool {
    ('\u{1F600}'..='\u{1F64F}').contains(&ch)
}

fn bool_to_f64(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
