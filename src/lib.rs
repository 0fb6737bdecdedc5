pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod history;
pub mod metrics;
pub mod registry;
pub mod scoring;
pub mod store;

use serde::{Deserialize, Serialize};

pub use engine::{PredictionOutcome, ViralityEngine};
pub use error::{EngineError, Result};
pub use features::{extract_features, FeatureVector};
pub use history::{HistoryAggregator, HistoryFilter, HistorySummary, Prediction};
pub use metrics::{ConfusionMatrix, MatrixBreakdown, MetricsAggregator, ModelMetrics};
pub use registry::{ModelId, ModelRegistry};
pub use scoring::{BinaryLabel, PredictedClass, ViralityClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Twitter,
    Facebook,
    Linkedin,
    Tiktok,
}

impl Platform {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "instagram" | "ig" => Some(Platform::Instagram),
            "twitter" | "x" => Some(Platform::Twitter),
            "facebook" | "fb" => Some(Platform::Facebook),
            "linkedin" => Some(Platform::Linkedin),
            "tiktok" => Some(Platform::Tiktok),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Linkedin => "linkedin",
            Platform::Tiktok => "tiktok",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Video,
}

impl ContentType {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "none" => Some(ContentType::Text),
            "image" | "photo" | "pic" => Some(ContentType::Image),
            "video" | "vid" => Some(ContentType::Video),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
            ContentType::Video => "video",
        }
    }
}

/// A post to be scored. Treated as immutable once it has been scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub text: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub platform: Platform,
    pub content_type: ContentType,
}

impl ContentItem {
    pub fn new(text: impl Into<String>, platform: Platform, content_type: ContentType) -> Self {
        Self {
            text: text.into(),
            hashtags: Vec::new(),
            platform,
            content_type,
        }
    }

    pub fn with_hashtags(mut self, raw: &str) -> Self {
        self.hashtags = Self::parse_hashtags(raw);
        self
    }

    /// Splits a raw `#one #two` string into bare tags.
    pub fn parse_hashtags(raw: &str) -> Vec<String> {
        raw.split('#')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

pub fn format_float(value: f64, digits: usize) -> String {
    format!("{:.1$}", value, digits)
}
