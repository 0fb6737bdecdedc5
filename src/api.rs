use serde::{Deserialize, Serialize};
use trendify::batch::{BatchResponse, BatchSummary, Row};
use trendify::metrics::{MatrixBreakdown, ModelMetrics};
use trendify::scoring::ComparisonEntry;
use trendify::{ContentItem, ContentType, EngineError, ModelId, Platform, PredictionOutcome};

#[derive(Debug, Deserialize)]
pub struct ApiContent {
    pub text: Option<String>,
    /// Raw hashtag string, e.g. `"#ai #tech"`.
    pub hashtags: Option<String>,
    pub platform: Option<String>,
    pub content_type: Option<String>,
}

impl ApiContent {
    pub fn into_content(self) -> Result<ContentItem, EngineError> {
        let text = self.text.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(EngineError::InvalidInput("text is required".to_string()));
        }

        let platform = match self.platform.as_deref() {
            Some(value) => {
                Platform::from_str(value).ok_or_else(|| invalid(format!("invalid platform: {}", value)))?
            }
            None => Platform::Instagram,
        };
        let content_type = match self.content_type.as_deref() {
            Some(value) => ContentType::from_str(value)
                .ok_or_else(|| invalid(format!("invalid content type: {}", value)))?,
            None => ContentType::Text,
        };

        let item = ContentItem::new(text, platform, content_type);
        Ok(match self.hashtags.as_deref() {
            Some(raw) => item.with_hashtags(raw),
            None => item,
        })
    }
}

fn invalid(message: String) -> EngineError {
    EngineError::InvalidInput(message)
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(flatten)]
    pub content: ApiContent,
    pub model: Option<String>,
}

impl PredictRequest {
    pub fn into_parts(self) -> Result<(ContentItem, ModelId), EngineError> {
        let model = match self.model.as_deref() {
            Some(value) => ModelId::from_str(value)?,
            None => ModelId::LogisticRegression,
        };
        Ok((self.content.into_content()?, model))
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub id: String,
    pub virality_score: u8,
    pub predicted_class: String,
    pub model_used: ModelId,
    pub model_label: String,
    pub features: std::collections::BTreeMap<String, f64>,
    pub created_at: String,
    pub persisted: bool,
    pub warnings: Vec<String>,
}

impl PredictResponse {
    pub fn from_outcome(outcome: PredictionOutcome) -> Self {
        let persisted = outcome.persisted();
        let warnings = outcome
            .persist_error
            .map(|err| vec![format!("prediction not saved to history: {}", err)])
            .unwrap_or_default();
        let prediction = outcome.prediction;
        Self {
            id: prediction.id,
            virality_score: prediction.virality_score,
            predicted_class: prediction.predicted_class.label().to_string(),
            model_used: prediction.model_used,
            model_label: prediction.model_used.label().to_string(),
            features: prediction.features.to_map(),
            created_at: prediction.created_at.to_rfc3339(),
            persisted,
            warnings,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub results: Vec<ComparisonEntry>,
}

#[derive(Debug, Deserialize)]
pub struct BatchApiRequest {
    pub model: Option<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Serialize)]
pub struct BatchApiResponse {
    #[serde(flatten)]
    pub response: BatchResponse,
    pub summary: BatchSummary,
}

impl BatchApiResponse {
    pub fn from_response(response: BatchResponse) -> Self {
        let summary = response.summary();
        Self { response, summary }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub filter: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub models: Vec<ModelMetrics>,
}

#[derive(Debug, Serialize)]
pub struct ModelMetricsResponse {
    pub model: ModelMetrics,
    pub breakdown: MatrixBreakdown,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(text: Option<&str>) -> ApiContent {
        ApiContent {
            text: text.map(str::to_string),
            hashtags: Some("#a #b".to_string()),
            platform: Some("tiktok".to_string()),
            content_type: None,
        }
    }

    #[test]
    fn submitted_text_is_kept_verbatim() {
        let item = content(Some("  spaced out!  ")).into_content().unwrap();
        assert_eq!(item.text, "  spaced out!  ");
        assert_eq!(item.hashtags, vec!["a", "b"]);
        assert_eq!(item.platform, Platform::Tiktok);
        assert_eq!(item.content_type, ContentType::Text);
    }

    #[test]
    fn blank_text_is_invalid_input() {
        for text in [None, Some(""), Some(" \n\t ")] {
            let err = content(text).into_content().unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)));
        }
    }

    #[test]
    fn unknown_model_is_rejected() {
        let request = PredictRequest {
            content: content(Some("hello")),
            model: Some("perceptron 9000".to_string()),
        };
        assert!(matches!(request.into_parts(), Err(EngineError::UnknownModel(_))));
    }
}
