use serde::{Deserialize, Serialize};

pub const HIGH_THRESHOLD: u8 = 70;
pub const MEDIUM_THRESHOLD: u8 = 40;

/// Three-way label used for single-content scoring and model comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViralityClass {
    Low,
    Medium,
    High,
}

impl ViralityClass {
    pub fn label(self) -> &'static str {
        match self {
            ViralityClass::Low => "Low",
            ViralityClass::Medium => "Medium",
            ViralityClass::High => "High",
        }
    }
}

/// Thresholds are closed-open: 70 is High, 40 is Medium.
pub fn classify(score: u8) -> ViralityClass {
    if score >= HIGH_THRESHOLD {
        ViralityClass::High
    } else if score >= MEDIUM_THRESHOLD {
        ViralityClass::Medium
    } else {
        ViralityClass::Low
    }
}

/// Binary label produced by the batch backend. Carried through as returned,
/// never derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryLabel {
    Viral,
    #[serde(rename = "Not Viral", alias = "Not-Viral", alias = "NotViral")]
    NotViral,
}

impl BinaryLabel {
    pub fn label(self) -> &'static str {
        match self {
            BinaryLabel::Viral => "Viral",
            BinaryLabel::NotViral => "Not Viral",
        }
    }

    pub fn is_viral(self) -> bool {
        matches!(self, BinaryLabel::Viral)
    }
}

/// Label stored on a `Prediction`, spanning both vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictedClass {
    High,
    Medium,
    Low,
    Viral,
    #[serde(rename = "Not Viral", alias = "Not-Viral", alias = "NotViral")]
    NotViral,
}

impl PredictedClass {
    pub fn label(self) -> &'static str {
        match self {
            PredictedClass::High => "High",
            PredictedClass::Medium => "Medium",
            PredictedClass::Low => "Low",
            PredictedClass::Viral => "Viral",
            PredictedClass::NotViral => "Not Viral",
        }
    }
}

impl From<ViralityClass> for PredictedClass {
    fn from(value: ViralityClass) -> Self {
        match value {
            ViralityClass::High => PredictedClass::High,
            ViralityClass::Medium => PredictedClass::Medium,
            ViralityClass::Low => PredictedClass::Low,
        }
    }
}

impl From<BinaryLabel> for PredictedClass {
    fn from(value: BinaryLabel) -> Self {
        match value {
            BinaryLabel::Viral => PredictedClass::Viral,
            BinaryLabel::NotViral => PredictedClass::NotViral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_belong_to_higher_class() {
        assert_eq!(classify(70), ViralityClass::High);
        assert_eq!(classify(69), ViralityClass::Medium);
        assert_eq!(classify(40), ViralityClass::Medium);
        assert_eq!(classify(39), ViralityClass::Low);
    }

    #[test]
    fn classify_is_total() {
        for score in 0..=u8::MAX {
            let class = classify(score);
            let expected = if score >= 70 {
                ViralityClass::High
            } else if score >= 40 {
                ViralityClass::Medium
            } else {
                ViralityClass::Low
            };
            assert_eq!(class, expected);
        }
    }

    #[test]
    fn binary_label_accepts_backend_spellings() {
        let label: BinaryLabel = serde_json::from_str("\"Not Viral\"").unwrap();
        assert_eq!(label, BinaryLabel::NotViral);
        let label: BinaryLabel = serde_json::from_str("\"Not-Viral\"").unwrap();
        assert_eq!(label, BinaryLabel::NotViral);
        assert_eq!(serde_json::to_string(&BinaryLabel::NotViral).unwrap(), "\"Not Viral\"");
    }

    #[test]
    fn predicted_class_keeps_vocabularies_apart() {
        assert_eq!(PredictedClass::from(ViralityClass::High).label(), "High");
        assert_eq!(PredictedClass::from(BinaryLabel::Viral).label(), "Viral");
        assert_ne!(PredictedClass::from(BinaryLabel::Viral), PredictedClass::High);
    }
}
