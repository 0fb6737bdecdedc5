use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelId {
    #[serde(rename = "logistic")]
    LogisticRegression,
    #[serde(rename = "random_forest")]
    RandomForest,
    #[serde(rename = "xgboost")]
    XgBoost,
    #[serde(rename = "neural_network")]
    NeuralNetwork,
    #[serde(rename = "svm")]
    Svm,
    #[serde(rename = "knn")]
    Knn,
    #[serde(rename = "decision_tree")]
    DecisionTree,
    #[serde(rename = "naive_bayes")]
    NaiveBayes,
    #[serde(rename = "mlp")]
    Mlp,
}

impl ModelId {
    pub const ALL: [ModelId; 9] = [
        ModelId::LogisticRegression,
        ModelId::RandomForest,
        ModelId::XgBoost,
        ModelId::NeuralNetwork,
        ModelId::Svm,
        ModelId::Knn,
        ModelId::DecisionTree,
        ModelId::NaiveBayes,
        ModelId::Mlp,
    ];

    /// Identifier understood by the batch inference backend.
    pub fn slug(self) -> &'static str {
        match self {
            ModelId::LogisticRegression => "logistic",
            ModelId::RandomForest => "random_forest",
            ModelId::XgBoost => "xgboost",
            ModelId::NeuralNetwork => "neural_network",
            ModelId::Svm => "svm",
            ModelId::Knn => "knn",
            ModelId::DecisionTree => "decision_tree",
            ModelId::NaiveBayes => "naive_bayes",
            ModelId::Mlp => "mlp",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelId::LogisticRegression => "Logistic Regression",
            ModelId::RandomForest => "Random Forest",
            ModelId::XgBoost => "XGBoost",
            ModelId::NeuralNetwork => "Neural Network",
            ModelId::Svm => "Support Vector Machine (SVM)",
            ModelId::Knn => "K-Nearest Neighbors (KNN)",
            ModelId::DecisionTree => "Decision Tree",
            ModelId::NaiveBayes => "Naive Bayes",
            ModelId::Mlp => "Multi-layer Perceptron (MLP)",
        }
    }

    fn short_label(self) -> Option<&'static str> {
        match self {
            ModelId::Svm => Some("svm"),
            ModelId::Knn => Some("knn"),
            ModelId::Mlp => Some("mlp"),
            ModelId::LogisticRegression => Some("logistic regression"),
            ModelId::XgBoost => Some("xgb"),
            _ => None,
        }
    }

    /// Accepts a slug, a display label or a common short name, ignoring case.
    pub fn from_str(value: &str) -> Result<Self> {
        let needle = value.trim().to_lowercase();
        let normalized = needle.replace(['-', ' '], "_");
        ModelId::ALL
            .into_iter()
            .find(|model| {
                model.slug() == normalized
                    || model.label().to_lowercase() == needle
                    || model.short_label() == Some(needle.as_str())
            })
            .ok_or_else(|| EngineError::UnknownModel(value.trim().to_string()))
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub bonus: f64,
}

/// Per-model scoring constants. Construction guarantees every `ModelId` has
/// an entry.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    profiles: HashMap<ModelId, ModelProfile>,
}

impl ModelRegistry {
    /// Builds the registry from a `slug -> profile` table, failing on any
    /// unrecognized key or any model left uncovered.
    pub fn from_table(table: &BTreeMap<String, ModelProfile>) -> Result<Self> {
        let mut profiles = HashMap::new();
        for (key, profile) in table {
            let model = ModelId::from_str(key)?;
            profiles.insert(model, *profile);
        }

        if let Some(missing) = ModelId::ALL
            .into_iter()
            .find(|model| !profiles.contains_key(model))
        {
            return Err(EngineError::UnknownModel(format!(
                "{} has no registry entry",
                missing.slug()
            )));
        }

        Ok(Self { profiles })
    }

    pub fn default_table() -> BTreeMap<String, ModelProfile> {
        ModelId::ALL
            .into_iter()
            .map(|model| (model.slug().to_string(), ModelProfile { bonus: default_bonus(model) }))
            .collect()
    }

    pub fn profile(&self, model: ModelId) -> Result<ModelProfile> {
        self.profiles
            .get(&model)
            .copied()
            .ok_or_else(|| EngineError::UnknownModel(model.slug().to_string()))
    }

    pub fn bonus(&self, model: ModelId) -> Result<f64> {
        self.profile(model).map(|profile| profile.bonus)
    }

    pub fn models(&self) -> impl Iterator<Item = ModelId> + '_ {
        ModelId::ALL.into_iter().filter(|model| self.profiles.contains_key(model))
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self {
            profiles: ModelId::ALL
                .into_iter()
                .map(|model| (model, ModelProfile { bonus: default_bonus(model) }))
                .collect(),
        }
    }
}

fn default_bonus(model: ModelId) -> f64 {
    match model {
        ModelId::LogisticRegression => 0.0,
        ModelId::RandomForest => 5.0,
        ModelId::XgBoost => 8.0,
        ModelId::NeuralNetwork => 12.0,
        ModelId::Svm => 6.0,
        ModelId::Knn => 3.0,
        ModelId::DecisionTree => 4.0,
        ModelId::NaiveBayes => 2.0,
        ModelId::Mlp => 10.0,
    }
}
