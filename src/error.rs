use thiserror::Error;

/// Errors surfaced by the scoring and evaluation engine.
///
/// Every variant holds owned plain data so an error can be cloned into a
/// view model as a warning (see `MatrixBreakdown::warnings`).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("batch response has {actual} rows, expected {expected}")]
    MismatchedRowCount { expected: usize, actual: usize },

    #[error("row {row_index} has confidence {confidence} outside [0, 1]")]
    InvalidConfidence { row_index: usize, confidence: f64 },

    #[error("class '{label}' has no observed samples")]
    DivideByZeroClass { label: String },

    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("invalid confusion matrix: {0}")]
    InvalidMatrix(String),

    #[error("batch backend error: {0}")]
    Backend(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
