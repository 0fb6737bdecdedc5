pub mod classifier;
pub mod comparator;
pub mod policy;

pub use classifier::{classify, BinaryLabel, PredictedClass, ViralityClass};
pub use comparator::{ComparisonEntry, ModelComparator};
pub use policy::ScoringPolicy;
