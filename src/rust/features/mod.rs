mod catalogue;
mod extractor;
mod schema;
mod text_stats;
mod vector;

pub use catalogue::{display_name, is_text_feature, TEXT_FEATURES};
pub use extractor::{FeatureComputer, FeatureExtractor};
pub use schema::{FeatureSchema, FeatureSpec};
pub use text_stats::{TextMeasurements, TextStatistics};
pub use vector::{FeatureTable, FeatureVector};

pub(crate) use vector::stack_rows;
