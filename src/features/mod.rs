//! Feature schema, scaling and engineering for the PM2.5 models.

pub mod engineering;
pub mod scaler;
pub mod schema;

pub use engineering::{prepare_training_data, TrainingData};
pub use scaler::StandardScaler;
pub use schema::{FeatureSchema, FeatureVector};
