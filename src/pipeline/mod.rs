//! Batch pipeline stages. Each stage is one process invocation: fetch and
//! store features, train and register a model, or run batch inference.

pub mod features;
pub mod inference;
pub mod training;
