pub mod recursive;

pub use recursive::{RecursiveForecast, RecursiveForecaster};
