//! Z-score feature scaler, fit once at training time and reused unchanged
//! at inference.

use serde::{Deserialize, Serialize};

use super::schema::{FeatureSchema, FeatureVector};
use crate::error::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    schema: FeatureSchema,
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit column means and standard deviations over training rows laid out
    /// in schema order.
    pub fn fit(schema: FeatureSchema, rows: &[Vec<f64>]) -> Result<Self, PipelineError> {
        if rows.is_empty() {
            return Err(PipelineError::data("cannot fit scaler on empty dataset"));
        }
        let n_features = schema.len();
        for row in rows {
            if row.len() != n_features {
                return Err(PipelineError::input(format!(
                    "scaler fit row has {} values, schema has {} fields",
                    row.len(),
                    n_features
                )));
            }
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; n_features];
        for row in rows {
            for (i, v) in row.iter().enumerate() {
                means[i] += v / n;
            }
        }

        let mut stds = vec![0.0; n_features];
        for row in rows {
            for (i, v) in row.iter().enumerate() {
                stds[i] += (v - means[i]).powi(2) / n;
            }
        }
        for s in stds.iter_mut() {
            *s = s.sqrt();
        }

        Ok(Self { schema, means, stds })
    }

    /// An identity scaler over `schema` (zero means, unit stds).
    pub fn identity(schema: FeatureSchema) -> Self {
        let n = schema.len();
        Self {
            schema,
            means: vec![0.0; n],
            stds: vec![1.0; n],
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Standardize one feature vector. The vector's schema must match the
    /// fitted schema exactly; a mismatch is an input error, never a silent
    /// misprediction.
    pub fn transform(&self, features: &FeatureVector) -> Result<FeatureVector, PipelineError> {
        self.schema.ensure_matches(features.schema())?;

        let scaled = features
            .values()
            .iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(v, (mean, std))| {
                if std.abs() < 1e-10 {
                    // Degenerate column: centre only.
                    v - mean
                } else {
                    (v - mean) / std
                }
            })
            .collect();

        FeatureVector::new(self.schema.clone(), scaled)
    }

    /// Standardize a matrix of training rows already in schema order.
    pub fn transform_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, PipelineError> {
        rows.iter()
            .map(|row| {
                let fv = FeatureVector::new(self.schema.clone(), row.clone())?;
                Ok(self.transform(&fv)?.values().to_vec())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_field_schema() -> FeatureSchema {
        FeatureSchema::new(vec!["a".to_string(), "b".to_string()])
    }

    #[test]
    fn fit_and_transform_standardizes() {
        let rows = vec![vec![10.0, 100.0], vec![20.0, 200.0], vec![30.0, 300.0]];
        let scaler = StandardScaler::fit(two_field_schema(), &rows).unwrap();

        let fv = FeatureVector::new(two_field_schema(), vec![20.0, 200.0]).unwrap();
        let scaled = scaler.transform(&fv).unwrap();
        // Column means map to zero.
        assert!(scaled.values()[0].abs() < 1e-12);
        assert!(scaled.values()[1].abs() < 1e-12);

        let fv = FeatureVector::new(two_field_schema(), vec![30.0, 300.0]).unwrap();
        let scaled = scaler.transform(&fv).unwrap();
        // One population std above the mean.
        assert!((scaled.values()[0] - 1.224744871).abs() < 1e-6);
    }

    #[test]
    fn degenerate_column_is_centred_not_divided() {
        let rows = vec![vec![5.0, 1.0], vec![5.0, 2.0], vec![5.0, 3.0]];
        let scaler = StandardScaler::fit(two_field_schema(), &rows).unwrap();

        let fv = FeatureVector::new(two_field_schema(), vec![7.0, 2.0]).unwrap();
        let scaled = scaler.transform(&fv).unwrap();
        assert_eq!(scaled.values()[0], 2.0);
    }

    #[test]
    fn fit_rejects_empty_dataset() {
        let result = StandardScaler::fit(two_field_schema(), &[]);
        assert!(matches!(result, Err(PipelineError::Data(_))));
    }

    #[test]
    fn transform_rejects_schema_mismatch() {
        let rows = vec![vec![1.0, 2.0]];
        let scaler = StandardScaler::fit(two_field_schema(), &rows).unwrap();

        let swapped = FeatureSchema::new(vec!["b".to_string(), "a".to_string()]);
        let fv = FeatureVector::new(swapped, vec![1.0, 2.0]).unwrap();
        assert!(matches!(scaler.transform(&fv), Err(PipelineError::Input(_))));
    }

    #[test]
    fn identity_scaler_is_a_no_op() {
        let scaler = StandardScaler::identity(two_field_schema());
        let fv = FeatureVector::new(two_field_schema(), vec![3.5, -1.0]).unwrap();
        assert_eq!(scaler.transform(&fv).unwrap().values(), &[3.5, -1.0]);
    }
}
