use chrono::{DateTime, Utc};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::data::TrainingSample;
use crate::error::MLError;

/// Feature order expected by the model.
pub const FEATURE_NAMES: [&str; 2] = ["milage", "model_year"];

/// Ordinary least squares over `FEATURE_NAMES`. Immutable once fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressionModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Coefficient of determination on the training split.
    pub r_squared: f64,
    pub training_samples: usize,
    pub trained_at: DateTime<Utc>,
}

/// Splits samples into a feature matrix (one row per sample) and a target vector.
pub fn design_matrix(samples: &[TrainingSample]) -> (DMatrix<f64>, DVector<f64>) {
    let x = DMatrix::from_fn(samples.len(), FEATURE_NAMES.len(), |i, j| {
        samples[i].features()[j]
    });
    let y = DVector::from_iterator(samples.len(), samples.iter().map(|s| s.price));
    (x, y)
}

impl LinearRegressionModel {
    pub fn fit_samples(samples: &[TrainingSample]) -> Result<Self, MLError> {
        let (x, y) = design_matrix(samples);
        Self::fit(&x, &y)
    }

    /// Least-squares fit with intercept.
    ///
    /// Columns are centered first so the intercept drops out of the solve;
    /// the centered system is solved through SVD, giving the minimum-norm
    /// solution when features are collinear.
    pub fn fit(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<Self, MLError> {
        if x.nrows() != y.len() {
            return Err(MLError::TrainingError(format!(
                "Dimension mismatch: {} feature rows, {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(MLError::TrainingError("No training rows".to_string()));
        }

        let (n, p) = x.shape();
        let x_mean: DVector<f64> = x.row_mean().transpose();
        let y_mean = y.mean();

        let mut x_centered = x.clone();
        for j in 0..p {
            x_centered.column_mut(j).add_scalar_mut(-x_mean[j]);
        }
        let y_centered = y.add_scalar(-y_mean);

        let svd = x_centered.svd(true, true);
        let max_singular = svd.singular_values.iter().copied().fold(0.0, f64::max);
        let eps = max_singular * f64::EPSILON * n.max(p) as f64;

        let weights = svd
            .solve(&y_centered, eps)
            .map_err(|e| MLError::TrainingError(e.to_string()))?;
        let intercept = y_mean - x_mean.dot(&weights);

        if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(MLError::TrainingError(
                "Least-squares solution is not finite".to_string(),
            ));
        }

        let mut model = Self {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            coefficients: weights.iter().copied().collect(),
            intercept,
            r_squared: 0.0,
            training_samples: n,
            trained_at: Utc::now(),
        };

        let y_pred = model.predict(x)?;
        let ss_tot: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();
        let ss_res: f64 = y
            .iter()
            .zip(y_pred.iter())
            .map(|(yi, yi_pred)| (yi - yi_pred).powi(2))
            .sum();

        model.r_squared = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        debug!(
            "Fitted {} rows: coefficients {:?}, intercept {:.4}, R² {:.4}",
            n, model.coefficients, model.intercept, model.r_squared
        );

        Ok(model)
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> Result<DVector<f64>, MLError> {
        if x.ncols() != self.coefficients.len() {
            return Err(MLError::InferenceError(format!(
                "expected {} features, got {}",
                self.coefficients.len(),
                x.ncols()
            )));
        }

        let weights = DVector::from_column_slice(&self.coefficients);
        Ok(x * weights + DVector::from_element(x.nrows(), self.intercept))
    }

    /// Raw prediction for a single feature row.
    pub fn predict_one(&self, features: &[f64]) -> Result<f64, MLError> {
        if features.len() != self.coefficients.len() {
            return Err(MLError::InferenceError(format!(
                "model has {} coefficients but received {} features",
                self.coefficients.len(),
                features.len()
            )));
        }

        let value = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;

        if value.is_finite() {
            Ok(value)
        } else {
            Err(MLError::InferenceError(format!(
                "prediction is not a finite number ({})",
                value
            )))
        }
    }

    pub fn mean_absolute_error(&self, samples: &[TrainingSample]) -> Result<f64, MLError> {
        if samples.is_empty() {
            return Err(MLError::TrainingError(
                "Cannot evaluate on an empty set".to_string(),
            ));
        }

        let errors = samples
            .iter()
            .map(|s| Ok((self.predict_one(&s.features())? - s.price).abs()))
            .collect::<Result<Vec<f64>, MLError>>()?;

        Ok(Statistics::mean(&errors))
    }

    /// Writes the model as JSON, creating parent directories. Returns the artifact size in bytes.
    pub fn save(&self, path: &Path) -> Result<u64, MLError> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| MLError::ModelSaveError(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| MLError::ModelSaveError(e.to_string()))?;
        }
        fs::write(path, &bytes).map_err(|e| MLError::ModelSaveError(e.to_string()))?;

        info!("Model saved to {} ({} bytes)", path.display(), bytes.len());
        Ok(bytes.len() as u64)
    }

    pub fn load(path: &Path) -> Result<Self, MLError> {
        if !path.exists() {
            return Err(MLError::ModelNotFound(path.to_path_buf()));
        }

        info!("Loading price model from {}", path.display());
        let bytes = fs::read(path).map_err(|e| MLError::ModelLoadError(e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| MLError::ModelLoadError(format!("{}: {}", path.display(), e)))
    }
}
