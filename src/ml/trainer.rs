use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::models::LinearRegressionModel;
use crate::config::TrainingConfig;
use crate::data::{load_samples, train_test_split, DatasetSummary, TrainingSample};
use crate::error::MLError;

/// Fixed input re-predicted after saving to confirm the artifact round-trips.
pub const VERIFICATION_MILEAGE: f64 = 50_000.0;
pub const VERIFICATION_YEAR: i32 = 2020;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub train_rows: usize,
    pub test_rows: usize,
    pub mae: f64,
    pub r_squared: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub total_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub mae: f64,
    pub r_squared: f64,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub verification_price: f64,
    pub artifact_path: PathBuf,
    pub artifact_bytes: u64,
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Splits, fits on the training part and scores MAE on the held-out part.
    pub fn fit(
        &self,
        samples: &[TrainingSample],
    ) -> Result<(LinearRegressionModel, Evaluation), MLError> {
        let (train, test) = train_test_split(samples, self.config.test_size, self.config.seed)?;
        info!("Training set: {} rows, test set: {} rows", train.len(), test.len());

        let model = LinearRegressionModel::fit_samples(&train)?;
        let mae = model.mean_absolute_error(&test)?;

        let evaluation = Evaluation {
            train_rows: train.len(),
            test_rows: test.len(),
            mae,
            r_squared: model.r_squared,
        };

        Ok((model, evaluation))
    }

    pub fn train_and_save(
        &self,
        dataset: &Path,
        model_path: &Path,
    ) -> Result<(LinearRegressionModel, TrainingReport), MLError> {
        info!("Loading cleaned dataset from {}", dataset.display());
        let samples = load_samples(dataset)?;

        let summary = DatasetSummary::from_samples(&samples);
        info!(
            "Dataset: {} rows, years {}-{}, mean mileage {:.0}, price mean ${:.2} (std {:.2}, min {:.2}, max {:.2})",
            summary.count,
            summary.min_year,
            summary.max_year,
            summary.mean_mileage,
            summary.mean_price,
            summary.std_dev_price,
            summary.min_price,
            summary.max_price
        );

        let (model, evaluation) = self.fit(&samples)?;
        info!("MAE: ${:.2}", evaluation.mae);
        info!("Coefficients: {:?}", model.coefficients);
        info!("Intercept: {:.2}", model.intercept);
        info!("R² (train): {:.4}", evaluation.r_squared);

        let artifact_bytes = model.save(model_path)?;
        let verification_price = verify_artifact(&model, model_path)?;
        info!(
            "Verification prediction ({} mi, {}): ${:.2}",
            VERIFICATION_MILEAGE, VERIFICATION_YEAR, verification_price
        );

        let report = TrainingReport {
            total_rows: samples.len(),
            train_rows: evaluation.train_rows,
            test_rows: evaluation.test_rows,
            mae: evaluation.mae,
            r_squared: evaluation.r_squared,
            coefficients: model.coefficients.clone(),
            intercept: model.intercept,
            verification_price,
            artifact_path: model_path.to_path_buf(),
            artifact_bytes,
        };

        Ok((model, report))
    }
}

/// Reloads the artifact at `path` and checks it predicts the verification
/// vector exactly like the in-memory model. Returns that prediction.
pub fn verify_artifact(model: &LinearRegressionModel, path: &Path) -> Result<f64, MLError> {
    let features = [VERIFICATION_MILEAGE, VERIFICATION_YEAR as f64];
    let expected = model.predict_one(&features)?;

    let reloaded = LinearRegressionModel::load(path)?;
    let actual = reloaded.predict_one(&features)?;

    if expected.to_bits() != actual.to_bits() {
        warn!("Reloaded model diverges from the trained one");
        return Err(MLError::VerificationFailed { expected, actual });
    }

    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::write_samples;
    use std::fs::{self, File};

    fn samples(n: usize) -> Vec<TrainingSample> {
        (0..n)
            .map(|i| {
                let mileage = 3_000.0 * i as f64;
                let model_year = 2005 + (i * 7 % 20) as i32;
                // small deterministic wobble so MAE is not exactly zero
                let wobble = if i % 2 == 0 { 150.0 } else { -150.0 };
                TrainingSample {
                    mileage,
                    model_year,
                    price: 900.0 * (model_year - 2000) as f64 - 0.05 * mileage + 8_000.0 + wobble,
                }
            })
            .collect()
    }

    fn write_dataset(path: &Path, rows: &[TrainingSample]) {
        write_samples(File::create(path).unwrap(), rows).unwrap();
    }

    #[test]
    fn fit_reports_split_sizes_and_mae() {
        let trainer = Trainer::new(TrainingConfig::default());
        let (model, evaluation) = trainer.fit(&samples(100)).unwrap();

        assert_eq!(evaluation.test_rows, 20);
        assert_eq!(evaluation.train_rows, 80);
        assert!(evaluation.mae > 0.0 && evaluation.mae < 300.0);
        assert!(model.coefficients[0] < 0.0);
        assert!(model.coefficients[1] > 0.0);
    }

    #[test]
    fn same_seed_gives_same_model() {
        let trainer = Trainer::new(TrainingConfig::default());
        let data = samples(60);
        let (a, eval_a) = trainer.fit(&data).unwrap();
        let (b, eval_b) = trainer.fit(&data).unwrap();

        assert_eq!(a.coefficients, b.coefficients);
        assert_eq!(a.intercept, b.intercept);
        assert_eq!(eval_a, eval_b);
    }

    #[test]
    fn train_and_save_verifies_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("cleaned.csv");
        let model_path = dir.path().join("model.json");
        write_dataset(&dataset, &samples(50));

        let trainer = Trainer::new(TrainingConfig::default());
        let (model, report) = trainer.train_and_save(&dataset, &model_path).unwrap();

        assert!(model_path.exists());
        assert_eq!(report.total_rows, 50);
        assert_eq!(report.train_rows + report.test_rows, 50);
        assert_eq!(report.artifact_bytes, fs::metadata(&model_path).unwrap().len());

        let reloaded = LinearRegressionModel::load(&model_path).unwrap();
        assert_eq!(
            reloaded
                .predict_one(&[VERIFICATION_MILEAGE, VERIFICATION_YEAR as f64])
                .unwrap(),
            report.verification_price
        );
        assert_eq!(reloaded, model);

        let logged = serde_json::to_value(&report).unwrap();
        assert_eq!(logged["total_rows"], serde_json::json!(50));
        assert_eq!(logged["coefficients"].as_array().unwrap().len(), 2);
        assert_eq!(logged["artifact_path"], serde_json::json!(model_path));
    }

    #[test]
    fn verification_detects_a_different_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let trainer = Trainer::new(TrainingConfig::default());
        let (model, _) = trainer.fit(&samples(30)).unwrap();

        let mut tampered = model.clone();
        tampered.intercept += 1.0;
        tampered.save(&path).unwrap();

        assert!(matches!(
            verify_artifact(&model, &path),
            Err(MLError::VerificationFailed { .. })
        ));
    }

    #[test]
    fn missing_dataset_fails() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = Trainer::new(TrainingConfig::default());
        let err = trainer
            .train_and_save(&dir.path().join("none.csv"), &dir.path().join("m.json"))
            .unwrap_err();

        assert!(matches!(err, MLError::Data(_)));
        assert!(!dir.path().join("m.json").exists());
    }
}
