use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::models::LinearRegressionModel;
use super::predictor::{PriceEstimate, PricePredictor, VehicleQuery};
use super::trainer::Trainer;
use crate::config::{Config, MissingModelPolicy};
use crate::error::MLError;

/// Where the serving model came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    Artifact,
    TrainedAtStartup,
    Unavailable,
}

/// Holds the process-wide model. Built once at startup, never mutated.
pub struct PriceEngine {
    predictor: Option<PricePredictor>,
    source: ModelSource,
    failure: Option<String>,
}

impl PriceEngine {
    /// Loads the artifact, training it inline when missing and the policy
    /// allows. Any failure leaves the engine in the unavailable state.
    pub async fn new(config: &Config) -> Self {
        let config = config.clone();
        let resolved = tokio::task::spawn_blocking(move || Self::resolve_model(&config)).await;

        match resolved {
            Ok(Ok((model, source))) => {
                info!(
                    "Price engine ready ({:?}): coefficients {:?}, intercept {:.2}",
                    source, model.coefficients, model.intercept
                );
                Self::with_model(model, source)
            }
            Ok(Err(e)) => {
                error!("Price model unavailable: {}", e);
                Self::unavailable(e.to_string())
            }
            Err(e) => {
                error!("Model initialization task failed: {}", e);
                Self::unavailable(e.to_string())
            }
        }
    }

    fn resolve_model(config: &Config) -> Result<(LinearRegressionModel, ModelSource), MLError> {
        match LinearRegressionModel::load(&config.model.path) {
            Ok(model) => Ok((model, ModelSource::Artifact)),
            Err(MLError::ModelNotFound(path)) => match config.model.on_missing {
                MissingModelPolicy::Train => {
                    warn!(
                        "No model at {}, training from {}",
                        path.display(),
                        config.data.cleaned_path.display()
                    );
                    let trainer = Trainer::new(config.training.clone());
                    let (model, report) =
                        trainer.train_and_save(&config.data.cleaned_path, &path)?;
                    info!("Inline training finished, MAE ${:.2}", report.mae);
                    Ok((model, ModelSource::TrainedAtStartup))
                }
                MissingModelPolicy::Fail => Err(MLError::ModelNotFound(path)),
            },
            Err(e) => Err(e),
        }
    }

    pub fn with_model(model: LinearRegressionModel, source: ModelSource) -> Self {
        Self {
            predictor: Some(PricePredictor::new(Arc::new(model))),
            source,
            failure: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            predictor: None,
            source: ModelSource::Unavailable,
            failure: Some(reason.into()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.predictor.is_some()
    }

    pub fn source(&self) -> ModelSource {
        self.source
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn estimate(&self, query: &VehicleQuery) -> Result<PriceEstimate, MLError> {
        let predictor = self.predictor.as_ref().ok_or_else(|| {
            MLError::ModelUnavailable(
                self.failure
                    .clone()
                    .unwrap_or_else(|| "model not loaded".to_string()),
            )
        })?;
        predictor.estimate(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::write_samples;
    use crate::data::TrainingSample;
    use std::fs::File;
    use std::path::Path;

    fn write_dataset(path: &Path) {
        let rows: Vec<TrainingSample> = (0..40)
            .map(|i| TrainingSample {
                mileage: 4_000.0 * i as f64,
                model_year: 2001 + (i * 5 % 24) as i32,
                price: 30_000.0 - 0.07 * 4_000.0 * i as f64 + 400.0 * (i * 5 % 24) as f64,
            })
            .collect();
        write_samples(File::create(path).unwrap(), &rows).unwrap();
    }

    fn config_in(dir: &Path, policy: MissingModelPolicy) -> Config {
        let mut config = Config::default();
        config.model.path = dir.join("model.json");
        config.model.on_missing = policy;
        config.data.cleaned_path = dir.join("cleaned.csv");
        config
    }

    #[tokio::test]
    async fn loads_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), MissingModelPolicy::Fail);
        write_dataset(&config.data.cleaned_path);
        Trainer::new(config.training.clone())
            .train_and_save(&config.data.cleaned_path, &config.model.path)
            .unwrap();

        let engine = PriceEngine::new(&config).await;

        assert!(engine.is_ready());
        assert_eq!(engine.source(), ModelSource::Artifact);
        assert!(engine.failure().is_none());
    }

    #[tokio::test]
    async fn trains_inline_when_artifact_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), MissingModelPolicy::Train);
        write_dataset(&config.data.cleaned_path);

        let engine = PriceEngine::new(&config).await;

        assert!(engine.is_ready());
        assert_eq!(engine.source(), ModelSource::TrainedAtStartup);
        assert!(config.model.path.exists());

        let estimate = engine
            .estimate(&VehicleQuery::new(50_000.0, 2020).unwrap())
            .unwrap();
        assert!(estimate.price >= 0.0);
    }

    #[tokio::test]
    async fn fail_policy_leaves_engine_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), MissingModelPolicy::Fail);
        write_dataset(&config.data.cleaned_path);

        let engine = PriceEngine::new(&config).await;

        assert!(!engine.is_ready());
        assert_eq!(engine.source(), ModelSource::Unavailable);
        assert!(!config.model.path.exists());
        assert!(matches!(
            engine.estimate(&VehicleQuery::new(1.0, 2010).unwrap()),
            Err(MLError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_artifact_is_not_retrained() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), MissingModelPolicy::Train);
        write_dataset(&config.data.cleaned_path);
        std::fs::write(&config.model.path, b"{}").unwrap();

        let engine = PriceEngine::new(&config).await;

        assert!(!engine.is_ready());
        assert!(engine.failure().unwrap().contains("Model loading failed"));
    }

    #[tokio::test]
    async fn training_failure_leaves_engine_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), MissingModelPolicy::Train);

        let engine = PriceEngine::new(&config).await;

        assert!(!engine.is_ready());
        assert!(engine.failure().unwrap().contains("Dataset not found"));
    }
}
