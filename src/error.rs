use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Dataset not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    #[error("No valid rows left after cleaning")]
    NoValidRows,

    #[error("Insufficient data: need at least {required} rows, found {found}")]
    InsufficientData {
        required: usize,
        found: usize,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum MLError {
    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Model loading failed: {0}")]
    ModelLoadError(String),

    #[error("Model saving failed: {0}")]
    ModelSaveError(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Inference failed: {0}")]
    InferenceError(String),

    #[error("Training failed: {0}")]
    TrainingError(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Artifact verification failed: expected {expected}, reloaded model gave {actual}")]
    VerificationFailed {
        expected: f64,
        actual: f64,
    },

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Errors surfaced by the HTTP layer. Each one ends the request that raised it.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Model not available. Contact the administrator.")]
    ModelUnavailable,

    #[error("Error performing prediction: {0}")]
    Inference(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::ModelUnavailable => "model_unavailable",
            ApiError::Inference(_) => "inference_error",
        }
    }
}

impl From<MLError> for ApiError {
    fn from(err: MLError) -> Self {
        match err {
            MLError::ValidationError(msg) => ApiError::Validation(msg),
            MLError::ModelUnavailable(_) => ApiError::ModelUnavailable,
            other => ApiError::Inference(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.kind().to_string(),
            detail: Some(self.to_string()),
        };
        (self.status(), Json(body)).into_response()
    }
}
