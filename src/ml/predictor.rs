use std::sync::Arc;
use tracing::debug;

use super::models::LinearRegressionModel;
use crate::error::MLError;

pub const MIN_MILEAGE: f64 = 0.0;
pub const MAX_MILEAGE: f64 = 500_000.0;
pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2030;

pub const SUCCESS_MESSAGE: &str = "Prediction completed successfully";
pub const CLAMPED_MESSAGE: &str = "Prediction adjusted to $0 (minimum value)";

/// A mileage/year pair that has passed range validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleQuery {
    mileage: f64,
    year: i32,
}

impl VehicleQuery {
    pub fn new(mileage: f64, year: i32) -> Result<Self, MLError> {
        // NaN fails the range check as well
        if !(MIN_MILEAGE..=MAX_MILEAGE).contains(&mileage) {
            return Err(MLError::ValidationError(format!(
                "mileage must be between {} and {}, got {}",
                MIN_MILEAGE, MAX_MILEAGE, mileage
            )));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(MLError::ValidationError(format!(
                "year must be between {} and {}, got {}",
                MIN_YEAR, MAX_YEAR, year
            )));
        }
        Ok(Self { mileage, year })
    }

    pub fn mileage(&self) -> f64 {
        self.mileage
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    fn features(&self) -> [f64; 2] {
        [self.mileage, self.year as f64]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceEstimate {
    pub price: f64,
    pub clamped: bool,
}

impl PriceEstimate {
    pub fn message(&self) -> &'static str {
        if self.clamped {
            CLAMPED_MESSAGE
        } else {
            SUCCESS_MESSAGE
        }
    }
}

/// Stateless inference over a shared, read-only model.
#[derive(Debug, Clone)]
pub struct PricePredictor {
    model: Arc<LinearRegressionModel>,
}

impl PricePredictor {
    pub fn new(model: Arc<LinearRegressionModel>) -> Self {
        Self { model }
    }

    /// Rounds the raw prediction to cents and clamps negatives to zero.
    pub fn estimate(&self, query: &VehicleQuery) -> Result<PriceEstimate, MLError> {
        let raw = self.model.predict_one(&query.features())?;
        let price = round_cents(raw);
        debug!(
            "Estimate for {} mi / {}: raw {:.4}, rounded {:.2}",
            query.mileage, query.year, raw, price
        );

        if price < 0.0 {
            Ok(PriceEstimate {
                price: 0.0,
                clamped: true,
            })
        } else {
            Ok(PriceEstimate {
                price,
                clamped: false,
            })
        }
    }
}

/// Rounds to two decimals from the exact binary value, ties to even.
pub fn round_cents(value: f64) -> f64 {
    let rounded = format!("{:.2}", value).parse::<f64>().unwrap_or(value);
    // avoid reporting -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
