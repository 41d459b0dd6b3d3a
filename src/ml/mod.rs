pub mod engine;
pub mod models;
pub mod predictor;
pub mod trainer;

pub use engine::{ModelSource, PriceEngine};
pub use models::LinearRegressionModel;
pub use predictor::{PricePredictor, VehicleQuery};
pub use trainer::Trainer;
