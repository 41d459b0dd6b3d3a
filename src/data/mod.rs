pub mod cleaner;
pub mod dataset;

pub use cleaner::DatasetCleaner;
pub use dataset::{load_samples, train_test_split, DatasetSummary, TrainingSample};
