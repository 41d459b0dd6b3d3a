use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

use crate::error::DataError;

pub const MILEAGE_COLUMN: &str = "milage";
pub const YEAR_COLUMN: &str = "model_year";
pub const PRICE_COLUMN: &str = "price";

/// Column order of a cleaned dataset.
pub const CLEANED_COLUMNS: [&str; 3] = [MILEAGE_COLUMN, YEAR_COLUMN, PRICE_COLUMN];

/// One row of the cleaned dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    #[serde(rename = "milage")]
    pub mileage: f64,
    #[serde(deserialize_with = "deserialize_year")]
    pub model_year: i32,
    pub price: f64,
}

impl TrainingSample {
    pub fn features(&self) -> [f64; 2] {
        [self.mileage, self.model_year as f64]
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DatasetSummary {
    pub count: usize,
    pub mean_mileage: f64,
    pub mean_price: f64,
    pub std_dev_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub min_year: i32,
    pub max_year: i32,
}

impl DatasetSummary {
    pub fn from_samples(samples: &[TrainingSample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let prices: Vec<f64> = samples.iter().map(|s| s.price).collect();
        let mileages: Vec<f64> = samples.iter().map(|s| s.mileage).collect();

        Self {
            count: samples.len(),
            mean_mileage: Statistics::mean(&mileages),
            mean_price: Statistics::mean(&prices),
            std_dev_price: if prices.len() > 1 {
                Statistics::std_dev(&prices)
            } else {
                0.0
            },
            min_price: Statistics::min(&prices),
            max_price: Statistics::max(&prices),
            min_year: Iterator::min(samples.iter().map(|s| s.model_year)).unwrap_or_default(),
            max_year: Iterator::max(samples.iter().map(|s| s.model_year)).unwrap_or_default(),
        }
    }
}

/// Parses a model year written either as an integer or as an integral
/// float (`"2015.0"`).
pub fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if let Ok(year) = raw.parse::<i32>() {
        return Some(year);
    }
    year_from_f64(raw.parse::<f64>().ok()?)
}

fn year_from_f64(value: f64) -> Option<i32> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

/// Deserializes a year from an integer, an integral float or a string
/// holding either. Fractional values are rejected.
pub fn deserialize_year<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(YearVisitor)
}

struct YearVisitor;

impl<'de> Visitor<'de> for YearVisitor {
    type Value = i32;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integral year")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i32, E> {
        i32::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i32, E> {
        i32::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<i32, E> {
        year_from_f64(v).ok_or_else(|| E::invalid_value(de::Unexpected::Float(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i32, E> {
        parse_year(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

/// Loads a cleaned dataset, checking that the expected columns are present.
pub fn load_samples(path: &Path) -> Result<Vec<TrainingSample>, DataError> {
    if !path.exists() {
        return Err(DataError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let samples = read_samples(BufReader::new(file))?;
    debug!("Loaded {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

pub fn read_samples<R: Read>(reader: R) -> Result<Vec<TrainingSample>, DataError> {
    let mut rdr = csv::Reader::from_reader(reader);

    let headers = rdr.headers()?.clone();
    for column in CLEANED_COLUMNS {
        if !headers.iter().any(|h| h.trim() == column) {
            return Err(DataError::MissingColumn(column.to_string()));
        }
    }

    let mut samples = Vec::new();
    for result in rdr.deserialize() {
        let sample: TrainingSample = result?;
        samples.push(sample);
    }

    Ok(samples)
}

pub fn write_samples<W: std::io::Write>(
    writer: W,
    samples: &[TrainingSample],
) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for sample in samples {
        wtr.serialize(sample)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Seeded shuffle split. The first `ceil(test_size * n)` indices of the
/// permutation form the test set, the remainder the training set.
pub fn train_test_split(
    samples: &[TrainingSample],
    test_size: f64,
    seed: u64,
) -> Result<(Vec<TrainingSample>, Vec<TrainingSample>), DataError> {
    let n = samples.len();
    let n_test = (test_size * n as f64).ceil() as usize;

    if n < 2 || n_test == 0 || n_test >= n {
        return Err(DataError::InsufficientData {
            required: 2,
            found: n,
        });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    let train = train_idx.iter().map(|&i| samples[i]).collect();
    let test = test_idx.iter().map(|&i| samples[i]).collect();

    Ok((train, test))
}
