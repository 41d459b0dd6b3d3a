use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::dataset::{
    parse_year, write_samples, TrainingSample, MILEAGE_COLUMN, PRICE_COLUMN, YEAR_COLUMN,
};
use crate::config::DataConfig;
use crate::error::DataError;

#[derive(Debug, Clone, PartialEq)]
pub struct CleaningReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub output: PathBuf,
}

/// Turns the raw listings export into the three-column training CSV.
#[derive(Debug, Clone)]
pub struct DatasetCleaner {
    min_year: i32,
    max_year: i32,
}

impl DatasetCleaner {
    pub fn new(min_year: i32, max_year: i32) -> Self {
        Self { min_year, max_year }
    }

    pub fn from_config(config: &DataConfig) -> Self {
        Self::new(config.min_year, config.max_year)
    }

    pub fn clean_file(&self, input: &Path, output: &Path) -> Result<CleaningReport, DataError> {
        if !input.exists() {
            return Err(DataError::NotFound(input.to_path_buf()));
        }

        info!("Loading raw dataset from {}", input.display());
        let file = File::open(input)?;
        let (samples, rows_read) = self.clean_reader(BufReader::new(file))?;
        info!("{} raw rows, {} valid after cleaning", rows_read, samples.len());

        if samples.is_empty() {
            return Err(DataError::NoValidRows);
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(output)?);
        write_samples(&mut writer, &samples)?;
        writer.flush()?;

        info!("Cleaned dataset written to {}", output.display());

        Ok(CleaningReport {
            rows_read,
            rows_kept: samples.len(),
            output: output.to_path_buf(),
        })
    }

    /// Returns the surviving samples, in input order, plus the number of rows read.
    pub fn clean_reader<R: Read>(
        &self,
        reader: R,
    ) -> Result<(Vec<TrainingSample>, usize), DataError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers = rdr.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| DataError::MissingColumn(name.to_string()))
        };
        let mileage_idx = column(MILEAGE_COLUMN)?;
        let year_idx = column(YEAR_COLUMN)?;
        let price_idx = column(PRICE_COLUMN)?;

        let mut rows_read = 0;
        let mut samples = Vec::new();

        for record in rdr.records() {
            let record = record?;
            rows_read += 1;

            let sample = self.clean_row(
                record.get(mileage_idx),
                record.get(year_idx),
                record.get(price_idx),
            );

            match sample {
                Some(sample) => samples.push(sample),
                None => debug!("Dropping row {}: {:?}", rows_read, record),
            }
        }

        Ok((samples, rows_read))
    }

    fn clean_row(
        &self,
        mileage: Option<&str>,
        year: Option<&str>,
        price: Option<&str>,
    ) -> Option<TrainingSample> {
        let mileage = parse_digits(mileage?)?;
        let price = parse_digits(price?)?;
        let model_year = parse_year(year?)?;

        let in_range = (self.min_year..=self.max_year).contains(&model_year)
            && mileage >= 0.0
            && price > 0.0;

        in_range.then_some(TrainingSample {
            mileage,
            model_year,
            price,
        })
    }
}

/// Drops every character that is not an ASCII digit: `"$10,300"` becomes `"10300"`.
pub fn strip_non_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn parse_digits(raw: &str) -> Option<f64> {
    let digits = strip_non_digits(raw);
    if digits.is_empty() {
        return None;
    }
    digits.parse::<f64>().ok()
}
