use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod data;
mod error;
mod ml;
mod web;

use crate::config::Config;
use crate::data::DatasetCleaner;
use crate::ml::{LinearRegressionModel, PriceEngine, PricePredictor, Trainer, VehicleQuery};
use crate::web::{ApiServer, AppState};

#[derive(Parser)]
#[command(name = "car-price-service")]
#[command(about = "Used car price prediction: dataset cleaning, model training and HTTP serving")]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the prediction API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        /// Model artifact to load
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Clean the raw listings CSV into the three-column training set
    Clean {
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Train the regression model and write the artifact
    Train {
        /// Cleaned dataset
        #[arg(long)]
        data: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Estimate a single price from the saved artifact
    Predict {
        #[arg(long)]
        mileage: f64,

        #[arg(long)]
        year: i32,

        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Command::Serve { host, port, model } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(model) = model {
                config.model.path = model;
            }
            serve(config).await
        }
        Command::Clean { input, output } => {
            let input = input.unwrap_or_else(|| config.data.raw_path.clone());
            let output = output.unwrap_or_else(|| config.data.cleaned_path.clone());

            let report = DatasetCleaner::from_config(&config.data)
                .clean_file(&input, &output)
                .with_context(|| format!("cleaning {} failed", input.display()))?;

            info!(
                "Cleaned dataset ready: {} of {} rows kept, columns milage, model_year, price -> {}",
                report.rows_kept,
                report.rows_read,
                report.output.display()
            );
            Ok(())
        }
        Command::Train { data, output } => {
            let data = data.unwrap_or_else(|| config.data.cleaned_path.clone());
            let output = output.unwrap_or_else(|| config.model.path.clone());

            let (_, report) = Trainer::new(config.training.clone())
                .train_and_save(&data, &output)
                .context("training failed")?;

            info!(
                "Model trained on {} rows (MAE ${:.2}) and verified at {}",
                report.train_rows,
                report.mae,
                report.artifact_path.display()
            );
            debug!("Training report: {}", serde_json::to_string(&report)?);
            Ok(())
        }
        Command::Predict {
            mileage,
            year,
            model,
        } => {
            let path = model.unwrap_or_else(|| config.model.path.clone());
            let model = LinearRegressionModel::load(&path)?;
            let query = VehicleQuery::new(mileage, year)?;
            let estimate = PricePredictor::new(Arc::new(model)).estimate(&query)?;

            println!("Estimated price: ${:.2}", estimate.price);
            if estimate.clamped {
                println!("{}", estimate.message());
            }
            Ok(())
        }
        Command::ShowConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting used car price service");

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus recorder unavailable: {}", e);
            None
        }
    };

    let engine = Arc::new(PriceEngine::new(&config).await);
    if !engine.is_ready() {
        if config.server.require_model {
            anyhow::bail!(
                "no model available: {}",
                engine.failure().unwrap_or("unknown error")
            );
        }
        warn!("Serving without a model; /predecir will answer 503");
    }

    let server = ApiServer::new(config.server.clone(), AppState::new(engine, metrics));
    server.start().await
}
