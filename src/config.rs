use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const ENV_PREFIX: &str = "CARPRICE";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub data: DataConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    /// Refuse to start when no model could be loaded or trained.
    pub require_model: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub on_missing: MissingModelPolicy,
}

/// What the service does at startup when the artifact does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingModelPolicy {
    #[default]
    Train,
    Fail,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    pub raw_path: PathBuf,
    pub cleaned_path: PathBuf,
    pub min_year: i32,
    pub max_year: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_size: f64,
    pub seed: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_allowed_origins: vec!["*".to_string()],
            require_model: false,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("modelo_precios.json"),
            on_missing: MissingModelPolicy::Train,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("used_car_prices.csv"),
            cleaned_path: PathBuf::from("used_car_prices_limpio.csv"),
            min_year: 2000,
            max_year: 2025,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
        }
    }
}

impl Config {
    /// Layers defaults, the optional TOML file at `path` and `CARPRICE__*`
    /// environment variables, in that order.
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    /// Comma-separated values are accepted for list keys, e.g.
    /// `CARPRICE__SERVER__CORS_ALLOWED_ORIGINS=https://a.example,https://b.example`.
    fn load_with_env_prefix(path: &str, env_prefix: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_allowed_origins"),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {}", path))?;

        let config: Config = settings
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.training.test_size > 0.0 && self.training.test_size < 1.0) {
            anyhow::bail!(
                "training.test_size must be between 0 and 1, got {}",
                self.training.test_size
            );
        }
        if self.data.min_year > self.data.max_year {
            anyhow::bail!(
                "data.min_year ({}) is greater than data.max_year ({})",
                self.data.min_year,
                self.data.max_year
            );
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let config = Config::load(path.to_str().unwrap()).unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.model.on_missing, MissingModelPolicy::Train);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.data.min_year, 2000);
        assert_eq!(config.data.max_year, 2025);
    }

    #[test]
    fn file_overrides_selected_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[server]\nport = 9100\n\n[model]\npath = \"artifacts/model.json\"\non_missing = \"fail\"\n"
        )
        .unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.model.path, PathBuf::from("artifacts/model.json"));
        assert_eq!(config.model.on_missing, MissingModelPolicy::Fail);
        assert_eq!(config.training.test_size, 0.2);
    }

    #[test]
    fn environment_overrides_file_and_defaults() {
        // own prefix so other tests never see these variables
        let prefix = "CARPRICE_ENVTEST";
        std::env::set_var("CARPRICE_ENVTEST__SERVER__PORT", "9001");
        std::env::set_var("CARPRICE_ENVTEST__MODEL__ON_MISSING", "fail");
        std::env::set_var(
            "CARPRICE_ENVTEST__SERVER__CORS_ALLOWED_ORIGINS",
            "https://a.example,https://b.example",
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        std::fs::write(&path, "[server]\nport = 9100\nhost = \"127.0.0.1\"\n").unwrap();

        let config = Config::load_with_env_prefix(path.to_str().unwrap(), prefix).unwrap();

        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.model.on_missing, MissingModelPolicy::Fail);
        assert_eq!(
            config.server.cors_allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn single_origin_from_environment_is_a_one_element_list() {
        let prefix = "CARPRICE_ORIGIN";
        std::env::set_var("CARPRICE_ORIGIN__SERVER__CORS_ALLOWED_ORIGINS", "https://a.example");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let config = Config::load_with_env_prefix(path.to_str().unwrap(), prefix).unwrap();

        assert_eq!(config.server.cors_allowed_origins, vec!["https://a.example"]);
    }

    #[test]
    fn rejects_degenerate_test_size() {
        let mut config = Config::default();
        config.training.test_size = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn renders_as_toml() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[server]"));
        assert!(rendered.contains("on_missing = \"train\""));
    }
}
