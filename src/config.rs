use config::builder::DefaultState;
use serde::Deserialize;
use std::{path::PathBuf, str::FromStr};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub log_level: LogLevel,
    pub model: ModelConfig,
    pub labels: LabelsConfig,
}

pub trait Validatable {
    fn get_path(&self) -> PathBuf;

    fn validate(&self) -> Result<(), String> {
        if !self.get_path().exists() {
            return Err(format!("File not found: {:?}", self.get_path()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

fn default_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub onnx_file: String,
    pub model_dir: PathBuf,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_intra_threads() -> usize {
    1
}

fn default_input_size() -> u32 {
    crate::preprocess::DEFAULT_INPUT_SIZE
}

impl Validatable for ModelConfig {
    fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }

    fn validate(&self) -> Result<(), String> {
        if self.num_instances == 0 {
            return Err("model.num_instances must be at least 1".to_string());
        }
        if self.input_size == 0 {
            return Err("model.input_size must be at least 1".to_string());
        }
        if !self.get_path().exists() {
            return Err(format!("Model file not found: {:?}", self.get_path()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelsConfig {
    pub labels_file: String,
    pub labels_dir: PathBuf,
}

impl Validatable for LabelsConfig {
    fn get_path(&self) -> PathBuf {
        self.labels_dir.join(&self.labels_file)
    }
}

/// Selects the `configuration/<name>.yaml` overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    const ALL: [Environment; 2] = [Environment::Local, Environment::Production];

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }

    /// `APP_ENVIRONMENT`, defaulting to `local` when unset.
    pub fn from_env() -> Result<Self, String> {
        std::env::var("APP_ENVIRONMENT").map_or(Ok(Environment::Local), |value| value.parse())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|env| env.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| unsupported("environment", value, Self::ALL.map(Self::as_str)))
    }
}

/// Minimum level for the default tracing filter; `RUST_LOG` overrides it.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    const ALL: [LogLevel; 4] = [LogLevel::Error, LogLevel::Warn, LogLevel::Info, LogLevel::Debug];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| unsupported("log level", value, Self::ALL.map(Self::as_str)))
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

fn unsupported<const N: usize>(kind: &str, value: &str, choices: [&str; N]) -> String {
    format!(
        "`{}` is not a supported {}, expected one of: {}",
        value,
        kind,
        choices.join(", ")
    )
}

/// Loads `configuration/base.yaml`, the environment overlay selected by
/// `APP_ENVIRONMENT`, `APP_*` variables and finally the bare `PORT` variable.
pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;
    let configuration_directory = base_path.join("configuration");

    let environment = Environment::from_env().map_err(config::ConfigError::Message)?;

    let builder = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(format!("{}.yaml", environment.as_str())),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        );
    let builder = apply_port_override(builder, std::env::var("PORT").ok())?;

    let config: Config = builder.build()?.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

fn apply_port_override(
    builder: config::ConfigBuilder<DefaultState>,
    port: Option<String>,
) -> Result<config::ConfigBuilder<DefaultState>, config::ConfigError> {
    match port {
        Some(port) => {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| config::ConfigError::Message(format!("Invalid PORT: {}", port)))?;
            builder.set_override("server.port", port as i64)
        }
        None => Ok(builder),
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        for result in [self.model.validate(), self.labels.validate()] {
            if let Err(e) = result {
                tracing::error!("Configuration validation failed: {}", e);
                return Err(config::ConfigError::Message(e));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
log_level: info
server:
  host: 0.0.0.0
  port: 8000
model:
  model_dir: ./model
  onnx_file: pet_breeds.onnx
  num_instances: 2
labels:
  labels_dir: ./model
  labels_file: class_indices.xlsx
"#;

    fn builder() -> config::ConfigBuilder<DefaultState> {
        config::Config::builder().add_source(config::File::from_str(BASE, config::FileFormat::Yaml))
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: Config = builder().build().unwrap().try_deserialize().unwrap();

        assert_eq!(config.server.get_address(), "0.0.0.0:8000");
        assert_eq!(config.server.body_limit_bytes, 10 * 1024 * 1024);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.model.input_size, 224);
        assert_eq!(config.model.intra_threads, 1);
        assert_eq!(config.model.num_instances, 2);
        assert_eq!(
            config.labels.get_path(),
            PathBuf::from("./model/class_indices.xlsx")
        );
    }

    #[test]
    fn test_port_override() {
        let builder = apply_port_override(builder(), Some("9100".to_string())).unwrap();
        let config: Config = builder.build().unwrap().try_deserialize().unwrap();

        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(apply_port_override(builder(), Some("eighty".to_string())).is_err());
    }

    #[test]
    fn test_missing_model_file_fails_validation() {
        let config: Config = builder().build().unwrap().try_deserialize().unwrap();

        assert!(config.model.validate().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_instances_fails_validation() {
        let model = ModelConfig {
            onnx_file: "pet_breeds.onnx".to_string(),
            model_dir: PathBuf::from("."),
            num_instances: 0,
            intra_threads: 1,
            input_size: 224,
        };

        let err = model.validate().unwrap_err();
        assert!(err.contains("num_instances"));
    }

    #[test]
    fn test_environment_and_log_level_parsing() {
        assert_eq!("PRODUCTION".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!(" local ".parse::<Environment>(), Ok(Environment::Local));
        let err = "staging".parse::<Environment>().unwrap_err();
        assert!(err.contains("local, production"));

        assert_eq!(LogLevel::try_from("Debug".to_string()), Ok(LogLevel::Debug));
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("trace".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_unknown_log_level_fails_deserialization() {
        let builder = builder().set_override("log_level", "verbose").unwrap();
        let err = builder
            .build()
            .unwrap()
            .try_deserialize::<Config>()
            .unwrap_err();

        assert!(err.to_string().contains("verbose"));
    }
}
