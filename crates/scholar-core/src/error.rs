use thiserror::Error;

/// Top-level error type for Scholar configuration and setup.
#[derive(Error, Debug)]
pub enum ScholarError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid setting `{key}`: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Schema registry already initialised")]
    SchemaAlreadyInstalled,
}

pub type Result<T> = std::result::Result<T, ScholarError>;
