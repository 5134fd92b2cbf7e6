use thiserror::Error;

/// Errors raised while loading database settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("invalid settings file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("settings file error: {0}")]
    Io(#[from] std::io::Error),
}
