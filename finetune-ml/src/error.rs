//! Error types for the finetune-ml crate.

use thiserror::Error;

/// Top-level error type for sweep operations.
#[derive(Debug, Error)]
pub enum FinetuneError {
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Label error: no label in file name '{0}'")]
    Label(String),

    #[error("Unknown model '{name}' in {catalog} catalog")]
    UnknownModel { name: String, catalog: String },

    #[error("Training error: {0}")]
    Training(String),

    #[error("Python runtime error: {0}")]
    Python(String),

    #[error("Tracking error: {0}")]
    Tracking(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),
}

impl FinetuneError {
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn python(msg: impl Into<String>) -> Self {
        Self::Python(msg.into())
    }

    pub fn tracking(msg: impl Into<String>) -> Self {
        Self::Tracking(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn unknown_model(name: impl Into<String>, catalog: impl Into<String>) -> Self {
        Self::UnknownModel {
            name: name.into(),
            catalog: catalog.into(),
        }
    }
}

impl From<figment::Error> for FinetuneError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

pub type Result<T, E = FinetuneError> = std::result::Result<T, E>;
