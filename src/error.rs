use thiserror::Error;

#[derive(Error, Debug)]
pub enum PescaError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Soft failure: recovered by the next tier or a fallback value.
    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Malformed request: unknown location, bad date or coordinates.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl PescaError {
    /// Expected data-source failures that a fallback tier absorbs.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            PescaError::Http(_)
                | PescaError::Json(_)
                | PescaError::DataSourceUnavailable(_)
                | PescaError::Timeout(_)
                | PescaError::InvalidData(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PescaError>;
