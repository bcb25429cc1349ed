use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl CoreError {
    /// Short stable code for log fields and error reports.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::Logging(_) => "LOGGING_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
