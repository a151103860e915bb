use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum AppError {
    /// A required input array or field is absent. Fatal: nothing is computed.
    #[error("Input shape error: {0}")]
    InputShape(String),

    /// Every row of a required series was dropped during cleaning. Fatal.
    #[error("Empty series: {0}")]
    EmptySeries(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// Alias for convenience
pub type Error = AppError;
