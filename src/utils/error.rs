use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO-fel: {0}")]
    Io(#[from] std::io::Error),

    #[error("Valideringsfel: {0}")]
    Validation(String),

    #[error("Hittades inte: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(format!("{:#}", e))
    }
}

pub type AppResult<T> = Result<T, AppError>;
