use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("component has been disposed")]
    Disposed,

    #[error("operation was cancelled")]
    Cancelled,

    #[error("downstream handler failed: {0}")]
    Downstream(String),

    #[error("sink failure: {0}")]
    Sink(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Generic(#[from] anyhow::Error),
}

impl Error {
    /// Downstream calls retried by a caller wrapping this crate; everything
    /// else is terminal for the pipeline stage that raised it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Downstream(_))
    }

    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::Disposed => "disposed",
            Error::Cancelled => "cancelled",
            Error::Downstream(_) => "downstream",
            Error::Sink(_) => "sink",
            Error::Internal(_) => "internal",
            Error::Serialization(_) => "serialization",
            Error::Generic(_) => "generic",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
