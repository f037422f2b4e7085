use thiserror::Error;

/// Structural failures while turning a page into data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Insufficient rows: {0}")]
    InsufficientRows(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Raw transport failures, classified once so the fetcher can decide
/// whether another attempt is worth it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Request failed: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
