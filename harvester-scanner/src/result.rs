use std::fmt;

/// Outcome of one logical fetch, after throttling and retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(Vec<u8>),
    /// Every attempt timed out. The caller must not retry it again within
    /// the same run.
    TransientFailure(String),
    PermanentFailure(String),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// Raw body on success, failure reason otherwise.
    pub fn into_body(self) -> Result<Vec<u8>, String> {
        match self {
            FetchOutcome::Success(body) => Ok(body),
            FetchOutcome::TransientFailure(reason) => Err(format!("retries exhausted: {}", reason)),
            FetchOutcome::PermanentFailure(reason) => Err(reason),
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Success(body) => write!(f, "success ({} bytes)", body.len()),
            FetchOutcome::TransientFailure(reason) => write!(f, "transient failure: {}", reason),
            FetchOutcome::PermanentFailure(reason) => write!(f, "permanent failure: {}", reason),
        }
    }
}
