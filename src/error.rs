use thiserror::Error;

/// Failures raised by the metrics, sampling and codebook code.
///
/// Commands wrap these in `anyhow` with context; none of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("dataset is empty")]
    EmptyDataset,

    #[error("label sequences differ in length: {true_len} true vs {predicted_len} predicted")]
    LengthMismatch {
        true_len: usize,
        predicted_len: usize,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ReviewError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub type ReviewResult<T> = std::result::Result<T, ReviewError>;
