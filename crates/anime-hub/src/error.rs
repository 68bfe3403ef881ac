//! Error taxonomy for source adapters and the aggregator.

use shared::Source;
use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Query rejected before any network call
    #[error("Query must be at least {min_length} characters")]
    InvalidInput { min_length: usize },

    /// Local request budget exhausted, or the upstream answered 429
    #[error("Too many requests to {api}, retry later")]
    RateLimitExceeded { api: Source },

    #[error("{api} returned HTTP {status}: {body}")]
    UpstreamHttp {
        api: Source,
        status: u16,
        body: String,
    },

    /// Payload was malformed or carried an error envelope
    #[error("{api} returned an unusable payload: {message}")]
    UpstreamData { api: Source, message: String },

    #[error("Request to {api} failed: {error}")]
    Transport {
        api: Source,
        #[source]
        error: reqwest::Error,
    },

    #[error("{api} does not support {operation}")]
    Unsupported {
        api: Source,
        operation: &'static str,
    },

    /// Every source of a fan-out search failed
    #[error("Search failed on every source: {}", join_errors(.failures))]
    SearchFailed { failures: Vec<ApiError> },

    #[error("Unable to fetch details: {cause}")]
    DetailsFailed {
        #[source]
        cause: Box<ApiError>,
    },
}

impl ApiError {
    /// Whether retrying later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimitExceeded { .. } => true,
            ApiError::SearchFailed { failures } => failures.iter().any(ApiError::is_retryable),
            ApiError::DetailsFailed { cause } => cause.is_retryable(),
            _ => false,
        }
    }

    /// Source the error originated from, when it is tied to one
    pub fn source_api(&self) -> Option<Source> {
        match self {
            ApiError::RateLimitExceeded { api }
            | ApiError::UpstreamHttp { api, .. }
            | ApiError::UpstreamData { api, .. }
            | ApiError::Transport { api, .. }
            | ApiError::Unsupported { api, .. } => Some(*api),
            ApiError::DetailsFailed { cause } => cause.source_api(),
            ApiError::InvalidInput { .. } | ApiError::SearchFailed { .. } => None,
        }
    }

    pub(crate) fn data(api: Source, message: impl Into<String>) -> Self {
        ApiError::UpstreamData {
            api,
            message: message.into(),
        }
    }
}

fn join_errors(errors: &[ApiError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
