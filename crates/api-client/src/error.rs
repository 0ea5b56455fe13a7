use reqwest::StatusCode;
use thiserror::Error;

use shopwatch_api_types::ErrorBody;

/// Classified transport failure. Every reqwest or HTTP-status failure is
/// mapped into one of these before it leaves this crate; callers never see
/// a raw transport error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// User-correctable input problem; message and detail are surfaced
    /// verbatim to the user.
    #[error("{message}: {detail}")]
    Validation { message: String, detail: String },
    /// The referenced run does not exist.
    #[error("run not found")]
    NotFound,
    /// Network or server fault. The payload is for diagnostics only and is
    /// never shown to the user verbatim.
    #[error("{0}")]
    Generic(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Generic(err.to_string())
    }
}

/// Classify a non-2xx response from its status and body text.
pub(crate) fn classify(status: StatusCode, body: &str) -> ApiError {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if parsed.is_validation() {
            return ApiError::Validation {
                message: parsed.error.unwrap_or_else(|| "Invalid task".to_string()),
                detail: parsed
                    .detail
                    .unwrap_or_else(|| "Please adjust the task and try again".to_string()),
            };
        }
    }
    if status == StatusCode::NOT_FOUND {
        return ApiError::NotFound;
    }
    ApiError::Generic(format!("{status}: {body}"))
}
