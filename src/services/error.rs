//! Error types for backend calls and logging helpers for best-effort paths

use std::fmt;

use log::warn;
use reqwest::StatusCode;

/// Errors that can occur while talking to the scheduling API.
#[derive(Debug)]
pub enum ApiError {
    Http(reqwest::Error),
    UnexpectedStatus { status: StatusCode, body: String },
    Decode(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Http(err) => write!(f, "http error: {err}"),
            ApiError::UnexpectedStatus { status, body } => {
                write!(f, "unexpected status {status}: {body}")
            }
            ApiError::Decode(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        ApiError::Http(value)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::Decode(value.to_string())
    }
}

/// Extension trait for logging errors with context
pub trait LogErr<T>: Sized {
    /// Log the error at warn level and discard it
    fn log_warn(self, context: &str) -> Option<T>;

    /// Log the error at warn level and hand it back unchanged
    fn log_context(self, context: &str) -> Self;
}

impl<T, E: fmt::Display> LogErr<T> for Result<T, E> {
    fn log_warn(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{}: {}", context, e);
                None
            }
        }
    }

    fn log_context(self, context: &str) -> Self {
        self.inspect_err(|e| warn!("{}: {}", context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_warn_keeps_ok_and_drops_err() {
        let ok: Result<u8, ApiError> = Ok(3);
        assert_eq!(ok.log_warn("ctx"), Some(3));

        let err: Result<u8, ApiError> = Err(ApiError::Decode("bad".into()));
        assert_eq!(err.log_warn("ctx"), None);
    }

    #[test]
    fn log_context_passes_the_error_through() {
        let err: Result<u8, ApiError> = Err(ApiError::Decode("bad".into()));
        let logged = err.log_context("ctx");
        assert!(matches!(logged, Err(ApiError::Decode(msg)) if msg == "bad"));

        let ok: Result<u8, ApiError> = Ok(1);
        assert_eq!(ok.log_context("ctx").ok(), Some(1));
    }

    #[test]
    fn unexpected_status_display_names_status_and_body() {
        let err = ApiError::UnexpectedStatus {
            status: StatusCode::BAD_GATEWAY,
            body: "upstream down".into(),
        };
        assert_eq!(err.to_string(), "unexpected status 502 Bad Gateway: upstream down");
    }
}
