//! Error types for consilium-llm

use thiserror::Error;

/// Errors that can occur while calling a text-generation backend.
///
/// Every variant is recoverable at the call site: callers convert it into a
/// text description rather than aborting the request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// The external backend needs an API key and none was configured
    #[error("an API key is required for external generation (set TOGETHER_API_KEY)")]
    MissingApiKey,

    /// The backend rejected the credentials
    #[error("authentication failed: check your API key")]
    Authentication,

    /// The backend is throttling requests
    #[error("rate limit exceeded")]
    RateLimited,

    /// The backend could not be reached
    #[error("connection to generation backend failed: {0}")]
    Connection(String),

    /// Non-success HTTP status not covered by a dedicated variant
    #[error("generation backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend answered with a payload we could not interpret
    #[error("malformed generation response: {0}")]
    MalformedResponse(String),

    /// No backend is configured for the requested mode
    #[error("no generation backend configured for mode '{0}'")]
    UnsupportedMode(String),

    /// Any other transport error
    #[error("HTTP error: {0}")]
    Http(String),
}

impl GenerationError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => GenerationError::Authentication,
            429 => GenerationError::RateLimited,
            _ => GenerationError::Status { status, body },
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            GenerationError::Connection(err.to_string())
        } else if err.is_decode() {
            GenerationError::MalformedResponse(err.to_string())
        } else {
            GenerationError::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_401_and_403_map_to_authentication() {
        assert_eq!(
            GenerationError::from_status(401, String::new()),
            GenerationError::Authentication
        );
        assert_eq!(
            GenerationError::from_status(403, "forbidden".to_string()),
            GenerationError::Authentication
        );
    }

    #[test]
    fn test_status_429_maps_to_rate_limited() {
        assert_eq!(
            GenerationError::from_status(429, "slow down".to_string()),
            GenerationError::RateLimited
        );
    }

    #[test]
    fn test_other_status_keeps_code_and_body() {
        let err = GenerationError::from_status(503, "overloaded".to_string());
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("overloaded"));
    }
}
