// ABOUTME: Structured error types for provider operations and sync outcomes
// ABOUTME: Separates retryable transport failures from permanent per-item rejections
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result alias used throughout the provider and sync layers.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors produced while talking to the source or destination API.
///
/// The taxonomy matters more than the messages: [`ProviderError::retryable`]
/// drives the session retry loop, and [`ProviderError::is_per_item`] decides
/// whether the sync engine skips one activity or aborts the run.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-level failure (connect, timeout, TLS) or unreadable response.
    #[error("network error talking to {provider}: {source}")]
    Transport {
        /// Provider the request was issued against
        provider: &'static str,
        /// Underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// Server-side failure (5xx) that may succeed on a later attempt.
    #[error("{provider} API returned {status}: {message}")]
    Api {
        /// Provider the request was issued against
        provider: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        message: String,
    },

    /// A request quota window is exhausted.
    #[error("{provider} rate limit exceeded, window resets at {reset_at}")]
    RateLimited {
        /// Provider whose quota is exhausted
        provider: &'static str,
        /// When the exhausted window rolls over
        reset_at: DateTime<Utc>,
    },

    /// Authorization could not be established or restored.
    #[error("{provider} authorization failed: {message}")]
    AuthFailed {
        /// Provider the authorization belongs to
        provider: &'static str,
        /// What went wrong
        message: String,
    },

    /// The activity was recorded without GPS data and cannot become a track.
    #[error("activity {activity_id} has no GPS data")]
    MissingGeoData {
        /// Source-side activity identifier
        activity_id: u64,
    },

    /// No destination sport is mapped for this source activity type.
    #[error("no destination sport mapping for activity type {sport:?}")]
    UnsupportedSport {
        /// Source activity type string
        sport: String,
    },

    /// The destination rejected the payload (4xx); permanent for this item.
    #[error("{provider} rejected the request: {message}")]
    Validation {
        /// Provider that rejected the payload
        provider: &'static str,
        /// Rejection detail from the response body
        message: String,
    },

    /// The provider answered with a body we could not decode.
    #[error("malformed {provider} response: {message}")]
    Decode {
        /// Provider the response came from
        provider: &'static str,
        /// Decoding failure detail
        message: String,
    },
}

impl ProviderError {
    /// Whether the operation may succeed if reissued after a wait.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }

    /// Whether the error condemns a single activity rather than the run.
    #[must_use]
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            Self::MissingGeoData { .. } | Self::UnsupportedSport { .. } | Self::Validation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ProviderError;

    #[test]
    fn five_hundreds_are_retryable() {
        let err = ProviderError::Api {
            provider: "strava",
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.retryable());
        assert!(!err.is_per_item());
    }

    #[test]
    fn validation_is_per_item_not_retryable() {
        let err = ProviderError::Validation {
            provider: "fittrackee",
            message: "unknown sport".into(),
        };
        assert!(!err.retryable());
        assert!(err.is_per_item());
    }
}
