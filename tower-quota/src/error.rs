use std::time::Duration;

use quota_bucket::Reason;

/// Errors produced by the quota middleware.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaError {
    /// The client's quota is exhausted.
    ///
    /// When the `axum` feature is enabled, this converts to `429 Too Many Requests`
    /// with `Retry-After` and `X-RateLimit-Limit` headers.
    #[error("Too many requests..")]
    QuotaExceeded {
        /// The bucket capacity for the client.
        limit: usize,
        /// The duration to wait before retrying.
        retry_after: Duration,
    },

    /// An unexpected error occurred in the inner service.
    ///
    /// The string contains the `Display` representation of the inner error.
    /// When the `axum` feature is enabled, this converts to `500 Internal Server Error`.
    #[error("Internal service error: {0}")]
    Inner(String),
}

impl From<Reason> for QuotaError {
    fn from(reason: Reason) -> Self {
        match reason {
            Reason::QuotaExceeded { limit, retry_after } => {
                Self::QuotaExceeded { limit, retry_after }
            }
        }
    }
}

#[cfg(feature = "axum")]
impl QuotaError {
    /// `Retry-After` (at least one second) and `X-RateLimit-Limit` for a
    /// rejection; empty for any other error.
    pub fn rate_limit_headers(&self) -> axum::http::HeaderMap {
        use axum::http::HeaderMap;
        use axum::http::HeaderName;
        use axum::http::HeaderValue;

        let mut headers = HeaderMap::new();
        if let Self::QuotaExceeded { limit, retry_after } = self {
            let secs = retry_after.as_secs().max(1);
            headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(secs));
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(*limit),
            );
        }
        headers
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for QuotaError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match self {
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Inner(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.rate_limit_headers(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reason() {
        let reason = Reason::QuotaExceeded {
            limit: 5,
            retry_after: Duration::from_secs(1),
        };

        assert_eq!(
            QuotaError::from(reason),
            QuotaError::QuotaExceeded {
                limit: 5,
                retry_after: Duration::from_secs(1),
            }
        );
    }

    #[cfg(feature = "axum")]
    #[test]
    fn test_quota_exceeded_response() {
        use axum::http::StatusCode;
        use axum::response::IntoResponse;

        let response = QuotaError::QuotaExceeded {
            limit: 10,
            retry_after: Duration::ZERO,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "1");
        assert_eq!(response.headers()["x-ratelimit-limit"], "10");
    }

    #[cfg(feature = "axum")]
    #[test]
    fn test_inner_error_response_has_no_quota_headers() {
        use axum::http::StatusCode;
        use axum::response::IntoResponse;

        let err = QuotaError::Inner("boom".to_owned());
        assert!(err.rate_limit_headers().is_empty());

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get("retry-after").is_none());
    }
}
