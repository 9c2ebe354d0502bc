//! Error types for aqi-core.

use aqi_types::ParseError;

/// Result type for aqi-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while fetching or ingesting a batch.
///
/// Every variant except [`Error::Store`] is a fetch failure; see
/// [`Error::is_network_failure`]. URLs carried here never include the API key.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configured endpoint is not an HTTP(S) URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// DNS, connect, timeout or body transfer failure.
    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-2xx status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response body is not JSON.
    #[error("Response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response JSON does not have the expected shape.
    #[error("Unexpected response shape: {0}")]
    Shape(#[from] ParseError),

    /// Writing to the store failed.
    #[error("Store write failed: {0}")]
    Store(#[from] aqi_store::Error),
}

impl Error {
    /// Returns true for failures of the fetch step.
    pub fn is_network_failure(&self) -> bool {
        !matches!(self, Error::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classes() {
        let status = Error::Status {
            url: "https://example.test/r".to_string(),
            status: 403,
        };
        assert!(status.is_network_failure());
        assert_eq!(status.to_string(), "https://example.test/r returned HTTP 403");

        let shape = Error::from(ParseError::NotAnObject("an array"));
        assert!(shape.is_network_failure());

        let store = Error::from(aqi_store::Error::InvalidTable("x y".to_string()));
        assert!(!store.is_network_failure());
        assert!(store.to_string().starts_with("Store write failed"));
    }
}
