//! HTTP fetcher for the data.gov.in air-quality resource.
//!
//! One call issues one GET with the API key and the `format`/`limit`
//! parameters in the query string, then extracts the `records` array.
//! There is no pagination beyond the page limit and no retry.
//!
//! # Example
//!
//! ```no_run
//! use aqi_core::fetch::{FetchOutcome, Fetcher, DEFAULT_API_URL};
//!
//! # async fn example() -> Result<(), aqi_core::Error> {
//! let fetcher = Fetcher::new(DEFAULT_API_URL, std::env::var("DATA_GOV_API_KEY").ok())?;
//!
//! match fetcher.fetch().await? {
//!     FetchOutcome::Records(batch) => println!("{} records", batch.len()),
//!     FetchOutcome::Empty => println!("nothing new"),
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use aqi_types::{RECORDS_KEY, ReadingBatch};

use crate::error::{Error, Result};

/// Real-time air quality index resource on data.gov.in.
pub const DEFAULT_API_URL: &str =
    "https://api.data.gov.in/resource/3b01bcb8-0b14-4abf-b6f2-c1bfd384ba69";

/// Environment variable conventionally holding the API key.
pub const API_KEY_ENV: &str = "DATA_GOV_API_KEY";

/// Records requested per call.
pub const DEFAULT_PAGE_LIMIT: u32 = 1000;

/// Request timeout applied by [`Fetcher::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A non-empty batch.
    Records(ReadingBatch),
    /// The response was well-formed but carried no records.
    Empty,
}

impl FetchOutcome {
    /// Number of records fetched.
    pub fn len(&self) -> usize {
        match self {
            FetchOutcome::Records(batch) => batch.len(),
            FetchOutcome::Empty => 0,
        }
    }

    /// Returns true for [`FetchOutcome::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, FetchOutcome::Empty)
    }

    /// The fetched batch, empty for [`FetchOutcome::Empty`].
    pub fn into_batch(self) -> ReadingBatch {
        match self {
            FetchOutcome::Records(batch) => batch,
            FetchOutcome::Empty => ReadingBatch::default(),
        }
    }
}

/// Client for one upstream resource.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    limit: u32,
}

impl Fetcher {
    /// Create a fetcher for `base_url`.
    ///
    /// The key is sent as-is; `None` sends an empty `api-key`, which the
    /// upstream API rejects like any other bad key.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(Error::Client)?;

        Self::with_client(base_url, api_key, client)
    }

    /// Create a fetcher with a custom reqwest Client.
    pub fn with_client(base_url: &str, api_key: Option<String>, client: Client) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {}",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            limit: DEFAULT_PAGE_LIMIT,
        })
    }

    /// Override the page limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns true if an API key was provided.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Records requested per call.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn query_params(&self) -> [(&'static str, String); 3] {
        [
            ("api-key", self.api_key.clone().unwrap_or_default()),
            ("format", "json".to_string()),
            ("limit", self.limit.to_string()),
        ]
    }

    /// Fetch one page of records.
    ///
    /// Values are returned exactly as the upstream JSON carried them.
    pub async fn fetch(&self) -> Result<FetchOutcome> {
        info!("Fetching data from: {}", self.base_url);
        if self.api_key.is_none() {
            warn!(
                "No API key configured (set {} or pass --api-key); the request will likely be rejected",
                API_KEY_ENV
            );
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query_params())
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: self.base_url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.network_error(e))?;
        debug!("Received {} bytes", body.len());

        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| Error::Decode {
                url: self.base_url.clone(),
                source: e,
            })?;

        let batch = ReadingBatch::from_response(value)?;
        if batch.is_empty() {
            warn!(
                "No records found in the response. Check the '{}' key in the JSON.",
                RECORDS_KEY
            );
            return Ok(FetchOutcome::Empty);
        }

        info!("Fetched {} records", batch.len());
        Ok(FetchOutcome::Records(batch))
    }

    fn network_error(&self, e: reqwest::Error) -> Error {
        // The request URL carries the key in its query string.
        Error::Network {
            url: self.base_url.clone(),
            source: e.without_url(),
        }
    }
}
