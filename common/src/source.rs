// Submission source backed by the AtCoder Problems API

use crate::config::ApiConfig;
use crate::errors::FetchError;
use crate::models::Submission;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// SubmissionSource fetches a user's submissions made at or after a cursor
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    /// Fetch submissions for `user_id` since `since` (epoch seconds).
    ///
    /// `None` means the user was never checked; the source then applies its own
    /// lookback window instead of returning the full history.
    async fn fetch(&self, user_id: &str, since: Option<i64>)
        -> Result<Vec<Submission>, FetchError>;
}

/// HTTP client for `GET /v3/user/submissions`
pub struct AtCoderProblemsClient {
    client: Client,
    base_url: String,
    timeout_seconds: u64,
    lookback_seconds: i64,
}

impl AtCoderProblemsClient {
    /// Create a client from API settings
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).map_err(|e| {
                FetchError::ClientBuild(format!("Invalid user agent: {}", e))
            })?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ja,en-US;q=0.9,en;q=0.8"),
        );

        // gzip, deflate and brotli bodies are decoded by reqwest
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                FetchError::ClientBuild(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_seconds: config.timeout_seconds,
            lookback_seconds: config.lookback_seconds as i64,
        })
    }

    /// Lower bound sent as `from_second`
    fn from_second(&self, since: Option<i64>) -> i64 {
        since.unwrap_or_else(|| Utc::now().timestamp() - self.lookback_seconds)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout_seconds)
        } else {
            FetchError::from(err)
        }
    }
}

#[async_trait]
impl SubmissionSource for AtCoderProblemsClient {
    #[instrument(skip(self))]
    async fn fetch(
        &self,
        user_id: &str,
        since: Option<i64>,
    ) -> Result<Vec<Submission>, FetchError> {
        let from_second = self.from_second(since);
        let url = format!("{}/v3/user/submissions", self.base_url);
        debug!(url = %url, from_second, "Fetching submissions");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("user", user_id.to_string()),
                ("from_second", from_second.to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // Unknown user or nothing in the window
            debug!("API returned 404, treating as no submissions");
            return Ok(Vec::new());
        }
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let submissions: Vec<Submission> =
            serde_json::from_slice(&body).map_err(|e| FetchError::Parse(e.to_string()))?;

        info!(count = submissions.len(), from_second, "Fetched submissions");
        Ok(submissions)
    }
}

/// Stable ascending sort by submission time; ties keep their fetched order
pub fn sort_by_time(submissions: &mut [Submission]) {
    submissions.sort_by_key(|s| s.epoch_second);
}

/// Accepted submissions only, in their current order
pub fn filter_accepted(submissions: &[Submission]) -> Vec<&Submission> {
    submissions.iter().filter(|s| s.is_accepted()).collect()
}
