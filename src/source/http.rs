//! HTTP source
//!
//! Fetches `<base_url><percent-encoded file name>` with a plain GET.
//! No retries and no timeout are applied here.

use async_trait::async_trait;

use super::{CsvSource, FetchError};

/// Fetches CSV files over HTTP from a fixed base URL
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    /// Create a source for files served under `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for a file name
    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}{}", self.base_url, urlencoding::encode(file_name))
    }
}

#[async_trait]
impl CsvSource for HttpSource {
    async fn fetch(&self, file_name: &str) -> Result<String, FetchError> {
        let url = self.url_for(file_name);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::transient(file_name, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(FetchError::NotFound(file_name.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::transient(
                file_name,
                format!("HTTP error! status: {}", status),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::transient(file_name, e))
    }

    fn describe(&self) -> String {
        format!("http {}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encoding() {
        let source = HttpSource::new("http://localhost:3000/csv");
        assert_eq!(source.base_url(), "http://localhost:3000/csv/");
        assert_eq!(
            source.url_for("Player Per Game.csv"),
            "http://localhost:3000/csv/Player%20Per%20Game.csv"
        );
    }

    #[tokio::test]
    async fn test_connection_failure_is_transient() {
        // Port 9 (discard) is closed on test hosts
        let source = HttpSource::new("http://127.0.0.1:9/csv/");
        let err = source.fetch("game.csv").await.unwrap_err();
        assert!(err.is_transient());
    }
}
