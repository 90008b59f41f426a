//! HTTP client for the gallery API.
//!
//! This is the network boundary the sync cache polls through and the
//! upload pipeline commits through when it runs away from the server.
//! Transport failures, timeouts and 5xx answers all map to
//! [`StoreError::Unavailable`]; a 400 maps to [`StoreError::Validation`].

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::model::{Entry, EntryList, NewEntry};
use crate::store::StoreError;
use crate::sync::EntrySource;
use crate::upload::EntryWriter;

/// Default API address.
pub const DEFAULT_API_URL: &str = "http://localhost:7880";

/// Configuration for [`GalleryClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the gallery daemon.
    pub api_url: String,

    /// Bound on every request.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Default::default()
        }
    }
}

/// Daemon health as reported by `GET /status`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: String,
    pub entries: usize,
    pub blob_sink: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for `/entries` and `/status`.
#[derive(Debug, Clone)]
pub struct GalleryClient {
    http: Client,
    base: String,
}

impl GalleryClient {
    pub fn new(config: ClientConfig) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// `GET /entries`.
    pub async fn list_entries(&self) -> Result<Vec<Entry>, StoreError> {
        let url = format!("{}/entries", self.base);
        let response = self.http.get(&url).send().await.map_err(transport_error)?;
        let response = check_status(response).await?;

        let list: EntryList = response.json().await.map_err(transport_error)?;
        debug!(count = list.entries.len(), "Fetched entries");
        Ok(list.entries)
    }

    /// `POST /entries`.
    pub async fn create_entry(
        &self,
        image_ref: &str,
        caption: Option<&str>,
    ) -> Result<Entry, StoreError> {
        let url = format!("{}/entries", self.base);
        let body = NewEntry {
            image_ref: Some(image_ref.to_string()),
            caption: caption.map(str::to_string),
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        response.json().await.map_err(transport_error)
    }

    /// `GET /status`.
    pub async fn status(&self) -> Result<StatusReport, StoreError> {
        let url = format!("{}/status", self.base);
        let response = self.http.get(&url).send().await.map_err(transport_error)?;
        let response = check_status(response).await?;
        response.json().await.map_err(transport_error)
    }
}

impl EntrySource for GalleryClient {
    async fn fetch_entries(&self) -> Result<Vec<Entry>, StoreError> {
        self.list_entries().await
    }
}

impl EntryWriter for GalleryClient {
    async fn append_entry(&self, image_ref: &str, caption: Option<&str>) -> Result<Entry, StoreError> {
        self.create_entry(image_ref, caption).await
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Unavailable(format!("request timed out: {e}"))
    } else {
        StoreError::Unavailable(e.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or_else(|_| format!("{status}: {}", text.trim()));

    Err(match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => StoreError::Validation(message),
        _ => StoreError::Unavailable(message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = GalleryClient::new(ClientConfig::new("http://host:1/")).unwrap();
        assert_eq!(client.base_url(), "http://host:1");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let client = GalleryClient::new(ClientConfig {
            // Port 9 (discard) on loopback is closed on test hosts.
            api_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let err = client.list_entries().await.unwrap_err();
        assert!(err.is_transient());
    }
}
