//! Throttled HTTP client for the document API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notepress_shared::{AppConfig, NotepressError, Result};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::raw::{PaginatedList, RawBlock, RawPage, SearchResult};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("Notepress/", env!("CARGO_PKG_VERSION"));

/// Header carrying the API version.
const NOTION_VERSION_HEADER: &str = "Notion-Version";

/// Wait used for a 429 response without a usable `Retry-After` header.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// DocumentApi
// ---------------------------------------------------------------------------

/// The three document API calls the content pipeline needs.
///
/// Injected into the fetcher so tests can substitute an in-memory source.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// `POST /v1/search`.
    async fn search(
        &self,
        query: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<PaginatedList<SearchResult>>;

    /// `GET /v1/pages/{id}`.
    async fn retrieve_page(&self, page_id: &str) -> Result<RawPage>;

    /// `GET /v1/blocks/{id}/children`.
    async fn list_block_children(
        &self,
        block_id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<PaginatedList<RawBlock>>;
}

#[async_trait]
impl<T: DocumentApi + ?Sized> DocumentApi for Arc<T> {
    async fn search(
        &self,
        query: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<PaginatedList<SearchResult>> {
        (**self).search(query, page_size, cursor).await
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<RawPage> {
        (**self).retrieve_page(page_id).await
    }

    async fn list_block_children(
        &self,
        block_id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<PaginatedList<RawBlock>> {
        (**self).list_block_children(block_id, page_size, cursor).await
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Runtime client settings, derived from `[notion]` plus the API key.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub notion_version: String,
    pub timeout: Duration,
    pub min_request_interval: Duration,
    pub max_rate_limit_retries: u32,
}

impl ClientConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }
}

impl From<&AppConfig> for ClientConfig {
    fn from(config: &AppConfig) -> Self {
        let notion = &config.notion;
        Self {
            api_key: String::new(),
            base_url: notion.base_url.clone(),
            notion_version: notion.notion_version.clone(),
            timeout: Duration::from_secs(notion.timeout_secs),
            min_request_interval: Duration::from_millis(notion.min_request_interval_ms),
            max_rate_limit_retries: notion.max_rate_limit_retries,
        }
    }
}

// ---------------------------------------------------------------------------
// NotionHttpClient
// ---------------------------------------------------------------------------

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// `reqwest`-backed [`DocumentApi`] with request spacing and 429 backoff.
pub struct NotionHttpClient {
    client: Client,
    base_url: String,
    api_key: String,
    notion_version: String,
    min_interval: Duration,
    max_retries: u32,
    /// When the previous request was sent; held across the spacing sleep so
    /// concurrent callers queue up.
    last_request: Mutex<Option<Instant>>,
}

impl NotionHttpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(NotepressError::config("Notion API key is empty"));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotepressError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            notion_version: config.notion_version,
            min_interval: config.min_request_interval,
            max_retries: config.max_rate_limit_retries,
            last_request: Mutex::new(None),
        })
    }

    /// Sleep until at least `min_interval` has passed since the last request.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T> {
        let url = format!("{}/{path}", self.base_url);
        let mut rate_limited = 0;

        loop {
            self.throttle().await;

            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.api_key)
                .header(NOTION_VERSION_HEADER, &self.notion_version)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| NotepressError::api(format!("{path}: {e}")))?;
            let status = response.status();
            debug!(%method, path, status = status.as_u16(), "document API response");

            if status == StatusCode::TOO_MANY_REQUESTS && rate_limited < self.max_retries {
                rate_limited += 1;
                let wait = retry_after(&response).unwrap_or(DEFAULT_RETRY_AFTER);
                warn!(
                    path,
                    attempt = rate_limited,
                    wait_ms = wait.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                return Err(error_from_response(path, status, response).await);
            }

            return response
                .json::<T>()
                .await
                .map_err(|e| NotepressError::parse(format!("{path}: invalid response body: {e}")));
        }
    }
}

#[async_trait]
impl DocumentApi for NotionHttpClient {
    #[instrument(skip_all, fields(query = %query, cursor = ?cursor))]
    async fn search(
        &self,
        query: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<PaginatedList<SearchResult>> {
        let mut body = json!({ "query": query, "page_size": page_size });
        if let Some(cursor) = cursor {
            body["start_cursor"] = Value::String(cursor.to_string());
        }
        self.send_json(Method::POST, "v1/search", &[], Some(&body))
            .await
    }

    #[instrument(skip_all, fields(page_id = %page_id))]
    async fn retrieve_page(&self, page_id: &str) -> Result<RawPage> {
        self.send_json(Method::GET, &format!("v1/pages/{page_id}"), &[], None)
            .await
    }

    #[instrument(skip_all, fields(block_id = %block_id, cursor = ?cursor))]
    async fn list_block_children(
        &self,
        block_id: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<PaginatedList<RawBlock>> {
        let mut query = vec![("page_size", page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("start_cursor", cursor.to_string()));
        }
        self.send_json(
            Method::GET,
            &format!("v1/blocks/{block_id}/children"),
            &query,
            None,
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `Retry-After` in whole seconds.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

async fn error_from_response(path: &str, status: StatusCode, response: Response) -> NotepressError {
    let body = response
        .json::<ApiErrorBody>()
        .await
        .unwrap_or_default();
    let message = body.message.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });

    NotepressError::ExternalApi {
        status: Some(status.as_u16()),
        code: body.code,
        message: format!("{path}: {message}"),
    }
}
