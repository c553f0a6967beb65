//! Secret store client using reqwest.
//!
//! This adapter implements the `SecretStore` port against the config server
//! HTTP API:
//! - `GET  <base>/v1/data?name=<name>`
//! - `GET  <base>/v1/data/<id>`
//! - `POST <base>/v1/data`

use std::time::Duration;

use async_trait::async_trait;
use manifold_application::ports::{SecretStore, StoreError, StoreResponse};
use manifold_domain::GenerationRequest;
use reqwest::{Client, RequestBuilder};
use url::Url;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP secret store client.
///
/// Requests are sent once; there is no retry. Any HTTP status is returned to
/// the caller as a [`StoreResponse`], only transport failures become errors.
#[derive(Debug, Clone)]
pub struct HttpSecretStore {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpSecretStore {
    /// Creates a client for the store at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or cannot carry a path,
    /// or if the HTTP client cannot be created.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(concat!("manifold/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Other(e.to_string()))?;

        Self::with_client(client, base_url, timeout)
    }

    /// Creates a store over an existing reqwest client.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or cannot carry a path.
    pub fn with_client(
        client: Client,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base_url =
            Url::parse(base_url).map_err(|e| StoreError::InvalidUrl(format!("{e}: {base_url}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(format!(
                "cannot be a base URL: {base_url}"
            )));
        }

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Returns the store's base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `<base>/v1/data[/<id>]`.
    fn data_url(&self, id: Option<&str>) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| StoreError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().extend(["v1", "data"]);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<StoreResponse, StoreError> {
        let response = request.send().await.map_err(|e| self.map_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Other(format!("Failed to read body: {e}")))?;

        let mut store_response = StoreResponse::new(status.as_u16(), body);
        if let Some(reason) = status.canonical_reason() {
            store_response = store_response.with_reason(reason);
        }
        Ok(store_response)
    }

    /// Maps reqwest errors to `StoreError`.
    fn map_error(&self, error: &reqwest::Error) -> StoreError {
        if error.is_timeout() {
            return StoreError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            };
        }
        if error.is_connect() {
            return StoreError::Connection(error.to_string());
        }
        StoreError::Other(error.to_string())
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    async fn get_by_name(&self, name: &str) -> Result<StoreResponse, StoreError> {
        let mut url = self.data_url(None)?;
        url.query_pairs_mut().append_pair("name", name);

        tracing::debug!(%url, "GET variable by name");
        self.send(self.client.get(url)).await
    }

    async fn get_by_id(&self, id: &str) -> Result<StoreResponse, StoreError> {
        let url = self.data_url(Some(id))?;

        tracing::debug!(%url, "GET variable by id");
        self.send(self.client.get(url)).await
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<StoreResponse, StoreError> {
        let url = self.data_url(None)?;

        tracing::debug!(%url, name = %request.name, "POST generation request");
        self.send(self.client.post(url).json(request)).await
    }
}
