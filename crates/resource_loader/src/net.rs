//! Network fetch primitive.
//!
//! Strategies and [`MemoryDocument`](crate::MemoryDocument) issue requests
//! through the [`Fetcher`] trait. Dropping the returned future aborts the
//! request, which is how timeouts and cancellation stop in-flight transfers.

use anyhow::{Error, anyhow};
use bytes::Bytes;
use futures::FutureExt as _;
use futures::future::BoxFuture;
use reqwest::Client;
use tokio::fs::read as tokio_fs_read;
use url::Url;

/// Completed response: status code and full body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchResponse {
    /// Build a response.
    #[inline]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, 200..=299)
    }
}

/// Asynchronous fetch that can succeed, fail, or be dropped to abort.
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and buffer the whole body.
    ///
    /// # Errors
    ///
    /// Fails when the request cannot be made or the body cannot be read. HTTP
    /// error statuses are returned as responses, not errors.
    fn fetch(&self, url: &Url) -> BoxFuture<'static, Result<FetchResponse, Error>>;
}

/// Fetcher backed by `reqwest` for `http`/`https` and the filesystem for
/// `file` URLs.
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default `reqwest` client.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher around a preconfigured client.
    #[inline]
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> BoxFuture<'static, Result<FetchResponse, Error>> {
        let client = self.client.clone();
        let url = url.clone();
        async move {
            match url.scheme() {
                "http" | "https" => fetch_http(&client, &url).await,
                "file" => fetch_file(&url).await,
                scheme => Err(anyhow!("Unsupported url scheme {scheme}")),
            }
        }
        .boxed()
    }
}

/// # Errors
/// Returns `Err` if the request fails or the body cannot be read.
async fn fetch_http(client: &Client, url: &Url) -> Result<FetchResponse, Error> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| anyhow!("Failed to fetch URL {url}: {err}"))?;
    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|err| anyhow!("Failed to read body of {url}: {err}"))?;
    Ok(FetchResponse { status, body })
}

/// # Errors
/// Returns `Err` if the path is invalid or the file cannot be read.
async fn fetch_file(url: &Url) -> Result<FetchResponse, Error> {
    let path = url
        .to_file_path()
        .map_err(|()| anyhow!("Invalid file path for file url: {url}"))?;
    let data = tokio_fs_read(&path)
        .await
        .map_err(|err| anyhow!("Failed to read {}: {err}", path.display()))?;
    Ok(FetchResponse::new(200, data))
}
