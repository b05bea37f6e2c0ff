//! Dataset loading from a local path or an HTTP(S) URL.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Request, Response};
use tracing::debug;

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Plain `reqwest` client with no authentication.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Self {
        Self(reqwest::Client::new())
    }
}

impl Default for BasicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        self.0.execute(req).await
    }
}

/// True for locations that should be fetched over HTTP.
pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// GETs `url` and returns the body. Non-2xx responses are errors.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        bail!("GET {url} returned {status}");
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Reads a dataset from `location`, which is either a file path or a URL.
#[tracing::instrument(skip(client))]
pub async fn read_source<C: HttpClient>(client: &C, location: &str) -> Result<Vec<u8>> {
    let bytes = if is_remote(location) {
        fetch_bytes(client, location).await?
    } else {
        std::fs::read(location).with_context(|| format!("failed to read '{location}'"))?
    };
    debug!(bytes = bytes.len(), "Dataset loaded");
    Ok(bytes)
}
