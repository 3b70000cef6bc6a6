use std::time::Duration;

use futures::{future::BoxFuture, FutureExt};
use reqwest::{header, Url};

use crate::error::FetchError;

/// What the fetcher needs from an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Date` header, if the server sent one.
    pub date: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait HttpClient: Send + Sync + 'static {
    fn get(&self, url: Url) -> BoxFuture<'_, Result<HttpResponse, FetchError>>;
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(ReqwestClient { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        ReqwestClient { client }
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: Url) -> BoxFuture<'_, Result<HttpResponse, FetchError>> {
        async move {
            log::debug!("GET {}", url);
            let response = self
                .client
                .get(url)
                .header(header::CACHE_CONTROL, "no-store")
                .send()
                .await?;
            let status = response.status().as_u16();
            let date = response
                .headers()
                .get(header::DATE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let body = response.bytes().await?.to_vec();
            Ok(HttpResponse { status, date, body })
        }
        .boxed()
    }
}
