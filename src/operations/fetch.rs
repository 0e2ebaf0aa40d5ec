use crate::common::errors::CaptureError;
use anyhow::{Context, Result};
use reqwest::{Client, Url};
use std::{future::Future, time::Duration};

/// Something that can retrieve one artifact from a camera.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>, CaptureError>> + Send;
}

/// Plain HTTP GET with a per-request timeout. Any non-2xx status is an error.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>, CaptureError>> + Send {
        let request = self.client.get(url.clone());
        let url = url.clone();
        async move {
            let response = request
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|error| CaptureError::fetch(url.as_str(), error))?;
            let body = response
                .bytes()
                .await
                .map_err(|error| CaptureError::fetch(url.as_str(), error))?;
            Ok(body.to_vec())
        }
    }
}
