// src/services/transport.rs

//! HTTP transport seam.
//!
//! The session fetcher only needs "GET a page" and "POST a form", both
//! reporting the URL the response was finally served from after redirects.

use async_trait::async_trait;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;
use crate::utils::http::create_async_client;

/// A fully read response.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    /// URL after following redirects
    pub final_url: Url,
    pub body: Vec<u8>,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Trait for HTTP backends. Implementations share one cookie jar across
/// calls and must be safe for concurrent use.
#[async_trait]
pub trait PageTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<PageResponse>;

    async fn post_form(&self, url: &Url, fields: &[(String, String)]) -> Result<PageResponse>;
}

/// `reqwest` backed transport with a cookie store.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self::with_client(create_async_client(config)?))
    }

    /// Wrap an existing client. It should have its cookie store enabled.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn read(url: &Url, response: reqwest::Response) -> Result<PageResponse> {
        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, e))?
            .to_vec();

        Ok(PageResponse {
            status,
            final_url,
            body,
        })
    }
}

fn transport_error(url: &Url, error: reqwest::Error) -> AppError {
    AppError::Transport {
        url: url.to_string(),
        status: error.status().map(|s| s.as_u16()),
        message: error.to_string(),
    }
}

#[async_trait]
impl PageTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<PageResponse> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;
        Self::read(url, response).await
    }

    async fn post_form(&self, url: &Url, fields: &[(String, String)]) -> Result<PageResponse> {
        let response = self
            .client
            .post(url.clone())
            .form(fields)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;
        Self::read(url, response).await
    }
}
