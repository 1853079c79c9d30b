pub mod endpoints;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CircaError, Result};
use crate::types::ApiErrorBody;

/// HTTP client wrapper for the Circa REST API.
///
/// Carries a cookie jar so the `circa_session` cookie set by the server
/// rides along on every subsequent request. The client never reads or
/// writes the cookie itself.
#[derive(Debug, Clone)]
pub struct CircaHttpClient {
    client: Client,
    base_url: String,
}

impl CircaHttpClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET a JSON resource. A 2xx with an undecodable body yields
    /// `Ok(None)`; only non-2xx statuses and transport faults are errors.
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        fallback: &str,
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).send().await?;
        let resp = Self::check_status(resp, fallback).await?;
        Ok(resp.json::<T>().await.ok())
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B, fallback: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.post(&url).json(body).send().await?;
        let resp = Self::check_status(resp, fallback).await?;
        resp.json::<T>().await.map_err(CircaError::Request)
    }

    /// POST a JSON body, discarding any response body.
    pub async fn post_json_ack<B>(&self, path: &str, body: &B, fallback: &str) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.post(&url).json(body).send().await?;
        Self::check_status(resp, fallback).await?;
        Ok(())
    }

    /// POST with no body, discarding any response body.
    pub async fn post_empty(&self, path: &str, fallback: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.post(&url).send().await?;
        Self::check_status(resp, fallback).await?;
        Ok(())
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check_status(resp: Response, fallback: &str) -> Result<Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(CircaError::Api {
            status,
            message: error_message(&body, fallback),
        })
    }
}

/// Extract the server's `{message}` from an error body, falling back to
/// the endpoint-specific default when the body carries none.
fn error_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
