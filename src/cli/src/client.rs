//! HTTP client for the TeachTrack API.
//!
//! Every request carries the school host (`Host` header) and, when known,
//! the bearer token. Responses are unwrapped from the `{success, data}`
//! envelope; failures surface the server's error code and message.

use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, HOST};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Success envelope returned by the server.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// A non-2xx answer from the server.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{code} ({status}): {message}")]
    Server {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP {status}: {body}")]
    Unexpected { status: u16, body: String },
}

impl ApiError {
    fn from_body(status: u16, body: String) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => Self::Server {
                status,
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => Self::Unexpected { status, body },
        }
    }
}

/// HTTP client bound to one API URL, school host and token.
pub struct ApiClient {
    client: Client,
    base_url: String,
    host: Option<String>,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, host: Option<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            host,
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn get_query<Q: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.request(Method::PATCH, path).json(body)).await
    }

    /// GET returning the raw JSON body, for unenveloped endpoints like `/health`.
    pub async fn get_raw(&self, path: &str) -> Result<serde_json::Value> {
        let resp = self.dispatch(self.request(Method::GET, path)).await?;
        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }

    // ── internals ──────────────────────────────────────────────────────────

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(host) = &self.host {
            builder = builder.header(HOST, host);
        }
        if let Some(token) = &self.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
    }

    async fn dispatch(&self, builder: RequestBuilder) -> Result<Response> {
        let resp = builder.send().await.context("Request to the API failed")?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::from_body(status.as_u16(), body).into())
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let resp = self.dispatch(builder).await?;
        let envelope: Envelope<T> = resp
            .json()
            .await
            .context("Failed to parse API response")?;
        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_parsing() {
        let body = r#"{"success":false,"error":{"code":"NO_ACCESS","numeric_code":1003,"message":"NO_ACCESS"}}"#;
        let err = ApiError::from_body(403, body.to_string());
        assert_eq!(err.to_string(), "NO_ACCESS (403): NO_ACCESS");

        let err = ApiError::from_body(502, "bad gateway".to_string());
        assert!(matches!(err, ApiError::Unexpected { status: 502, .. }));
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = ApiClient::new("http://localhost:3000/", None, None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
    }
}
