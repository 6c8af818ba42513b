use anyhow::Context;
use serde::de::DeserializeOwned;

use crate::protocol::ErrorBody;

const DEFAULT_ADDR: &str = "127.0.0.1:8000";

/// Thin HTTP client for a running `costkube serve`.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(addr: Option<String>) -> Self {
        let addr = addr
            .or_else(|| std::env::var("COSTKUBE_ADDR").ok())
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        Self {
            http: reqwest::Client::new(),
            base: base_url(&addr),
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let response = self
            .http
            .get(format!("{}{path}", self.base))
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        decode(path, response).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let response = self
            .http
            .post(format!("{}{path}", self.base))
            .query(query)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        decode(path, response).await
    }

    pub async fn get_text(&self, path: &str) -> anyhow::Result<String> {
        let response = self
            .http
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        let response = check_status(path, response).await?;
        response.text().await.context("read response body")
    }
}

fn base_url(addr: &str) -> String {
    let addr = addr.trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}

async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> anyhow::Result<T> {
    let response = check_status(path, response).await?;
    response
        .json::<T>()
        .await
        .with_context(|| format!("decode response from {path}"))
}

async fn check_status(path: &str, response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    anyhow::bail!("{path} failed with status {status}: {message}")
}
