//! Shared HTTP plumbing: retries on gateway errors and status checking

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;

use crate::application::errors::ApiError;

/// Statuses that usually mean the server is restarting
const RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for every next one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 10, base_delay: Duration::from_secs(5) }
    }
}

/// Status code and decoded JSON body. An empty body decodes as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// String field of the body
    pub fn str_field(&self, name: &str) -> Result<&str, ApiError> {
        self.body
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Json(format!("no string {:?} in {}", name, self.body)))
    }

    pub fn i64_field(&self, name: &str) -> Result<i64, ApiError> {
        self.body
            .get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| ApiError::Json(format!("no integer {:?} in {}", name, self.body)))
    }
}

enum Payload<'a> {
    Empty,
    Form(&'a [(&'a str, String)]),
    Json(&'a Value),
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    retry: RetryPolicy,
    headers: Vec<(String, String)>,
}

impl ApiClient {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { client: Client::new(), retry, headers: Vec::new() }
    }

    /// Header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// GET; only statuses in `expected` are accepted
    pub async fn get(&self, url: &str, query: &[(&str, String)], expected: &[u16]) -> Result<ApiResponse, ApiError> {
        self.request(Method::GET, url, query, Payload::Empty, expected).await
    }

    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, String)],
        expected: &[u16],
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::POST, url, &[], Payload::Form(form), expected).await
    }

    pub async fn post_json(&self, url: &str, body: &Value, expected: &[u16]) -> Result<ApiResponse, ApiError> {
        self.request(Method::POST, url, &[], Payload::Json(body), expected).await
    }

    fn build(&self, method: &Method, url: &str, query: &[(&str, String)], payload: &Payload<'_>) -> RequestBuilder {
        let mut request = self.client.request(method.clone(), url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        match payload {
            Payload::Empty => request,
            Payload::Form(form) => request.form(form),
            Payload::Json(body) => request.json(body),
        }
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        payload: Payload<'_>,
        expected: &[u16],
    ) -> Result<ApiResponse, ApiError> {
        let mut attempts = 0;
        let mut delay = self.retry.base_delay;

        let response = loop {
            let response = self
                .build(&method, url, query, &payload)
                .send()
                .await
                .map_err(|e| ApiError::Request(format!("{} {}: {}", method, url, e)))?;
            attempts += 1;

            let status = response.status().as_u16();
            if !RETRY_STATUSES.contains(&status) {
                break response;
            }
            if attempts >= self.retry.max_attempts {
                return Err(ApiError::Exhausted { url: url.to_string(), attempts });
            }
            if attempts == 1 {
                tracing::warn!("{} {} returned {}, retrying in {:?}", method, url, status, delay);
            } else {
                tracing::debug!("{} {} returned {} (attempt {}), retrying in {:?}", method, url, status, attempts, delay);
            }
            tokio::time::sleep(delay).await;
            delay *= 2;
        };

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request(format!("{} {}: {}", method, url, e)))?;
        tracing::debug!("{} {} -> {}", method, url, status);

        if !expected.contains(&status) {
            return Err(ApiError::UnexpectedStatus { status, url: url.to_string(), body: text });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Json(format!("{}: {}", url, e)))?
        };
        Ok(ApiResponse { status, body })
    }
}
