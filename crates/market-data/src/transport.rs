//! HTTP transport - trait and implementations
//!
//! Adapters only see [`HttpClient`], so tests can script responses with
//! [`MockHttpClient`] instead of touching the network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use thiserror::Error;

/// A GET request against a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    /// Value of a query parameter, if set
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request never produced a response
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

/// Client trait for provider HTTP access
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

// ==================== Reqwest Implementation ====================

/// reqwest-backed client with a per-request timeout
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Fails when the TLS backend cannot be initialised
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hvx/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError {
                message: format!("failed to build HTTP client: {}", e),
                timed_out: false,
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.get(&request.url).query(&request.query);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| TransportError {
            timed_out: e.is_timeout(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError {
            timed_out: e.is_timeout(),
            message: e.to_string(),
        })?;

        Ok(HttpResponse { status, body })
    }
}

// ==================== Mock Implementation ====================

type Scripted = Result<HttpResponse, TransportError>;

/// Scripted client for tests
///
/// Responses are queued per route; a request is matched to the first route
/// whose key is a substring of its URL. Unmatched or exhausted routes answer
/// 404. Every request is recorded.
#[derive(Default)]
pub struct MockHttpClient {
    routes: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for URLs containing `route`
    pub fn respond(self, route: &str, status: u16, body: impl Into<String>) -> Self {
        self.push(route, Ok(HttpResponse::new(status, body)));
        self
    }

    /// Queue a transport failure for URLs containing `route`
    pub fn fail(self, route: &str, message: &str) -> Self {
        self.push(
            route,
            Err(TransportError {
                message: message.to_string(),
                timed_out: true,
            }),
        );
        self
    }

    fn push(&self, route: &str, response: Scripted) {
        let mut routes = self.routes.lock();
        match routes.iter_mut().find(|(key, _)| key == route) {
            Some((_, queue)) => queue.push_back(response),
            None => routes.push((route.to_string(), VecDeque::from([response]))),
        }
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Requests per route key
    pub fn request_counts(&self) -> HashMap<String, usize> {
        let routes = self.routes.lock();
        let mut counts = HashMap::new();
        for req in self.requests.lock().iter() {
            if let Some((key, _)) = routes.iter().find(|(key, _)| req.url.contains(key.as_str())) {
                *counts.entry(key.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request.clone());

        let mut routes = self.routes.lock();
        let next = routes
            .iter_mut()
            .find(|(key, _)| request.url.contains(key.as_str()))
            .and_then(|(_, queue)| queue.pop_front());

        next.unwrap_or_else(|| Ok(HttpResponse::new(404, "not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_routes_in_order() {
        let client = MockHttpClient::new()
            .respond("/klines", 200, "[1]")
            .respond("/klines", 429, "")
            .fail("/fundingRate", "timed out");

        let klines = HttpRequest::get("http://x/fapi/v1/klines").query("limit", 1500);
        assert_eq!(client.get(&klines).await.unwrap().body, "[1]");
        assert_eq!(client.get(&klines).await.unwrap().status, 429);
        assert_eq!(client.get(&klines).await.unwrap().status, 404);

        let funding = HttpRequest::get("http://x/fapi/v1/fundingRate");
        assert!(client.get(&funding).await.is_err());

        assert_eq!(client.requests().len(), 4);
        assert_eq!(client.request_counts().get("/klines"), Some(&3));
        assert_eq!(client.requests()[0].query_value("limit"), Some("1500"));
    }
}
