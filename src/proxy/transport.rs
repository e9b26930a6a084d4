//! Outbound HTTP transport
//!
//! The orchestrator issues real requests against the protected origin through
//! this seam, so tests can script origin behavior without a network.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// One outbound request carrying a clearance
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// HTTP method name
    pub method: String,
    /// Target URL
    pub url: String,
    /// Caller-supplied headers
    pub headers: HashMap<String, String>,
    /// Clearance cookies, keyed by name
    pub cookies: HashMap<String, String>,
    /// User agent the clearance was issued under
    pub user_agent: String,
    /// Optional request body
    pub body: Option<String>,
    /// Total request timeout
    pub timeout: Duration,
}

/// Response from the origin
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body as text
    pub body: String,
}

/// Seam for issuing outbound HTTP requests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request and collect the full response
    async fn send(&self, request: OutboundRequest) -> crate::Result<TransportResponse>;
}

/// Production transport backed by reqwest
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a shared connection pool
    pub fn new() -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> crate::Result<TransportResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| crate::Error::invalid_request(format!("bad method: {}", request.method)))?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout)
            .header(reqwest::header::USER_AGENT, request.user_agent.as_str());

        if !request.cookies.is_empty() {
            let cookie_header = request
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(reqwest::header::COOKIE, cookie_header);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();
        let body = response.text().await?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
