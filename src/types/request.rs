//! Request type definitions
//!
//! Defines the structure for proxied request submissions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A request to proxy one HTTP call through a cached clearance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRequest {
    /// Target URL on the protected origin
    pub url: String,

    /// HTTP method, defaults to GET
    #[serde(default = "default_method")]
    pub method: String,

    /// Extra request headers to forward to the origin
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Optional request body
    pub body: Option<String>,

    /// Per-request timeout in seconds; the server default applies when absent
    pub timeout: Option<u64>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl ProxyRequest {
    /// Create a new GET request for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Set the HTTP method
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Add a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the request body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the per-request timeout in seconds
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }
}
