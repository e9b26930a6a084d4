//! Configuration settings structure
//!
//! Defines the main settings structure and loading logic for the clearance proxy.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration settings for the clearance proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server configuration
    pub server: ServerSettings,
    /// Browser pool and solver configuration
    pub browser: BrowserSettings,
    /// Clearance cache configuration
    pub cache: CacheSettings,
    /// Security policy configuration
    pub security: SecuritySettings,
    /// Rate limiting configuration
    pub limits: LimitSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Default timeout for outbound proxied requests, in seconds
    pub request_timeout_secs: u64,
}

/// Browser pool and challenge solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Maximum number of concurrently live browser sessions
    pub max_sessions: usize,
    /// Path to the browser executable, if not auto-detected
    pub executable_path: Option<String>,
    /// Run the browser without a visible window
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Deadline for one challenge solve attempt, in seconds
    pub solve_timeout_secs: u64,
    /// Token poll interval during a solve, in seconds
    pub poll_interval_secs: u64,
    /// How long a caller may wait for pool capacity, in seconds
    pub acquire_timeout_secs: u64,
}

/// Clearance cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Clearance TTL in seconds
    pub clearance_ttl_secs: u64,
}

/// Security policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Accepted API tokens; empty list disables authentication
    pub api_tokens: Vec<String>,
    /// Domain suffix allow-list; empty list allows all domains
    pub allowed_domains: Vec<String>,
    /// Reject targets whose host is a private, loopback or link-local IP
    pub block_private_ip: bool,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// Requests per (caller, domain) pair per rolling minute
    pub per_minute: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8191,
            request_timeout_secs: 15,
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            max_sessions: 2,
            executable_path: None,
            headless: true,
            window_width: 1280,
            window_height: 720,
            solve_timeout_secs: 20,
            poll_interval_secs: 1,
            acquire_timeout_secs: 30,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            clearance_ttl_secs: 7200,
        }
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            api_tokens: Vec::new(),
            allowed_domains: Vec::new(),
            block_private_ip: true,
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self { per_minute: 60 }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            browser: BrowserSettings::default(),
            cache: CacheSettings::default(),
            security: SecuritySettings::default(),
            limits: LimitSettings::default(),
        }
    }
}

/// Split a CSV environment value into trimmed, non-empty items
fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn parse_env<T: std::str::FromStr>(name: &str, value: String) -> crate::Result<T> {
    value
        .parse()
        .map_err(|_| crate::Error::config(format!("Invalid value for {}: {}", name, value)))
}

impl Settings {
    /// Create new settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML configuration file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| crate::Error::config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Load settings from environment variables on top of defaults
    pub fn from_env() -> crate::Result<Self> {
        Self::default().merge_with_env()
    }

    /// Apply environment variable overrides to these settings
    pub fn merge_with_env(mut self) -> crate::Result<Self> {
        if let Ok(host) = std::env::var("CLEARANCE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("CLEARANCE_PORT") {
            self.server.port = parse_env("CLEARANCE_PORT", port)?;
        }
        if let Ok(timeout) = std::env::var("REQUEST_TIMEOUT") {
            self.server.request_timeout_secs = parse_env("REQUEST_TIMEOUT", timeout)?;
        }
        if let Ok(max) = std::env::var("MAX_BROWSER_SESSIONS") {
            self.browser.max_sessions = parse_env("MAX_BROWSER_SESSIONS", max)?;
        }
        if let Ok(path) = std::env::var("BROWSER_PATH") {
            self.browser.executable_path = Some(path);
        }
        if let Ok(headless) = std::env::var("HEADLESS") {
            self.browser.headless = parse_env("HEADLESS", headless)?;
        }
        if let Ok(ttl) = std::env::var("CLEARANCE_TTL_SECS") {
            self.cache.clearance_ttl_secs = parse_env("CLEARANCE_TTL_SECS", ttl)?;
        }
        if let Ok(tokens) = std::env::var("API_TOKENS") {
            self.security.api_tokens = split_csv(&tokens);
        }
        if let Ok(domains) = std::env::var("ALLOWED_DOMAINS") {
            self.security.allowed_domains = split_csv(&domains);
        }
        if let Ok(block) = std::env::var("BLOCK_PRIVATE_IP") {
            self.security.block_private_ip = parse_env("BLOCK_PRIVATE_IP", block)?;
        }
        if let Ok(limit) = std::env::var("RATE_LIMIT_PER_MINUTE") {
            self.limits.per_minute = parse_env("RATE_LIMIT_PER_MINUTE", limit)?;
        }
        Ok(self)
    }

    /// Load settings with file and environment precedence, then validate
    pub fn load(config_file: Option<&Path>) -> crate::Result<Self> {
        let settings = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(path)?
            }
            Some(path) => {
                tracing::warn!("Configuration file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        let settings = settings.merge_with_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the final configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.browser.max_sessions == 0 {
            return Err(crate::Error::config("max_sessions must be at least 1"));
        }
        if self.server.port == 0 {
            return Err(crate::Error::config("server port must be non-zero"));
        }
        if self.cache.clearance_ttl_secs == 0 {
            return Err(crate::Error::config("clearance_ttl_secs must be non-zero"));
        }
        if self.limits.per_minute == 0 {
            return Err(crate::Error::config("per_minute must be at least 1"));
        }
        if self.browser.poll_interval_secs == 0 {
            return Err(crate::Error::config("poll_interval_secs must be non-zero"));
        }
        Ok(())
    }
}
