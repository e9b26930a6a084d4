//! Target policy validation
//!
//! Rejects proxy targets before any resource is spent on them: non-HTTP
//! schemes, hosts that resolve to private or loopback addresses, and domains
//! outside the configured allow-list.

use crate::config::settings::SecuritySettings;
use std::net::IpAddr;
use url::Url;

/// Extract the lowercase host of a target URL, used as the clearance cache key
pub fn target_domain(url: &str) -> crate::Result<String> {
    let parsed = parse_http_url(url)?;
    parsed
        .host_str()
        .map(|host| host.to_ascii_lowercase())
        .ok_or_else(|| crate::Error::invalid_request("URL has no host"))
}

/// Validate a target URL against the security policy
pub fn validate_target(url: &str, security: &SecuritySettings) -> crate::Result<()> {
    let parsed = parse_http_url(url)?;
    let host = parsed
        .host_str()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| crate::Error::invalid_request("URL has no host"))?;

    if security.block_private_ip && is_private_address(&host) {
        return Err(crate::Error::target_not_allowed("private address blocked"));
    }
    if !security.allowed_domains.is_empty() && !domain_allowed(&host, &security.allowed_domains) {
        return Err(crate::Error::target_not_allowed(format!(
            "domain {} not in allow-list",
            host
        )));
    }
    Ok(())
}

fn parse_http_url(url: &str) -> crate::Result<Url> {
    let parsed =
        Url::parse(url).map_err(|e| crate::Error::invalid_request(format!("invalid URL: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(crate::Error::invalid_request(format!(
            "unsupported scheme: {}",
            other
        ))),
    }
}

/// Whether a host string is an IP literal in private, loopback or link-local space
fn is_private_address(host: &str) -> bool {
    // Url keeps IPv6 literals bracketed
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified()
        }
        Ok(IpAddr::V6(ip)) => {
            ip.is_loopback()
                || ip.is_unspecified()
                // unique-local fc00::/7 and link-local fe80::/10
                || (ip.segments()[0] & 0xfe00) == 0xfc00
                || (ip.segments()[0] & 0xffc0) == 0xfe80
        }
        Err(_) => false,
    }
}

/// Suffix match against the allow-list; a leading dot on the suffix is optional
fn domain_allowed(host: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|entry| {
        let suffix = entry.trim_start_matches('.');
        host == suffix || host.ends_with(&format!(".{}", suffix))
    })
}
