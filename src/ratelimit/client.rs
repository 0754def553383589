//! Client key derivation.
//!
//! The forwarding headers are trusted verbatim. Without a reverse proxy that
//! strips them, a client can choose its own key and evade every limit.

use axum::http::HeaderMap;
use std::net::SocketAddr;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Key used when the transport address is not available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the client key for a request.
///
/// Precedence: first entry of `X-Forwarded-For`, then `X-Real-IP`, then the
/// transport peer IP.
pub fn extract_client_key(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    if let Some(forwarded) = header_str(headers, X_FORWARDED_FOR) {
        let first = forwarded.split(',').next().unwrap_or(forwarded);
        return first.trim().to_string();
    }

    if let Some(real_ip) = header_str(headers, X_REAL_IP) {
        return real_ip.to_string();
    }

    remote_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// A header value that is present, valid UTF-8, and non-empty.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}
