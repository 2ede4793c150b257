//! Client-origin resolution.
//!
//! Lockout and rate-limit decisions key on the network origin, so the value
//! must not be spoofable: forwarding headers are honored only when the socket
//! peer is a configured trusted proxy. Without connection info (as under the
//! in-process test harness) the origin resolves to loopback.

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

use super::AppState;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Extractor resolving the address an auth attempt is charged against.
#[derive(Debug, Clone, Copy)]
pub struct ClientOrigin(pub IpAddr);

impl FromRequestParts<Arc<AppState>> for ClientOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or(LOOPBACK, |info| info.0.ip());

        let trusted = {
            let config = state.shared.config.read().await;
            config
                .server
                .trusted_proxy_ips
                .iter()
                .filter_map(|s| s.parse::<IpAddr>().ok())
                .collect::<Vec<_>>()
        };

        if trusted.contains(&peer) {
            if let Some(forwarded) = forwarded_ip(&parts.headers) {
                return Ok(Self(forwarded));
            }
        }

        Ok(Self(peer))
    }
}

/// First address in `X-Forwarded-For`, falling back to `X-Real-Ip`.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(value) = headers.get("x-forwarded-for") {
        if let Ok(raw) = value.to_str() {
            if let Some(first) = raw.split(',').next() {
                if let Ok(ip) = first.trim().parse() {
                    return Some(ip);
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );

        assert_eq!(
            forwarded_ip(&headers),
            Some("203.0.113.9".parse().unwrap())
        );
    }

    #[test]
    fn real_ip_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));

        assert_eq!(
            forwarded_ip(&headers),
            Some("198.51.100.4".parse().unwrap())
        );
    }

    #[test]
    fn garbage_headers_resolve_to_none() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));

        assert_eq!(forwarded_ip(&headers), None);
    }
}
