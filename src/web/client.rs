//! Identity of the caller, used to key training sessions.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

pub const UNKNOWN_CLIENT: &str = "unknown";

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(ClientId(resolve(&parts.headers, peer)))
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn resolve(headers: &HeaderMap, peer: Option<String>) -> String {
    if let Some(forwarded) = header_value(headers, "x-forwarded-for")
        && let Some(first) = forwarded.split(',').map(str::trim).find(|h| !h.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header_value(headers, "x-real-ip") {
        return real_ip.to_string();
    }
    peer.unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
