//! Identity key derivation for inbound requests.

use std::net::SocketAddr;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Header carrying the client address chain when behind a proxy.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Key used when neither a header nor a peer address is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// How the rate limiter identifies a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKeyStrategy {
    /// Use the raw `X-Forwarded-For` value when present, otherwise the peer IP.
    ///
    /// The header is trusted as sent, so a client talking to the service
    /// directly can pick its own key.
    #[default]
    ForwardedFor,
    /// Always use the peer IP of the connection.
    PeerAddr,
    /// Take the address appended by the outermost of `hops` trusted proxies,
    /// counting from the right of `X-Forwarded-For`.
    TrustedProxy,
}

/// Derives rate limit keys from request metadata.
#[derive(Debug, Clone, Copy)]
pub struct ClientKeyExtractor {
    strategy: ClientKeyStrategy,
    trusted_hops: usize,
}

impl ClientKeyExtractor {
    pub fn new(strategy: ClientKeyStrategy, trusted_hops: usize) -> Self {
        Self {
            strategy,
            trusted_hops: trusted_hops.max(1),
        }
    }

    /// Compute the key for a request with the given headers and peer address.
    pub fn extract(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let peer_key = || {
            peer.map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
        };

        match self.strategy {
            ClientKeyStrategy::PeerAddr => peer_key(),
            ClientKeyStrategy::ForwardedFor => forwarded_for(headers)
                .map(str::to_string)
                .unwrap_or_else(peer_key),
            ClientKeyStrategy::TrustedProxy => forwarded_for(headers)
                .and_then(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|hop| !hop.is_empty())
                        .rev()
                        .nth(self.trusted_hops - 1)
                        .map(str::to_string)
                })
                .unwrap_or_else(peer_key),
        }
    }
}

impl Default for ClientKeyExtractor {
    fn default() -> Self {
        Self::new(ClientKeyStrategy::default(), 1)
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
}
