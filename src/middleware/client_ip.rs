//! Client address used as the rate-limit key.
//!
//! Without trusted proxies the peer socket address is the only source: a client can
//! put anything in `X-Forwarded-For`. With `n` trusted hops, the n-th address from
//! the right of `X-Forwarded-For` is the client (each trusted proxy appends the
//! address it received the request from).

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Clone, Copy, Default)]
pub struct ClientIpResolver {
    trusted_proxy_hops: usize,
}

impl ClientIpResolver {
    pub fn new(trusted_proxy_hops: usize) -> Self {
        Self { trusted_proxy_hops }
    }

    /// Rate-limit key for a request. `"unknown"` when no address is available.
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        self.resolve(headers, peer)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
        let peer_ip = peer.map(|addr| addr.ip());
        if self.trusted_proxy_hops == 0 {
            return peer_ip;
        }

        let chain: Vec<IpAddr> = headers
            .get_all(FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .filter_map(|part| part.trim().parse::<IpAddr>().ok())
            .collect();

        if chain.is_empty() {
            return peer_ip;
        }

        // Fewer entries than trusted hops: the leftmost one is as far as we can see.
        let index = chain.len().saturating_sub(self.trusted_proxy_hops);
        chain.get(index).copied()
    }
}
