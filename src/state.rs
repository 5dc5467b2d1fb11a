/*
 * Responsibility
 * - shared context bound to the Router (AppState)
 *   - post store, the three gates, client address resolution
 * - cheap to Clone (everything inside is Arc/Copy)
 */
use std::sync::Arc;

use crate::config::Config;
use crate::middleware::client_ip::ClientIpResolver;
use crate::repos::PostStore;
use crate::services::auth::TokenVerifier;
use crate::services::ownership::OwnershipGuard;
use crate::services::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<dyn PostStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub tokens: Arc<TokenVerifier>,
    pub ownership: Arc<OwnershipGuard>,
    pub client_ip: ClientIpResolver,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("rate_limiter", &self.rate_limiter)
            .field("tokens", &self.tokens)
            .field("ownership", &self.ownership)
            .field("client_ip", &self.client_ip)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build every gate from `config` over the given store.
    ///
    /// The same store serves CRUD handlers and the ownership lookup.
    pub fn new<S>(store: Arc<S>, config: &Config) -> Self
    where
        S: PostStore + 'static,
    {
        let ownership = OwnershipGuard::new(store.clone(), config.ownership_match);

        Self {
            posts: store,
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit)),
            tokens: Arc::new(TokenVerifier::new(
                config.jwt_secret.as_bytes(),
                config.jwt_leeway_seconds,
            )),
            ownership: Arc::new(ownership),
            client_ip: ClientIpResolver::new(config.trusted_proxy_hops),
        }
    }
}
