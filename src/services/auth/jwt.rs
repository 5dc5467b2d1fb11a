use jsonwebtoken::{Algorithm, EncodingKey, Header};
use thiserror::Error;
use tracing::error;

use crate::services::auth::access_jwt::{AccessTokenClaims, ClaimId};
use crate::services::auth::identity::Identity;

/// Signs access tokens with the same secret the verifier checks against.
///
/// The API itself only verifies; this is used by local tooling and tests to mint
/// tokens the gate accepts.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("token lifetime does not fit the exp claim")]
    LifetimeOverflow,
    #[error(transparent)]
    Sign(#[from] jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct JwtIssuer {
    ttl_seconds: u64,
    encoding_key: EncodingKey,
}

impl JwtIssuer {
    pub fn new(secret: &[u8], ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            encoding_key: EncodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, IssueError> {
        self.issue_at(identity, chrono::Utc::now().timestamp())
    }

    /// Issue a token as if `issued_at` (unix seconds) were now.
    pub fn issue_at(
        &self,
        identity: &Identity,
        issued_at: i64,
    ) -> Result<String, IssueError> {
        let exp = i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(|ttl| issued_at.checked_add(ttl))
            .ok_or(IssueError::LifetimeOverflow)?;

        let claims = AccessTokenClaims {
            user_id: Some(ClaimId::Text(identity.id.clone())),
            sub: None,
            email: identity.email.clone(),
            iat: Some(issued_at),
            exp,
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign JWT");
            IssueError::Sign(e)
        })
    }
}
