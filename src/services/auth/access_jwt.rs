use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::auth::identity::Identity;

/// Why a credential did not produce an identity.
///
/// `Expired` and `Invalid` share a wire response but stay distinct here so logs
/// can tell them apart.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    #[error("missing token")]
    Missing,
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Reject requests without a valid token.
    Required,
    /// Attach an identity when a valid token is present, continue anonymously otherwise.
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Authenticated(Identity),
    Anonymous,
    Rejected(CredentialError),
}

/// A user id claim as issuers write it: a string or a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimId {
    Text(String),
    Number(serde_json::Number),
}

impl ClaimId {
    pub fn into_string(self) -> String {
        match self {
            ClaimId::Text(s) => s,
            ClaimId::Number(n) => n.to_string(),
        }
    }
}

/// Access token claims.
///
/// `userId` is the claim name our issuer writes. Tokens carrying only `sub`
/// are accepted too; when both are present `userId` wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ClaimId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub exp: i64,
}

impl AccessTokenClaims {
    /// The subject id: `userId` if present, else `sub`.
    pub fn subject_id(&self) -> Option<String> {
        self.user_id
            .clone()
            .map(ClaimId::into_string)
            .or_else(|| self.sub.clone())
    }
}

/// Extract the token from an `Authorization` header value.
///
/// Anything other than `Bearer <token>` counts as no token at all.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// HS256 access-token verifier.
///
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .field("leeway", &self.validation.leeway)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(secret: &[u8], leeway_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_seconds;
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Check signature + `exp`, then require non-empty identity claims.
    pub fn decode(&self, token: &str) -> Result<Identity, CredentialError> {
        let claims =
            jsonwebtoken::decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
                .map(|data| data.claims)
                .map_err(|e| match e.kind() {
                    ErrorKind::ExpiredSignature => CredentialError::Expired,
                    _ => CredentialError::Invalid,
                })?;

        let user_id = claims.subject_id().unwrap_or_default();
        if user_id.trim().is_empty() || claims.email.trim().is_empty() {
            return Err(CredentialError::Invalid);
        }

        Ok(Identity::new(user_id, claims.email))
    }

    /// Resolve the `Authorization` header value according to `mode`.
    pub fn verify(&self, authorization: Option<&str>, mode: AuthMode) -> Verification {
        let Some(token) = bearer_token(authorization) else {
            return match mode {
                AuthMode::Required => Verification::Rejected(CredentialError::Missing),
                AuthMode::Optional => Verification::Anonymous,
            };
        };

        match (self.decode(token), mode) {
            (Ok(identity), _) => Verification::Authenticated(identity),
            (Err(err), AuthMode::Required) => Verification::Rejected(err),
            (Err(err), AuthMode::Optional) => {
                tracing::debug!(error = %err, "ignoring unusable token on optional-auth route");
                Verification::Anonymous
            }
        }
    }
}
