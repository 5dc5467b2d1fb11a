pub mod access_jwt;
pub mod identity;
pub mod jwt;

pub use access_jwt::{AuthMode, CredentialError, TokenVerifier, Verification};
pub use identity::Identity;
pub use jwt::{IssueError, JwtIssuer};
