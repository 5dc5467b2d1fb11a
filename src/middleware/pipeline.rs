//! Explicit, ordered gate pipelines.
//!
//! A route's gates are declared as a `Pipeline` value instead of being implied by
//! the order of `.layer()` calls. `Pipeline::wrap` takes care of axum's
//! bottom-to-top layering so `stages()[0]` always runs first.
//!
//! Presets used by the routes:
//!
//! | preset          | stages                                            |
//! |-----------------|---------------------------------------------------|
//! | `public`        | RateLimit                                         |
//! | `optional_auth` | RateLimit → Authenticate(Optional)                |
//! | `authenticated` | RateLimit → Authenticate(Required)                |
//! | `post_owner`    | RateLimit → Authenticate(Required) → PostOwner    |

use std::mem::discriminant;

use axum::{middleware::from_fn_with_state, routing::MethodRouter};
use thiserror::Error;

use crate::middleware::gates;
use crate::services::auth::AuthMode;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    RateLimit,
    Authenticate(AuthMode),
    PostOwner,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("rate limiting must be the first gate")]
    RateLimitNotFirst,
    #[error("the post ownership gate needs a required-mode authentication gate before it")]
    OwnershipWithoutIdentity,
    #[error("gate {0:?} appears more than once")]
    Duplicate(Gate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Gate>,
}

impl Pipeline {
    /// Validate and build a custom pipeline.
    pub fn new(stages: impl IntoIterator<Item = Gate>) -> Result<Self, PipelineError> {
        let stages: Vec<Gate> = stages.into_iter().collect();

        for (i, gate) in stages.iter().enumerate() {
            let earlier = &stages[..i];

            if earlier.iter().any(|g| discriminant(g) == discriminant(gate)) {
                return Err(PipelineError::Duplicate(*gate));
            }

            match gate {
                Gate::RateLimit if i != 0 => return Err(PipelineError::RateLimitNotFirst),
                Gate::PostOwner
                    if !earlier.contains(&Gate::Authenticate(AuthMode::Required)) =>
                {
                    return Err(PipelineError::OwnershipWithoutIdentity);
                }
                _ => {}
            }
        }

        Ok(Self { stages })
    }

    pub fn public() -> Result<Self, PipelineError> {
        Self::new([Gate::RateLimit])
    }

    pub fn optional_auth() -> Result<Self, PipelineError> {
        Self::new([Gate::RateLimit, Gate::Authenticate(AuthMode::Optional)])
    }

    pub fn authenticated() -> Result<Self, PipelineError> {
        Self::new([Gate::RateLimit, Gate::Authenticate(AuthMode::Required)])
    }

    pub fn post_owner() -> Result<Self, PipelineError> {
        Self::new([
            Gate::RateLimit,
            Gate::Authenticate(AuthMode::Required),
            Gate::PostOwner,
        ])
    }

    pub fn stages(&self) -> &[Gate] {
        &self.stages
    }

    /// Wrap `route` so its handler runs behind every stage, first stage outermost.
    pub fn wrap(&self, state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
        // The last layer applied is the first to see the request.
        self.stages
            .iter()
            .rev()
            .fold(route, |route, gate| match gate {
                Gate::RateLimit => {
                    route.route_layer(from_fn_with_state(state.clone(), gates::rate_limit))
                }
                Gate::Authenticate(AuthMode::Required) => {
                    route.route_layer(from_fn_with_state(state.clone(), gates::require_identity))
                }
                Gate::Authenticate(AuthMode::Optional) => {
                    route.route_layer(from_fn_with_state(state.clone(), gates::optional_identity))
                }
                Gate::PostOwner => {
                    route.route_layer(from_fn_with_state(state.clone(), gates::post_owner))
                }
            })
    }
}
