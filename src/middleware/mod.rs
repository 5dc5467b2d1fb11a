/*
 * Responsibility
 * - middleware entry points
 *   - gates + pipeline: per-route rate limit / authentication / ownership
 *   - http, cors: applied once around the whole Router
 */
pub mod client_ip;
pub mod cors;
pub mod gates;
pub mod http;
pub mod pipeline;

pub use pipeline::{Gate, Pipeline, PipelineError};
