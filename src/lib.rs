//! Feature flag evaluation service.
//!
//! Given a flag key and an evaluation context (a sticky key plus attributes) the
//! engine answers with the flag's typed value. Rule sets are tried in priority order,
//! percentage rollouts are decided by stable SHA-256 bucketing, and results are
//! cached per context with invalidation driven by flag mutation events.
//!
//! - `evaluation` - bucketing, condition matching, value coercion and the service
//! - `cache` - evaluation cache, key derivation and the invalidation index
//! - `store` - flag lookup and project resolution collaborators
//! - `routes` - HTTP transport

pub mod cache;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod routes;
pub mod state;
pub mod store;

pub use error::{EvaluationError, Result};
pub use evaluation::{EvaluationContext, EvaluationResult, FlagEvaluationService, FlagValue};
