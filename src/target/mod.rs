// ============================================================================
// File: packages/porter/src/target/mod.rs
// ----------------------------------------------------------------------------
// Collaborator contracts for the objects a handler wraps.
//
// - Target trait: request invocation and teardown
// - TargetFactory trait: lazy construction from handler configuration
// - Closure adapters for both
// - Unavailable-response synthesis with retry hints
// ============================================================================

mod errors;
mod factory;
mod trait_def;
mod types;

pub use errors::{TargetError, TargetResult};
pub use factory::{FactoryFn, ServiceFn, factory_fn, service_fn};
pub use trait_def::{Target, TargetFactory};
pub use types::{DefaultUnavailableResponder, Request, Response, UnavailableResponder};
