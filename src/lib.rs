// ============================================================================
// File: packages/porter/src/lib.rs
// ----------------------------------------------------------------------------
// Request-handler lifecycle core for embedded HTTP application servers.
//
// Porter owns everything between "a request was routed to a handler" and
// "the handler's target produced a response":
// - Per-handler availability state machine with temporary and permanent
//   unavailability
// - Drain-aware teardown that waits (bounded) for in-flight requests
// - Instance pooling with idle eviction for single-request targets
// - Exactly-once invalidation of cached handler references
// ============================================================================

pub mod async_task;
pub mod chain;
pub mod config;
pub mod drain;
pub mod error;
pub mod handler;
pub mod invalidation;
pub mod lifecycle;
pub mod metrics;
pub mod pool;
pub mod registry;
pub mod target;

pub use async_task::{AsyncTask, AsyncTaskBuilder};
pub use chain::{ChainLink, MimeChain};
pub use config::{DrainConfig, HandlerConfig, PoolConfig};
pub use drain::{DrainCounter, DrainGuard};
pub use error::{PorterError, PorterResult};
pub use handler::{DestroyReport, Handler, PooledTarget, SharedTarget, TargetStrategy};
pub use invalidation::{InvalidationListener, InvalidationRegistry, InvalidationReport};
pub use lifecycle::{
    Acquire, HandlerEvent, HandlerEventListener, LifecycleState, LifecycleStateMachine, Rejection,
};
pub use metrics::{HandlerMetrics, HandlerStats};
pub use pool::{InstancePool, PoolElement};
pub use registry::{HandlerCache, HandlerRegistry, global_registry, init_global_registry};
pub use target::{
    DefaultUnavailableResponder, Request, Response, Target, TargetError, TargetFactory,
    TargetResult, UnavailableResponder, factory_fn, service_fn,
};
