// ============================================================================
// File: packages/porter/src/registry/tests.rs
// ----------------------------------------------------------------------------
// Test suite for the handler registry and reference cache
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;

use super::{HandlerCache, HandlerRegistry, global_registry};
use crate::config::{HandlerConfig, PoolConfig};
use crate::error::PorterError;
use crate::handler::Handler;
use crate::lifecycle::LifecycleState;
use crate::target::{Request, Response, Target, TargetError, factory_fn, service_fn};

fn echo_target() -> Arc<dyn Target> {
    Arc::new(service_fn(|request: Request| async move {
        if request.body() == "fatal" {
            Err(TargetError::permanent("target corrupted"))
        } else {
            Ok(Response::new(request.into_body()))
        }
    }))
}

fn echo_handler(config: HandlerConfig, constructed: &Arc<AtomicUsize>) -> Handler {
    let constructed = Arc::clone(constructed);
    let factory = factory_fn(move |_config: HandlerConfig| {
        let constructed = Arc::clone(&constructed);
        async move {
            constructed.fetch_add(1, Ordering::SeqCst);
            Ok(echo_target())
        }
    });
    Handler::new(config, Arc::new(factory)).expect("Failed to create handler in test")
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn request(body: &'static str) -> Request {
    Request::new(Bytes::from_static(body.as_bytes()))
}

#[tokio::test]
async fn registry_creation() {
    let registry = HandlerRegistry::new();

    let handlers = registry
        .list_handlers()
        .expect("Failed to list handlers in test");
    assert!(handlers.is_empty());
    assert!(registry.is_empty().expect("is_empty"));
}

#[tokio::test]
async fn registration_and_lookup() {
    let registry = HandlerRegistry::new();
    let constructed = Arc::new(AtomicUsize::new(0));

    registry
        .register(echo_handler(HandlerConfig::new("b"), &constructed))
        .await
        .expect("join")
        .expect("register");
    registry
        .register(echo_handler(HandlerConfig::new("a"), &constructed))
        .await
        .expect("join")
        .expect("register");

    assert_eq!(
        registry.list_handlers().expect("list"),
        vec!["a".to_string(), "b".to_string()]
    );
    assert_eq!(registry.get("a").expect("get").name(), "a");
    assert!(matches!(
        registry.get("missing"),
        Err(PorterError::HandlerNotFound { .. })
    ));

    // Lazy handlers are not constructed until first use
    assert_eq!(constructed.load(Ordering::SeqCst), 0);
    let states = registry.handler_states().expect("states");
    assert_eq!(states.get("a"), Some(&LifecycleState::Uninitialized));
}

#[tokio::test]
async fn duplicate_names_conflict() {
    let registry = HandlerRegistry::new();
    let constructed = Arc::new(AtomicUsize::new(0));

    registry
        .register(echo_handler(HandlerConfig::new("dup"), &constructed))
        .await
        .expect("join")
        .expect("register");
    let second = registry
        .register(echo_handler(HandlerConfig::new("dup"), &constructed))
        .await
        .expect("join");

    assert!(matches!(second, Err(PorterError::HandlerConflict { .. })));
    assert_eq!(registry.len().expect("len"), 1);
}

#[tokio::test]
async fn load_on_startup_initializes_eagerly() {
    let registry = HandlerRegistry::new();
    let constructed = Arc::new(AtomicUsize::new(0));

    registry
        .register(echo_handler(
            HandlerConfig::new("eager").with_load_on_startup(true),
            &constructed,
        ))
        .await
        .expect("join")
        .expect("register");

    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert_eq!(
        registry.get("eager").expect("get").state(),
        LifecycleState::Available
    );
}

#[tokio::test]
async fn failed_startup_load_keeps_handler_registered() {
    init_logging();
    let registry = HandlerRegistry::new();
    let factory = factory_fn(|_config: HandlerConfig| async {
        Err(TargetError::permanent("missing class"))
    });
    let handler = Handler::new(
        HandlerConfig::new("broken").with_load_on_startup(true),
        Arc::new(factory),
    )
    .expect("Failed to create handler in test");

    registry
        .register(handler)
        .await
        .expect("join")
        .expect("Registration should absorb the load failure");

    let handler = registry.get("broken").expect("get");
    assert!(handler.state().is_permanent());
}

#[tokio::test]
async fn remove_destroys_handler() {
    let registry = HandlerRegistry::new();
    let constructed = Arc::new(AtomicUsize::new(0));
    let handler = echo_handler(HandlerConfig::new("gone"), &constructed);
    registry
        .register(handler.clone())
        .await
        .expect("join")
        .expect("register");

    let report = registry
        .remove("gone")
        .await
        .expect("join")
        .expect("remove")
        .expect("Handler should have been registered");
    assert!(report.performed);
    assert!(handler.is_destroyed());
    assert!(registry.get("gone").is_err());

    let missing = registry.remove("gone").await.expect("join").expect("remove");
    assert!(missing.is_none());
}

#[tokio::test]
async fn permanent_service_failure_removes_handler_from_registry() {
    let registry = HandlerRegistry::new();
    let constructed = Arc::new(AtomicUsize::new(0));
    registry
        .register(echo_handler(HandlerConfig::new("fragile"), &constructed))
        .await
        .expect("join")
        .expect("register");

    let handler = registry.get("fragile").expect("get");
    handler
        .dispatch(request("ok"))
        .await
        .expect("join")
        .expect("dispatch");
    let failure = handler.dispatch(request("fatal")).await.expect("join");
    assert!(matches!(failure, Err(PorterError::PermanentFailure { .. })));

    assert!(matches!(
        registry.get("fragile"),
        Err(PorterError::HandlerNotFound { .. })
    ));
}

#[tokio::test]
async fn replaced_handler_is_not_removed_by_its_predecessor() {
    let registry = HandlerRegistry::new();
    let constructed = Arc::new(AtomicUsize::new(0));
    let old = echo_handler(HandlerConfig::new("svc"), &constructed);
    registry
        .register(old.clone())
        .await
        .expect("join")
        .expect("register");

    // Swap in a replacement while the old handler is still alive
    {
        let mut handlers = registry.handlers.write().expect("lock");
        handlers.insert(
            "svc".to_string(),
            echo_handler(HandlerConfig::new("svc"), &constructed),
        );
    }

    old.destroy().await.expect("join").expect("destroy");
    let current = registry.get("svc").expect("replacement should remain");
    assert_ne!(current.id(), old.id());
}

#[tokio::test(start_paused = true)]
async fn cleanup_idle_evicts_pooled_instances() {
    let registry = HandlerRegistry::new();
    let constructed = Arc::new(AtomicUsize::new(0));
    let factory = {
        let constructed = Arc::clone(&constructed);
        factory_fn(move |_config: HandlerConfig| {
            let constructed = Arc::clone(&constructed);
            async move {
                constructed.fetch_add(1, Ordering::SeqCst);
                Ok(echo_target())
            }
        })
        .with_single_request(true)
    };
    let config = HandlerConfig::new("pooled").with_pool(
        PoolConfig::default()
            .with_initial_size(2)
            .with_max_idle_time(Duration::from_secs(10)),
    );
    let handler = Handler::new(config, Arc::new(factory)).expect("Failed to create handler");
    registry
        .register(handler.clone())
        .await
        .expect("join")
        .expect("register");
    registry
        .register(echo_handler(HandlerConfig::new("shared"), &constructed))
        .await
        .expect("join")
        .expect("register");

    handler
        .dispatch(request("ok"))
        .await
        .expect("join")
        .expect("dispatch");
    assert_eq!(registry.cleanup_idle().await.expect("join").expect("cleanup"), 0);

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(registry.cleanup_idle().await.expect("join").expect("cleanup"), 2);

    // The pool refills on demand
    handler
        .dispatch(request("ok"))
        .await
        .expect("join")
        .expect("dispatch");
    assert_eq!(constructed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn shutdown_destroys_everything() {
    init_logging();
    let registry = HandlerRegistry::new();
    let constructed = Arc::new(AtomicUsize::new(0));
    let mut handlers = Vec::new();
    for name in ["one", "two", "three"] {
        let handler = echo_handler(HandlerConfig::new(name), &constructed);
        handlers.push(handler.clone());
        registry
            .register(handler)
            .await
            .expect("join")
            .expect("register");
    }

    let reports = registry.shutdown().await.expect("join").expect("shutdown");
    assert_eq!(reports.len(), 3);
    assert!(reports.values().all(|report| report.performed));
    assert!(handlers.iter().all(Handler::is_destroyed));
    assert!(registry.is_empty().expect("is_empty"));
}

#[tokio::test]
async fn destroyed_handler_cannot_be_registered() {
    let registry = HandlerRegistry::new();
    let constructed = Arc::new(AtomicUsize::new(0));
    let handler = echo_handler(HandlerConfig::new("late"), &constructed);
    handler.destroy().await.expect("join").expect("destroy");

    let result = registry.register(handler).await.expect("join");
    assert!(matches!(
        result,
        Err(PorterError::InvalidConfiguration { .. })
    ));
}

#[tokio::test]
async fn cache_entries_follow_handler_invalidation() {
    let registry = HandlerRegistry::new();
    let cache = HandlerCache::new();
    let constructed = Arc::new(AtomicUsize::new(0));
    registry
        .register(echo_handler(HandlerConfig::new("cached"), &constructed))
        .await
        .expect("join")
        .expect("register");

    let first = cache.resolve("cached", &registry).expect("resolve");
    let second = cache.resolve("cached", &registry).expect("resolve");
    assert_eq!(first.id(), second.id());
    assert_eq!(cache.len(), 1);

    first.unload().await.expect("join").expect("unload");
    assert!(cache.is_empty());

    // Re-resolving after unload registers on the fresh generation
    let third = cache.resolve("cached", &registry).expect("resolve");
    assert_eq!(third.id(), first.id());
    registry
        .remove("cached")
        .await
        .expect("join")
        .expect("remove");
    assert!(cache.cached("cached").is_none());

    assert!(matches!(
        cache.resolve("cached", &registry),
        Err(PorterError::HandlerNotFound { .. })
    ));
}

#[tokio::test]
async fn cache_keys_are_independent_of_handler_names() {
    let cache = HandlerCache::new();
    let constructed = Arc::new(AtomicUsize::new(0));
    let handler = echo_handler(HandlerConfig::new("reports"), &constructed);

    let resolved = cache
        .resolve_with("/reports/daily", || Ok(handler.clone()))
        .expect("resolve");
    assert_eq!(resolved.id(), handler.id());
    assert!(cache.cached("/reports/daily").is_some());

    assert!(cache.invalidate("/reports/daily").is_some());
    assert!(cache.is_empty());

    // Resolving a destroyed handler evicts immediately
    handler.destroy().await.expect("join").expect("destroy");
    cache
        .resolve_with("/reports/daily", || Ok(handler.clone()))
        .expect("resolve");
    assert!(cache.is_empty());
}

#[tokio::test]
async fn repeated_resolve_and_invalidate_keeps_one_listener() {
    let registry = HandlerRegistry::new();
    let cache = HandlerCache::new();
    let constructed = Arc::new(AtomicUsize::new(0));
    let handler = echo_handler(HandlerConfig::new("churn"), &constructed);
    registry
        .register(handler.clone())
        .await
        .expect("join")
        .expect("register");

    for _ in 0..1000 {
        cache.resolve("churn", &registry).expect("resolve");
        cache.resolve("churn", &registry).expect("resolve");
        assert_eq!(handler.invalidation_registry().listener_count(), 1);
        assert!(cache.invalidate("churn").is_some());
    }
    assert_eq!(handler.invalidation_registry().listener_count(), 0);

    // The surviving registration still evicts on destroy
    cache.resolve("churn", &registry).expect("resolve");
    registry.remove("churn").await.expect("join").expect("remove");
    assert!(cache.is_empty());
}

#[test]
fn global_registry_is_a_singleton() {
    let first = global_registry();
    let second = global_registry();
    assert!(std::ptr::eq(first, second));
}
