// ============================================================================
// File: packages/porter/src/pool/tests.rs
// ----------------------------------------------------------------------------
// Tests for the instance pool
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;

use super::*;
use crate::async_task::AsyncTask;
use crate::config::PoolConfig;
use crate::target::{Request, Response, TargetFactory, factory_fn};

#[derive(Debug)]
struct CountingTarget {
    shutdowns: Arc<AtomicUsize>,
}

impl Target for CountingTarget {
    fn handle(&self, _request: Request) -> AsyncTask<TargetResult<Response>> {
        AsyncTaskBuilder::new(async { Ok(Response::new(Bytes::from_static(b"ok"))) }).spawn()
    }

    fn shutdown(&self) -> AsyncTask<TargetResult<()>> {
        let shutdowns = Arc::clone(&self.shutdowns);
        AsyncTaskBuilder::new(async move {
            shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .spawn()
    }
}

struct Counters {
    constructed: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

fn counting_factory() -> (Arc<dyn TargetFactory>, Counters) {
    let constructed = Arc::new(AtomicUsize::new(0));
    let shutdowns = Arc::new(AtomicUsize::new(0));
    let counters = Counters {
        constructed: Arc::clone(&constructed),
        shutdowns: Arc::clone(&shutdowns),
    };

    let factory = factory_fn(move |_config: HandlerConfig| {
        let constructed = Arc::clone(&constructed);
        let shutdowns = Arc::clone(&shutdowns);
        async move {
            constructed.fetch_add(1, Ordering::SeqCst);
            let target: Arc<dyn Target> = Arc::new(CountingTarget { shutdowns });
            Ok(target)
        }
    })
    .with_single_request(true);

    (Arc::new(factory), counters)
}

fn pool_with_idle(factory: Arc<dyn TargetFactory>, max_idle: Duration) -> InstancePool {
    let config = HandlerConfig::new("pooled")
        .with_pool(PoolConfig::default().with_max_idle_time(max_idle));
    InstancePool::new(factory, config)
}

// Detached shutdowns need a turn of the runtime
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test]
async fn sequential_reuse_keeps_one_instance() {
    let (factory, counters) = counting_factory();
    let pool = pool_with_idle(factory, Duration::from_secs(60));

    for _ in 0..25 {
        let element = pool.checkout().await.expect("checkout");
        pool.checkin(element).expect("checkin");
    }

    assert_eq!(pool.total_count().expect("total"), 1);
    assert_eq!(pool.idle_count().expect("idle"), 1);
    assert_eq!(counters.constructed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_checkouts_construct_distinct_instances() {
    let (factory, counters) = counting_factory();
    let pool = pool_with_idle(factory, Duration::from_secs(60));

    let first = pool.checkout().await.expect("first checkout");
    let second = pool.checkout().await.expect("second checkout");
    assert_ne!(first.id(), second.id());
    assert_eq!(pool.total_count().expect("total"), 2);

    let second_id = second.id();
    pool.checkin(first).expect("checkin");
    pool.checkin(second).expect("checkin");

    // Most recently returned instance is reused first
    let reused = pool.checkout().await.expect("reuse");
    assert_eq!(reused.id(), second_id);
    assert_eq!(counters.constructed.load(Ordering::SeqCst), 2);
    pool.checkin(reused).expect("checkin");
}

#[tokio::test(start_paused = true)]
async fn idle_instances_are_evicted_oldest_first() {
    let (factory, counters) = counting_factory();
    let pool = pool_with_idle(factory, Duration::from_secs(30));

    let old = pool.checkout().await.expect("checkout");
    let fresh = pool.checkout().await.expect("checkout");
    let fresh_id = fresh.id();

    pool.checkin(old).expect("checkin");
    tokio::time::advance(Duration::from_secs(20)).await;
    pool.checkin(fresh).expect("checkin");
    tokio::time::advance(Duration::from_secs(15)).await;

    assert_eq!(pool.evict_expired().expect("evict"), 1);
    assert_eq!(pool.total_count().expect("total"), 1);

    let remaining = pool.checkout().await.expect("checkout");
    assert_eq!(remaining.id(), fresh_id);
    pool.checkin(remaining).expect("checkin");

    settle().await;
    assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn single_instance_expires_after_idle_period() {
    let (factory, counters) = counting_factory();
    let pool = pool_with_idle(factory, Duration::from_secs(10));

    let element = pool.checkout().await.expect("checkout");
    pool.checkin(element).expect("checkin");
    assert_eq!(pool.evict_expired().expect("evict"), 0);

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(pool.evict_expired().expect("evict"), 1);
    assert_eq!(pool.total_count().expect("total"), 0);

    settle().await;
    assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn destroy_all_reaches_checked_out_instances() {
    let (factory, counters) = counting_factory();
    let pool = pool_with_idle(factory, Duration::from_secs(60));

    let idle = pool.checkout().await.expect("checkout");
    let busy = pool.checkout().await.expect("checkout");
    pool.checkin(idle).expect("checkin");

    assert_eq!(pool.destroy_all().await.expect("destroy"), 2);
    assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 2);
    assert!(pool.is_closed().expect("closed"));

    // A late checkin is not pooled and not shut down twice
    pool.checkin(busy).expect("checkin");
    settle().await;
    assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 2);
    assert_eq!(pool.total_count().expect("total"), 0);
    assert!(matches!(
        pool.checkout().await,
        Err(TargetError::NotInitialized)
    ));
}

#[tokio::test]
async fn prewarm_then_reopen() {
    let (factory, counters) = counting_factory();
    let pool = pool_with_idle(factory, Duration::from_secs(60));

    assert_eq!(pool.prewarm(3).await.expect("prewarm"), 3);
    assert_eq!(pool.idle_count().expect("idle"), 3);
    assert_eq!(pool.prewarm(2).await.expect("prewarm"), 0);

    pool.destroy_all().await.expect("destroy");
    pool.reopen().expect("reopen");
    assert_eq!(pool.prewarm(1).await.expect("prewarm"), 1);
    assert_eq!(counters.constructed.load(Ordering::SeqCst), 4);
}
