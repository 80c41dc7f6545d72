// ============================================================================
// File: packages/porter/src/target/factory.rs
// ----------------------------------------------------------------------------
// Closure adapters implementing Target and TargetFactory
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::async_task::{AsyncTask, AsyncTaskBuilder};
use crate::config::HandlerConfig;
use crate::target::errors::TargetResult;
use crate::target::trait_def::{Target, TargetFactory};
use crate::target::types::{Request, Response};

/// Target backed by an async closure
pub struct ServiceFn<F> {
    service: F,
}

/// Wrap an async closure as a target with a no-op shutdown
pub fn service_fn<F, Fut>(service: F) -> ServiceFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TargetResult<Response>> + Send + 'static,
{
    ServiceFn { service }
}

impl<F> fmt::Debug for ServiceFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceFn").finish_non_exhaustive()
    }
}

impl<F, Fut> Target for ServiceFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TargetResult<Response>> + Send + 'static,
{
    fn handle(&self, request: Request) -> AsyncTask<TargetResult<Response>> {
        AsyncTaskBuilder::new((self.service)(request)).spawn()
    }

    fn shutdown(&self) -> AsyncTask<TargetResult<()>> {
        AsyncTaskBuilder::new(async { Ok(()) }).spawn()
    }
}

/// Factory backed by an async closure receiving a copy of the handler configuration
pub struct FactoryFn<F> {
    construct: F,
    single_request: bool,
}

/// Wrap an async closure as a target factory
pub fn factory_fn<F, Fut>(construct: F) -> FactoryFn<F>
where
    F: Fn(HandlerConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TargetResult<Arc<dyn Target>>> + Send + 'static,
{
    FactoryFn {
        construct,
        single_request: false,
    }
}

impl<F> FactoryFn<F> {
    /// Mark produced targets as single-request, enabling pooling
    pub fn with_single_request(mut self, single_request: bool) -> Self {
        self.single_request = single_request;
        self
    }
}

impl<F> fmt::Debug for FactoryFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryFn")
            .field("single_request", &self.single_request)
            .finish_non_exhaustive()
    }
}

impl<F, Fut> TargetFactory for FactoryFn<F>
where
    F: Fn(HandlerConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TargetResult<Arc<dyn Target>>> + Send + 'static,
{
    fn construct(&self, config: &HandlerConfig) -> AsyncTask<TargetResult<Arc<dyn Target>>> {
        AsyncTaskBuilder::new((self.construct)(config.clone())).spawn()
    }

    fn single_request(&self) -> bool {
        self.single_request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn service_fn_handles_requests() {
        let target = service_fn(|request: Request| async move {
            Ok(Response::new(request.into_body()))
        });

        let response = target
            .handle(Request::new(Bytes::from_static(b"echo")))
            .await
            .expect("Failed to join async task in test")
            .expect("Failed to handle request in test");
        assert_eq!(response.body(), &Bytes::from_static(b"echo"));

        assert!(target.shutdown().await.expect("join").is_ok());
    }

    #[tokio::test]
    async fn factory_fn_receives_configuration() {
        let factory = factory_fn(|config: HandlerConfig| async move {
            let greeting = config
                .init_params
                .get("greeting")
                .cloned()
                .unwrap_or_default();
            let target: Arc<dyn Target> = Arc::new(service_fn(move |_req: Request| {
                let greeting = greeting.clone();
                async move { Ok(Response::new(Bytes::from(greeting))) }
            }));
            Ok(target)
        })
        .with_single_request(true);

        assert!(factory.single_request());

        let config = HandlerConfig::new("greeter").with_init_param("greeting", "hello");
        let target = factory
            .construct(&config)
            .await
            .expect("Failed to join async task in test")
            .expect("Failed to construct target in test");
        let response = target
            .handle(Request::new(Bytes::new()))
            .await
            .expect("join")
            .expect("handle");
        assert_eq!(response.body(), &Bytes::from_static(b"hello"));
    }
}
