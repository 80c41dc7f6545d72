// ============================================================================
// File: packages/porter/src/target/types.rs
// ----------------------------------------------------------------------------
// Request/response types and unavailable-response synthesis
// ============================================================================

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue, RETRY_AFTER};
use http::StatusCode;

use crate::lifecycle::Rejection;

/// Inbound request handed to a target
pub type Request = http::Request<Bytes>;

/// Response produced by a target
pub type Response = http::Response<Bytes>;

/// Builds the response returned for rejected requests
pub trait UnavailableResponder: Send + Sync + std::fmt::Debug {
    /// Synthesize the response for a rejection
    ///
    /// Temporary rejections must carry their retry hint; permanent ones
    /// carry none.
    fn respond(&self, handler: &str, rejection: &Rejection) -> Response;
}

/// `503 Service Unavailable` with a `Retry-After` header for temporary rejections
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUnavailableResponder;

impl UnavailableResponder for DefaultUnavailableResponder {
    fn respond(&self, handler: &str, rejection: &Rejection) -> Response {
        let body = match rejection.retry_after {
            Some(secs) => format!(
                "{handler} is temporarily unavailable ({}), retry in {secs} seconds",
                rejection.reason
            ),
            None => format!("{handler} is permanently unavailable ({})", rejection.reason),
        };

        let mut response = Response::new(Bytes::from(body));
        *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        if let Some(secs) = rejection.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
