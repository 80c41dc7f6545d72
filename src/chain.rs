// ============================================================================
// File: packages/porter/src/chain.rs
// ----------------------------------------------------------------------------
// Response chaining: hand a response to a secondary handler chosen by the
// response's content type.
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use http::header::CONTENT_TYPE;

use crate::handler::Handler;
use crate::target::{Request, Response};

/// Picks the handler a response should be re-dispatched to
pub trait ChainLink: Send + Sync + fmt::Debug {
    /// Secondary handler for `response`, or `None` to finish the chain
    fn next_hop(&self, response: &Response) -> Option<Handler>;
}

/// Content-type keyed chain
///
/// Parameters after `;` are ignored and media types compare
/// case-insensitively.
#[derive(Default)]
pub struct MimeChain {
    routes: RwLock<HashMap<String, Handler>>,
}

impl MimeChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Route responses of `content_type` to `handler`
    pub fn with_route<T: AsRef<str>>(self, content_type: T, handler: Handler) -> Self {
        self.add_route(content_type, handler);
        self
    }

    /// Route responses of `content_type` to `handler`, replacing any existing route
    ///
    /// # Returns
    /// The handler previously routed for this content type
    pub fn add_route<T: AsRef<str>>(&self, content_type: T, handler: Handler) -> Option<Handler> {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(media_type(content_type.as_ref()), handler)
    }

    /// Stop routing `content_type`
    pub fn remove_route<T: AsRef<str>>(&self, content_type: T) -> Option<Handler> {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&media_type(content_type.as_ref()))
    }
}

impl ChainLink for MimeChain {
    fn next_hop(&self, response: &Response) -> Option<Handler> {
        let content_type = response.headers().get(CONTENT_TYPE)?.to_str().ok()?;
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&media_type(content_type))
            .cloned()
    }
}

impl fmt::Debug for MimeChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes = self
            .routes
            .read()
            .map(|routes| routes.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        f.debug_struct("MimeChain").field("routes", &routes).finish()
    }
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Build the request for the next hop from a response
///
/// The body moves over unchanged and the content type is preserved.
pub(crate) fn chained_request(response: Response) -> Request {
    let (parts, body) = response.into_parts();
    let mut request = Request::new(body);
    if let Some(content_type) = parts.headers.get(CONTENT_TYPE) {
        request
            .headers_mut()
            .insert(CONTENT_TYPE, content_type.clone());
    }
    request
}
