//! Request correlation
//!
//! Every request gets exactly one request ID. The ID is looked up in the
//! request's variables first, then taken from the client's `X-Request-Id`
//! header, and only generated (UUID v4) when neither exists. Once resolved it
//! is stored back in the request variables so later lookups agree.
//!
//! Request variables live in the request's [`Extensions`], so they share the
//! request's lifetime and are never visible to other requests.

use hyper::http::request::Parts;
use hyper::http::{Extensions, HeaderMap, Request};
use std::collections::HashMap;
use uuid::Uuid;

/// Request variable holding the correlation ID
pub const REQUEST_ID_VAR: &str = "request_id";

/// Client-supplied correlation header
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request variable store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestVars {
    vars: HashMap<String, String>,
}

impl RequestVars {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Head of an HTTP request: headers plus extensions
pub trait RequestHead {
    fn headers(&self) -> &HeaderMap;
    fn extensions(&self) -> &Extensions;
    fn extensions_mut(&mut self) -> &mut Extensions;

    /// Variables attached to this request, if any were set
    fn vars(&self) -> Option<&RequestVars> {
        self.extensions().get::<RequestVars>()
    }

    /// Variables attached to this request, created on first use
    fn vars_mut(&mut self) -> &mut RequestVars {
        self.extensions_mut().get_or_insert_default::<RequestVars>()
    }
}

impl RequestHead for Parts {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl<B> RequestHead for Request<B> {
    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn extensions(&self) -> &Extensions {
        Request::extensions(self)
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        Request::extensions_mut(self)
    }
}

/// Request ID already resolved for this request
pub fn request_id<R: RequestHead + ?Sized>(request: &R) -> Option<&str> {
    request.vars().and_then(|vars| vars.get(REQUEST_ID_VAR))
}

/// Resolve the request ID, recording it on first call
///
/// Repeated calls for the same request return the same value.
pub fn resolve_request_id<R: RequestHead + ?Sized>(request: &mut R) -> String {
    if let Some(existing) = request_id(request) {
        return existing.to_string();
    }

    let resolved = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.vars_mut().set(REQUEST_ID_VAR, resolved.clone());
    resolved
}
