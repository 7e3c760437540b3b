//! In-process engine with its own trampoline-style native middleware.
//!
//! `MemoryEngine` answers requests without a socket, which makes it the
//! engine of choice for tests and for embedding. It is deliberately built
//! the other way round from [`RadixEngine`](super::RadixEngine):
//!
//! - routes are matched segment by segment, in registration order;
//! - catch-alls are anonymous only (`/files/*`), so canonical `*name` paths
//!   are rewritten by the normaliser and the tail is reported under `*`
//!   (and aliased back to the original name);
//! - engine-level middleware is written trampoline style (stages that call
//!   [`Context::next`](crate::Context::next)) and wraps every route added
//!   after it.
//!
//! Native stages share the request's [`Context`] with the core chain, so an
//! abort set on either side is the same flag.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use http::StatusCode;

use crate::cancel::Signal;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::middleware::{MiddlewareChain, trampoline};
use crate::request::Request;
use crate::response::Response;
use crate::wildcard::{ANONYMOUS, WildcardSupport};

use super::{Engine, Route, drive};

/// The native handle this engine attaches to every [`Context`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Native {
    /// 1-based dispatch counter.
    pub sequence: u64,
}

/// The in-process engine.
#[derive(Default)]
pub struct MemoryEngine {
    routes: Vec<Route>,
    native: MiddlewareChain,
    dispatched: AtomicU64,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an engine-level stage. It wraps routes registered afterwards.
    pub fn use_native(&mut self, stage: impl Handler) -> &mut Self {
        self.native.push(trampoline(stage));
        self
    }

    /// Answers one request with a background (never canceled) signal.
    pub async fn dispatch(&self, request: Request) -> Response {
        self.dispatch_with(request, Signal::background()).await
    }

    /// Answers one request under the given cancellation source.
    pub async fn dispatch_with(&self, request: Request, signal: Signal) -> Response {
        let sequence = self.dispatched.fetch_add(1, Ordering::Relaxed) + 1;
        let matched = self.routes.iter().find_map(|route| {
            if route.method != request.method() {
                return None;
            }
            let mut params = match_segments(&route.path.path, request.path())?;
            route.alias_wildcard(&mut params);
            Some((route, params))
        });
        let Some((route, params)) = matched else {
            return Response::from_status(StatusCode::NOT_FOUND, "not found");
        };
        let ctx = Context::new(request.with_params(params), signal).with_native(Native { sequence });
        drive(&route.handler, ctx).await
    }
}

impl WildcardSupport for MemoryEngine {
    fn supports_named_wildcard(&self) -> bool {
        false
    }
}

impl Engine for MemoryEngine {
    fn add_route(&mut self, mut route: Route) -> Result {
        let path = &route.path.path;
        let invalid = |reason: &str| Error::InvalidRoute { path: path.clone(), reason: reason.to_owned() };

        if let Some(star) = path.find('*') {
            if &path[star..] != ANONYMOUS || !path[..star].ends_with('/') {
                return Err(invalid("catch-all must be a trailing anonymous `*` segment"));
            }
        }
        if self.routes.iter().any(|r| r.method == route.method && r.path.path == *path) {
            return Err(invalid("route already registered"));
        }

        route.handler = self.native.then(route.handler);
        self.routes.push(route);
        Ok(())
    }
}

/// Matches `path` against a pattern of literal, `:name` and trailing `*`
/// segments. A catch-all needs a non-empty tail.
fn match_segments(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let wanted: Vec<&str> = pattern.split('/').collect();
    let given: Vec<&str> = path.split('/').collect();
    let mut params = HashMap::new();

    for (i, segment) in wanted.iter().enumerate() {
        if *segment == ANONYMOUS {
            let tail = given.get(i..)?.join("/");
            if tail.is_empty() {
                return None;
            }
            params.insert(ANONYMOUS.to_owned(), tail);
            return Some(params);
        }
        let actual = *given.get(i)?;
        match segment.strip_prefix(':') {
            Some(name) if !actual.is_empty() => {
                params.insert(name.to_owned(), actual.to_owned());
            }
            Some(_) => return None,
            None if *segment == actual => {}
            None => return None,
        }
    }

    (wanted.len() == given.len()).then_some(params)
}
