//! Radix-tree engine backed by [`matchit`].
//!
//! One tree per method, O(path-length) lookup. Canonical route syntax is
//! translated once at registration:
//!
//! | canonical | matchit |
//! |---|---|
//! | `/users/:id` | `/users/{id}` |
//! | `/files/*filepath` | `/files/{*filepath}` |
//! | `/files/*` | `/files/{*…}` reported back under `*` |
//!
//! This engine has no native middleware of its own; everything runs through
//! the compiled chain. It is served over HTTP by [`Server`](crate::Server).

use std::collections::HashMap;
use std::net::SocketAddr;

use matchit::Router as MatchitRouter;

use crate::cancel::Signal;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::wildcard::{ANONYMOUS, WildcardSupport};

use super::{Engine, Route, drive};

/// Parameter name an anonymous catch-all gets inside matchit.
const TAIL: &str = "__keel_tail";

/// The native handle this engine attaches to every [`Context`].
#[derive(Clone, Copy, Debug)]
pub struct Native {
    pub remote_addr: SocketAddr,
    pub version: http::Version,
}

/// The radix-tree engine.
#[derive(Default)]
pub struct RadixEngine {
    routes: HashMap<Method, MatchitRouter<Route>>,
}

impl RadixEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the route for `method` + `path` and the parameters it matched.
    pub fn lookup(&self, method: Method, path: &str) -> Option<(&Route, HashMap<String, String>)> {
        let matched = self.routes.get(&method)?.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| {
                let key = if k == TAIL { ANONYMOUS } else { k };
                (key.to_owned(), v.to_owned())
            })
            .collect();
        Some((matched.value, params))
    }

    /// Runs one request through the matching route.
    pub async fn dispatch(&self, request: Request, signal: Signal, native: Native) -> Response {
        let Some((route, params)) = self.lookup(request.method(), request.path()) else {
            return Response::from_status(http::StatusCode::NOT_FOUND, "not found");
        };
        let ctx = Context::new(request.with_params(params), signal).with_native(native);
        drive(&route.handler, ctx).await
    }
}

impl WildcardSupport for RadixEngine {
    fn supports_named_wildcard(&self) -> bool {
        true
    }
}

impl Engine for RadixEngine {
    fn add_route(&mut self, route: Route) -> Result {
        let native = to_matchit(&route.path.path);
        let canonical = route.path.path.clone();
        self.routes
            .entry(route.method)
            .or_default()
            .insert(native, route)
            .map_err(|e| Error::InvalidRoute { path: canonical, reason: e.to_string() })
    }
}

/// Translates canonical segments into matchit's `{…}` syntax.
fn to_matchit(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{name}}}")
            } else if let Some(name) = segment.strip_prefix('*') {
                let name = if name.is_empty() { TAIL } else { name };
                format!("{{*{name}}}")
            } else {
                segment.replace('{', "{{").replace('}', "}}")
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
