//! Route registration and nested groups.
//!
//! A [`Router`] owns one engine and a root scope. Every scope has a base path
//! and a middleware chain; [`Routes::group`] derives a child scope whose base
//! path is joined onto the parent's and whose chain starts as a copy of the
//! parent's. Middleware added to a child never leaks back to the parent or to
//! siblings, and routes registered before a `middleware` call keep the chain
//! they were compiled with.
//!
//! ```rust
//! use keel::{Context, MemoryEngine, Router, Routes, handler_fn, middleware};
//!
//! let mut app = Router::new(MemoryEngine::new());
//! app.middleware(middleware::trace());
//! app.get("/health", handler_fn(|ctx: &mut Context| Box::pin(async move {
//!     ctx.text("ok");
//!     Ok(())
//! })));
//!
//! let mut api = app.group("/api/v1");
//! api.get("/users/:id", handler_fn(|ctx: &mut Context| Box::pin(async move {
//!     let id = ctx.param("id").unwrap_or_default().to_owned();
//!     ctx.text(id);
//!     Ok(())
//! })));
//! ```

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::engine::{Engine, Route};
use crate::fs::ServeDir;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::path;
use crate::wildcard::fix_wildcard_path_if_need;

/// Base path plus inherited middleware of one node in the group tree.
#[doc(hidden)]
#[derive(Clone, Debug)]
pub struct Scope {
    base: String,
    chain: MiddlewareChain,
}

impl Scope {
    fn root() -> Self {
        Self { base: "/".to_owned(), chain: MiddlewareChain::new() }
    }

    fn child(&self, prefix: &str) -> Self {
        Self { base: path::join(&self.base, prefix), chain: self.chain.clone() }
    }
}

// ── Routes ────────────────────────────────────────────────────────────────────

/// Registration interface shared by [`Router`] and [`Group`].
pub trait Routes {
    #[doc(hidden)]
    fn parts(&mut self) -> (&mut dyn Engine, &mut Scope);

    #[doc(hidden)]
    fn scope(&self) -> &Scope;

    /// Base path every route of this scope is registered under.
    fn base_path(&self) -> &str {
        &self.scope().base
    }

    /// Appends middleware to this scope's chain.
    ///
    /// Applies to routes and groups created *after* the call.
    fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.parts().1.chain.push(middleware);
        self
    }

    /// Opens a child scope under `prefix`.
    fn group(&mut self, prefix: &str) -> Group<'_> {
        let (engine, scope) = self.parts();
        Group { scope: scope.child(prefix), engine }
    }

    /// Opens a child scope under `prefix` with `middleware` appended to the
    /// inherited chain. Same as `group(prefix)` followed by one `middleware`
    /// call per item.
    fn group_with<I>(&mut self, prefix: &str, middleware: I) -> Group<'_>
    where
        I: IntoIterator,
        I::Item: Middleware,
    {
        let mut group = self.group(prefix);
        group.scope.chain.extend(middleware);
        group
    }

    /// Registers `handler` behind this scope's chain.
    ///
    /// # Panics
    ///
    /// Panics if the engine rejects the route (conflict, bad syntax).
    /// Routes are registered once at startup, so this is a programming error.
    fn handle(&mut self, method: Method, path: &str, handler: impl Handler) -> &mut Self {
        let (engine, scope) = self.parts();
        let full = path::join(&scope.base, path);
        register(engine, method, &full, scope.chain.then(handler));
        self
    }

    /// Registers `handler` for every method in [`Method::ALL`].
    fn any(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        let (engine, scope) = self.parts();
        let full = path::join(&scope.base, path);
        let compiled = scope.chain.then(handler);
        for method in Method::ALL {
            register(&mut *engine, method, &full, compiled.clone());
        }
        self
    }

    /// Serves files below `root` at `prefix` (`GET` and `HEAD`).
    ///
    /// The tail after the mount point selects the file; `..` segments and
    /// missing files answer `404`.
    fn static_dir(&mut self, prefix: &str, root: impl Into<PathBuf>) -> &mut Self {
        let (engine, scope) = self.parts();
        let mount = path::join(&scope.base, prefix);
        let pattern = if mount.ends_with('/') {
            format!("{mount}*filepath")
        } else {
            format!("{mount}/*filepath")
        };
        let key = fix_wildcard_path_if_need(&*engine, &pattern).key;
        let compiled = scope.chain.then(ServeDir::new(root, key).into_handler());
        register(&mut *engine, Method::Get, &pattern, compiled.clone());
        register(engine, Method::Head, &pattern, compiled);
        self
    }

    fn get(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Get, path, handler)
    }

    fn head(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Head, path, handler)
    }

    fn post(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Post, path, handler)
    }

    fn put(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Put, path, handler)
    }

    fn patch(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Patch, path, handler)
    }

    fn delete(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Delete, path, handler)
    }

    fn options(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Options, path, handler)
    }

    fn connect(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Connect, path, handler)
    }

    fn trace(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Trace, path, handler)
    }
}

/// Normalises the wildcard once and hands the compiled route to the engine.
fn register(engine: &mut dyn Engine, method: Method, full: &str, handler: BoxedHandler) {
    if full.matches('*').count() > 1 {
        warn!(path = full, "more than one catch-all in route; only the first is honoured");
    }
    let normalized = fix_wildcard_path_if_need(&*engine, full);
    debug!(%method, path = %normalized.path, key = %normalized.key, "route registered");
    engine
        .add_route(Route { method, path: normalized, handler })
        .unwrap_or_else(|e| panic!("{e}"));
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The root scope, owning the engine until registration is done.
pub struct Router<E> {
    engine: E,
    scope: Scope,
}

impl<E: Engine> Router<E> {
    pub fn new(engine: E) -> Self {
        Self { engine, scope: Scope::root() }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Ends registration and returns the engine, ready to serve.
    pub fn into_engine(self) -> E {
        self.engine
    }
}

impl<E: Engine> Routes for Router<E> {
    fn parts(&mut self) -> (&mut dyn Engine, &mut Scope) {
        (&mut self.engine, &mut self.scope)
    }

    fn scope(&self) -> &Scope {
        &self.scope
    }
}

// ── Group ─────────────────────────────────────────────────────────────────────

/// A child scope borrowed from its parent for the duration of registration.
pub struct Group<'r> {
    engine: &'r mut dyn Engine,
    scope: Scope,
}

impl Routes for Group<'_> {
    fn parts(&mut self) -> (&mut dyn Engine, &mut Scope) {
        (&mut *self.engine, &mut self.scope)
    }

    fn scope(&self) -> &Scope {
        &self.scope
    }
}
