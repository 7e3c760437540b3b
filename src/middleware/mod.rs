//! Middleware layer.
//!
//! Middleware wraps a continuation. It runs code before handing control
//! down, code after control comes back, or decides not to hand control down
//! at all:
//!
//! ```rust
//! use keel::{Context, Error, Result, StatusCode};
//! use keel::middleware::{self, Next};
//!
//! async fn require_token(ctx: &mut Context, next: Next) -> Result {
//!     if ctx.header("authorization").is_none() {
//!         // Not running `next` truncates the chain here.
//!         return Err(Error::http(StatusCode::UNAUTHORIZED, "missing token"));
//!     }
//!     let result = next.run(ctx).await;      // everything below us
//!     ctx.set_header("x-authenticated", "1"); // post-continuation code
//!     result
//! }
//!
//! let guard = middleware::from_fn(|ctx, next| Box::pin(require_token(ctx, next)));
//! ```
//!
//! Two continuation styles are supported on top of the same compiled chain:
//!
//! - **onion** (canonical): the middleware receives a [`Next`] and calls
//!   [`Next::run`]. `Next` is consumed by `run`, so it cannot run twice.
//! - **trampoline**: a handler-shaped stage wrapped with [`trampoline`]
//!   calls [`Context::next`](crate::Context::next) instead.
//!
//! Built-in middleware:
//! - [`trace`]: per-request span with method, path, status and latency

mod chain;
mod trace;
mod trampoline;

use std::fmt;
use std::sync::Arc;

use crate::context::{Aborter, Context};
use crate::error::Result;
use crate::handler::{BoxFuture, BoxedHandler};

pub use chain::MiddlewareChain;
pub use trace::trace;
pub use trampoline::{Trampoline, trampoline};

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the chain below the current middleware.
pub struct Next {
    handler: BoxedHandler,
}

impl Next {
    pub(crate) fn new(handler: BoxedHandler) -> Self {
        Self { handler }
    }

    /// Runs everything below the current middleware and returns its result.
    ///
    /// Returns `Ok(())` without running anything once the request has been
    /// aborted: abort stops forward progress, the caller still unwinds.
    pub async fn run(self, ctx: &mut Context) -> Result {
        if ctx.is_aborted() {
            return Ok(());
        }
        self.handler.call(ctx).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Next")
    }
}

// ── Middleware trait ──────────────────────────────────────────────────────────

/// Internal dispatch interface, the middleware twin of
/// [`ErasedHandler`](crate::handler::ErasedHandler).
#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Result>;
}

/// A type-erased middleware, shared by every chain it was pushed onto.
#[derive(Clone)]
pub struct BoxedMiddleware(Arc<dyn ErasedMiddleware + Send + Sync + 'static>);

impl BoxedMiddleware {
    #[doc(hidden)]
    pub fn new(inner: impl ErasedMiddleware + Send + Sync + 'static) -> Self {
        Self(Arc::new(inner))
    }

    pub(crate) fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Result> {
        self.0.call(ctx, next)
    }
}

impl fmt::Debug for BoxedMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedMiddleware")
    }
}

/// Implemented for every valid middleware.
///
/// Satisfied by any function or closure with the signature
///
/// ```text
/// fn name(ctx: &mut Context, next: Next) -> BoxFuture<'_, Result>
/// ```
///
/// by [`Trampoline`] stages and by [`BoxedMiddleware`]. Sealed like
/// [`Handler`](crate::Handler).
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F> private::Sealed for F where
    F: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, Result> + Send + Sync + 'static
{
}

impl<F> Middleware for F
where
    F: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, Result> + Send + Sync + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        BoxedMiddleware::new(FnMiddleware(self))
    }
}

impl private::Sealed for BoxedMiddleware {}

impl Middleware for BoxedMiddleware {
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        self
    }
}

impl private::Sealed for Trampoline {}

impl Middleware for Trampoline {
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        BoxedMiddleware::new(self)
    }
}

/// Identity function that fixes a closure's signature as a middleware.
pub fn from_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, Result> + Send + Sync + 'static,
{
    f
}

struct FnMiddleware<F>(F);

impl<F> ErasedMiddleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, Result> + Send + Sync,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Result> {
        (self.0)(ctx, next)
    }
}
