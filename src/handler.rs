//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! Routes, chains and engines all need to hold handlers of *different*
//! concrete types behind one type, so every handler is erased into a
//! [`BoxedHandler`] (an `Arc<dyn ErasedHandler>`) at registration time.
//!
//! ```text
//! fn show(ctx: &mut Context) -> BoxFuture<'_, Result> { … }   ← user writes this
//!        ↓ router.get("/", show)
//! show.into_boxed_handler()                               ← Handler blanket impl
//!        ↓
//! BoxedHandler(Arc::new(FnHandler(show)))                 ← heap-allocated wrapper
//!        ↓
//! handler.call(&mut ctx)  at request time                 ← one vtable dispatch
//! ```
//!
//! The context is passed as `&mut`: exactly one flow owns it at any moment,
//! so nothing here needs a lock. The returned future borrows the context for
//! as long as it runs, which is why the signature is written out with an
//! explicit lifetime instead of as a plain `async fn`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` because the runtime polls it in place; `Send` so tokio may
/// move the request task between worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in
/// [`BoxedHandler::new`], which engine adapters outside this crate use.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result>;
}

/// A type-erased handler shared across concurrent requests.
///
/// This is what [`MiddlewareChain::then`](crate::MiddlewareChain::then)
/// produces: the whole chain compiled into one callable. Cloning is one
/// atomic increment.
#[derive(Clone)]
pub struct BoxedHandler(Arc<dyn ErasedHandler + Send + Sync + 'static>);

impl BoxedHandler {
    #[doc(hidden)]
    pub fn new(inner: impl ErasedHandler + Send + Sync + 'static) -> Self {
        Self(Arc::new(inner))
    }

    /// Runs the handler (and, for a compiled chain, every middleware in it).
    pub fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result> {
        self.0.call(ctx)
    }
}

impl fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedHandler")
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid terminal handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the signature
///
/// ```text
/// fn name(ctx: &mut Context) -> BoxFuture<'_, Result>
/// ```
///
/// and by [`BoxedHandler`] itself, so a compiled chain can be mounted again.
/// Closures are easiest to write through [`handler_fn`], which pins down the
/// higher-ranked signature for the compiler.
///
/// The trait is **sealed**: only the impls in this module can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F> private::Sealed for F where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result> + Send + Sync + 'static
{
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result> + Send + Sync + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        BoxedHandler::new(FnHandler(self))
    }
}

impl private::Sealed for BoxedHandler {}

impl Handler for BoxedHandler {
    fn into_boxed_handler(self) -> BoxedHandler {
        self
    }
}

/// Identity function that fixes a closure's signature as a handler.
///
/// ```rust
/// use keel::{Context, handler_fn};
///
/// let hello = handler_fn(|ctx: &mut Context| Box::pin(async move {
///     ctx.text("hello");
///     Ok(())
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result> + Send + Sync + 'static,
{
    f
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` into the trait-object world.
struct FnHandler<F>(F);

impl<F> ErasedHandler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result> + Send + Sync,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result> {
        (self.0)(ctx)
    }
}
