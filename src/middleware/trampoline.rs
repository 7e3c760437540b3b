//! Trampoline-style stages on top of the onion chain.
//!
//! Some engines drive middleware through one mutable context with a cursor:
//! a stage does its work, calls `ctx.next()` to advance, and may do more
//! work after that call returns. [`trampoline`] lets such a stage live in a
//! [`MiddlewareChain`](super::MiddlewareChain) next to onion middleware, so
//! adapters never pick between two execution engines.
//!
//! The continuation is parked in the context while the stage runs and is
//! taken out (capture-and-clear) the first time the stage calls
//! [`Context::next`]. A second call finds the slot empty and is a no-op.

use crate::context::Context;
use crate::error::Result;
use crate::handler::{BoxFuture, BoxedHandler, Handler};

use super::{ErasedMiddleware, Next};

/// A handler-shaped stage that advances the chain with [`Context::next`].
#[derive(Clone, Debug)]
pub struct Trampoline {
    stage: BoxedHandler,
}

/// Wraps a handler-shaped stage as middleware.
///
/// If the stage returns without calling `ctx.next()`, the rest of the chain
/// is skipped, exactly as when an onion middleware does not run its `Next`.
pub fn trampoline(stage: impl Handler) -> Trampoline {
    Trampoline { stage: stage.into_boxed_handler() }
}

impl ErasedMiddleware for Trampoline {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Result> {
        Box::pin(async move {
            let outer = ctx.replace_pending(Some(next));
            let result = self.stage.call(ctx).await;
            ctx.replace_pending(outer);
            result
        })
    }
}
