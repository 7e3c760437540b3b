//! Ordered middleware chains and their compilation into one handler.

use crate::context::Context;
use crate::error::Result;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};

use super::{BoxedMiddleware, Middleware, Next};

/// An ordered list of middleware.
///
/// Position is the only identity: pushing the same middleware twice runs it
/// twice. Cloning copies the list, so pushes on a clone are invisible to the
/// original and the other way round.
#[derive(Clone, Debug, Default)]
pub struct MiddlewareChain {
    stack: Vec<BoxedMiddleware>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one middleware. Handlers compiled earlier are not affected.
    pub fn push(&mut self, middleware: impl Middleware) -> &mut Self {
        self.stack.push(middleware.into_boxed_middleware());
        self
    }

    /// Appends several middleware in order.
    pub fn extend<I>(&mut self, middleware: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Middleware,
    {
        self.stack
            .extend(middleware.into_iter().map(Middleware::into_boxed_middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Compiles the chain around `terminal` into a single handler.
    ///
    /// The result is `m[0](m[1](…m[n-1](terminal)))`: pre-continuation code
    /// runs first to last, the terminal runs, and post-continuation code runs
    /// last to first. The compiled handler captures the chain as it is now.
    /// An empty chain returns `terminal` itself.
    pub fn then(&self, terminal: impl Handler) -> BoxedHandler {
        self.stack
            .iter()
            .rev()
            .fold(terminal.into_boxed_handler(), |next, middleware| {
                BoxedHandler::new(Layer { middleware: middleware.clone(), next })
            })
    }
}

/// One middleware bound to everything below it.
struct Layer {
    middleware: BoxedMiddleware,
    next: BoxedHandler,
}

impl ErasedHandler for Layer {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result> {
        self.middleware.call(ctx, Next::new(self.next.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::cancel::Signal;
    use crate::handler::handler_fn;
    use crate::method::Method;
    use crate::middleware::from_fn;
    use crate::request::Request;

    type Log = Arc<Mutex<Vec<String>>>;

    async fn tag(ctx: &mut Context, next: Next, log: Log, name: &'static str) -> Result {
        log.lock().unwrap().push(format!("before {name}"));
        let result = next.run(ctx).await;
        log.lock().unwrap().push(format!("after {name}"));
        result
    }

    fn tagger(log: &Log, name: &'static str) -> impl Middleware + use<> {
        let log = Arc::clone(log);
        from_fn(move |ctx, next| Box::pin(tag(ctx, next, Arc::clone(&log), name)))
    }

    fn terminal(log: &Log) -> impl Handler + use<> {
        let log = Arc::clone(log);
        handler_fn(move |_ctx| {
            log.lock().unwrap().push("handler".into());
            Box::pin(async { Ok(()) })
        })
    }

    fn ctx() -> Context {
        Context::new(Request::new(Method::Get, "/"), Signal::background())
    }

    #[tokio::test]
    async fn empty_chain_runs_terminal_directly() {
        let log = Log::default();
        let compiled = MiddlewareChain::new().then(terminal(&log));
        compiled.call(&mut ctx()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["handler"]);
    }

    #[tokio::test]
    async fn compiled_handler_ignores_later_pushes() {
        let log = Log::default();
        let mut chain = MiddlewareChain::new();
        chain.push(tagger(&log, "A"));
        let compiled = chain.then(terminal(&log));
        chain.push(tagger(&log, "B"));

        compiled.call(&mut ctx()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["before A", "handler", "after A"]);
        assert_eq!(chain.len(), 2);
    }

    #[tokio::test]
    async fn duplicates_run_once_per_position() {
        let log = Log::default();
        let mw = tagger(&log, "A").into_boxed_middleware();
        let mut chain = MiddlewareChain::new();
        chain.extend([mw.clone(), mw]);

        chain.then(terminal(&log)).call(&mut ctx()).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            ["before A", "before A", "handler", "after A", "after A"]
        );
    }
}
