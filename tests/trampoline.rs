//! Cursor-style stages (`ctx.next()`) running inside onion chains.

use std::sync::{Arc, Mutex};

use keel::middleware::{Next, from_fn, trampoline};
use keel::{
    Aborter, Context, Error, Handler, Method, Middleware, MiddlewareChain, Request, Result, Signal,
    StatusCode, handler_fn,
};

type Log = Arc<Mutex<Vec<String>>>;

fn ctx() -> Context {
    Context::new(Request::new(Method::Get, "/"), Signal::background())
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn counting_terminal(log: &Log) -> impl Handler + use<> {
    let log = Arc::clone(log);
    handler_fn(move |_ctx| {
        log.lock().unwrap().push("handler".into());
        Box::pin(async { Ok(()) })
    })
}

async fn tag(ctx: &mut Context, next: Next, log: Log, name: &'static str) -> Result {
    log.lock().unwrap().push(format!("before {name}"));
    let result = next.run(ctx).await;
    log.lock().unwrap().push(format!("after {name}"));
    result
}

fn onion(log: &Log, name: &'static str) -> impl Middleware + use<> {
    let log = Arc::clone(log);
    from_fn(move |ctx, next| Box::pin(tag(ctx, next, Arc::clone(&log), name)))
}

async fn step(ctx: &mut Context, log: Log, name: &'static str) -> Result {
    log.lock().unwrap().push(format!("before {name}"));
    let result = ctx.next().await;
    log.lock().unwrap().push(format!("after {name}"));
    result
}

fn cursor(log: &Log, name: &'static str) -> impl Middleware + use<> {
    let log = Arc::clone(log);
    trampoline(handler_fn(move |ctx| Box::pin(step(ctx, Arc::clone(&log), name))))
}

async fn next_twice(ctx: &mut Context) -> Result {
    ctx.next().await?;
    ctx.next().await
}

#[tokio::test]
async fn second_next_is_a_no_op() {
    let log = Log::default();
    let mut chain = MiddlewareChain::new();
    chain.push(trampoline(handler_fn(|ctx| Box::pin(next_twice(ctx)))));

    chain.then(counting_terminal(&log)).call(&mut ctx()).await.unwrap();

    assert_eq!(entries(&log), ["handler"]);
}

#[tokio::test]
async fn next_outside_any_stage_is_a_no_op() {
    let mut ctx = ctx();
    ctx.next().await.unwrap();
    ctx.next().await.unwrap();
}

#[tokio::test]
async fn cursor_and_onion_stages_interleave() {
    let log = Log::default();
    let mut chain = MiddlewareChain::new();
    chain
        .push(onion(&log, "A"))
        .push(cursor(&log, "B"))
        .push(onion(&log, "C"))
        .push(cursor(&log, "D"));

    chain.then(counting_terminal(&log)).call(&mut ctx()).await.unwrap();

    assert_eq!(
        entries(&log),
        [
            "before A", "before B", "before C", "before D", "handler", "after D", "after C",
            "after B", "after A",
        ]
    );
}

async fn observe_error(ctx: &mut Context, log: Log) -> Result {
    let result = ctx.next().await;
    if let Err(err) = &result {
        log.lock().unwrap().push(format!("saw {}", err.status().as_u16()));
    }
    result
}

#[tokio::test]
async fn errors_come_back_through_next() {
    let log = Log::default();
    let observer_log = Arc::clone(&log);
    let mut chain = MiddlewareChain::new();
    chain.push(trampoline(handler_fn(move |ctx| {
        Box::pin(observe_error(ctx, Arc::clone(&observer_log)))
    })));
    let failing = handler_fn(|_ctx| {
        Box::pin(async { Err(Error::http(StatusCode::CONFLICT, "taken")) })
    });

    let err = chain.then(failing).call(&mut ctx()).await.unwrap_err();

    assert_eq!(err.status(), StatusCode::CONFLICT);
    assert_eq!(entries(&log), ["saw 409"]);
}

#[tokio::test]
async fn stage_that_never_advances_truncates_the_chain() {
    let log = Log::default();
    let mut chain = MiddlewareChain::new();
    chain.push(onion(&log, "A"));
    chain.push(trampoline(handler_fn(|ctx| {
        Box::pin(async move {
            ctx.set_status(StatusCode::TOO_MANY_REQUESTS);
            Ok(())
        })
    })));
    chain.push(onion(&log, "C"));

    let mut ctx = ctx();
    chain.then(counting_terminal(&log)).call(&mut ctx).await.unwrap();

    assert_eq!(entries(&log), ["before A", "after A"]);
    assert_eq!(ctx.response().status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn abort_inside_a_stage_makes_next_a_no_op() {
    let log = Log::default();
    let mut chain = MiddlewareChain::new();
    chain.push(trampoline(handler_fn(|ctx| {
        Box::pin(async move {
            ctx.abort();
            ctx.next().await
        })
    })));

    let mut ctx = ctx();
    chain.then(counting_terminal(&log)).call(&mut ctx).await.unwrap();

    assert!(ctx.is_aborted());
    assert!(entries(&log).is_empty());
}
