//! Minimal keel example: groups, an auth guard, static files and a
//! trampoline-style stage, served over HTTP by the radix engine.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/healthz
//!   curl http://localhost:3000/api/users/42
//!   curl -H 'x-token: secret' http://localhost:3000/api/users/42
//!   curl -X DELETE -H 'x-token: secret' http://localhost:3000/api/users/42
//!   curl http://localhost:3000/assets/Cargo.toml

use std::time::Duration;

use keel::middleware::{self, Next};
use keel::{
    Aborter, BoxFuture, Context, RadixEngine, Result, Router, Routes, Server, StatusCode,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut app = Router::new(RadixEngine::new());
    app.middleware(middleware::trace());
    app.get("/healthz", healthz);
    app.static_dir("/assets", ".");

    let mut api = app.group("/api");
    api.middleware(middleware::trampoline(stamp));
    api.middleware(middleware::from_fn(|ctx, next| Box::pin(require_token(ctx, next))));
    api.get("/users/:id", get_user);
    api.delete("/users/:id", delete_user);

    Server::bind("0.0.0.0:3000")
        .request_timeout(Duration::from_secs(30))
        .serve(app.into_engine())
        .await
        .expect("server error");
}

// Trampoline style: do work, advance with ctx.next(), do more work.
fn stamp(ctx: &mut Context) -> BoxFuture<'_, Result> {
    Box::pin(async move {
        let result = ctx.next().await;
        ctx.set_header("x-served-by", "keel");
        result
    })
}

// Onion style guard: writes 401 and stops the chain without an error.
async fn require_token(ctx: &mut Context, next: Next) -> Result {
    if ctx.header("x-token") != Some("secret") {
        ctx.set_status(StatusCode::UNAUTHORIZED);
        ctx.text("missing or wrong x-token");
        ctx.abort();
        return Ok(());
    }
    ctx.set("user", String::from("alice"));
    next.run(ctx).await
}

fn healthz(ctx: &mut Context) -> BoxFuture<'_, Result> {
    Box::pin(async move {
        ctx.text("ok");
        Ok(())
    })
}

// GET /api/users/:id
fn get_user(ctx: &mut Context) -> BoxFuture<'_, Result> {
    Box::pin(async move {
        let id = ctx.param("id").unwrap_or("unknown").to_owned();
        let by = ctx.get::<String>("user").cloned().unwrap_or_default();
        ctx.json(format!(r#"{{"id":"{id}","requested_by":"{by}"}}"#));
        Ok(())
    })
}

// DELETE /api/users/:id → 204 No Content
fn delete_user(ctx: &mut Context) -> BoxFuture<'_, Result> {
    Box::pin(async move {
        ctx.no_content();
        Ok(())
    })
}
