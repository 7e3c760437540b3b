//! # keel
//!
//! One `Context` / `Handler` / `Middleware` contract, any HTTP engine
//! underneath. Execution order, abort semantics and error propagation are
//! the same whichever engine runs the chain.
//!
//! ## The contract
//!
//! - A **handler** takes `&mut Context` and returns `Result`.
//! - A **middleware** takes `&mut Context` plus a [`Next`](middleware::Next)
//!   continuation. Code before `next.run(ctx)` runs on the way down, code
//!   after it on the way back up. Not running `next` stops the chain there.
//! - A [`MiddlewareChain`] compiles into one handler:
//!   `m0(m1(…(terminal)))`.
//! - [`Aborter::abort`] stops forward progress for the rest of the request
//!   without undoing anything already written or skipping the unwind.
//! - Errors travel back up through every middleware, which may inspect,
//!   replace or swallow them. Only the engine turns a surviving error into a
//!   response.
//!
//! Engines that drive middleware with a cursor (`ctx.next()`) instead of an
//! explicit continuation are served by [`middleware::trampoline`], a shim over
//! the same compiled chain.
//!
//! ## What the engine owns
//!
//! Route matching, the listener, TLS, shutdown. Two engines ship with the
//! crate: [`RadixEngine`] (matchit + hyper, via [`Server`]) and
//! [`MemoryEngine`] (in-process, handy for tests). Route paths are written in
//! one canonical syntax (`/users/:id`, `/files/*filepath`) and normalised for
//! each engine with [`fix_wildcard_path_if_need`] at registration time.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use keel::{BoxFuture, Context, Error, RadixEngine, Result, Router, Routes, Server};
//! use keel::middleware::{self, Next};
//! use keel::StatusCode;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut app = Router::new(RadixEngine::new());
//!     app.middleware(middleware::trace());
//!
//!     let mut users = app.group("/users");
//!     users.middleware(middleware::from_fn(|ctx, next| Box::pin(auth(ctx, next))));
//!     users.get("/:id", get_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app.into_engine()).await.unwrap();
//! }
//!
//! async fn auth(ctx: &mut Context, next: Next) -> Result {
//!     if ctx.header("authorization").is_none() {
//!         return Err(Error::http(StatusCode::UNAUTHORIZED, "missing token"));
//!     }
//!     next.run(ctx).await
//! }
//!
//! fn get_user(ctx: &mut Context) -> BoxFuture<'_, Result> {
//!     Box::pin(async move {
//!         let id = ctx.param("id").unwrap_or("unknown").to_owned();
//!         ctx.json(format!(r#"{{"id":"{id}"}}"#));
//!         Ok(())
//!     })
//! }
//! ```

mod cancel;
mod context;
mod error;
mod fs;
mod handler;
mod method;
mod path;
mod request;
mod response;
mod router;
mod server;
mod wildcard;

pub mod engine;
pub mod middleware;

pub use cancel::{CancelReason, Cancellation, Signal, Value};
pub use context::{Aborter, Context};
pub use engine::{Engine, MemoryEngine, RadixEngine, Route};
pub use error::{Error, Result};
pub use handler::{BoxFuture, BoxedHandler, Handler, handler_fn};
pub use http::StatusCode;
pub use method::{Method, UnknownMethod};
pub use middleware::{Middleware, MiddlewareChain};
pub use path::join as join_path;
pub use request::Request;
pub use response::{ContentType, Response};
pub use router::{Group, Router, Routes};
pub use server::{Server, ServerConfig};
pub use wildcard::{WildcardPath, WildcardSupport, fix_wildcard_path_if_need};
