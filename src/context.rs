//! The per-request context.
//!
//! One [`Context`] exists per inbound request. The engine builds it, the
//! compiled chain borrows it mutably from the first middleware down to the
//! handler and back, and the engine takes the written response out of it at
//! the end. It is never shared between requests, so nothing in it is locked.
//!
//! Besides request and response access it carries:
//!
//! - a scoped key/value store for middleware to pass data downstream;
//! - the monotonic abort flag ([`Aborter`]);
//! - the pending continuation used by [`Context::next`] (trampoline style);
//! - the request's cancellation source ([`Cancellation`]);
//! - an optional engine-native handle ([`Context::native`]).

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::StatusCode;

use crate::cancel::{CancelReason, Cancellation, Signal, Value};
use crate::error::{Error, Result};
use crate::handler::BoxFuture;
use crate::method::Method;
use crate::middleware::Next;
use crate::request::Request;
use crate::response::{ContentType, Response};

// ── Aborter ───────────────────────────────────────────────────────────────────

/// Stop-forward-progress capability.
///
/// Aborting never discards what was already written and never interrupts the
/// unwind: middleware that already ran its continuation still gets control
/// back. It only turns every *later* continuation call into a no-op.
pub trait Aborter {
    /// Sets the abort flag. Idempotent; there is no way to clear it.
    fn abort(&mut self);

    fn is_aborted(&self) -> bool;
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Everything a middleware or handler knows about the current request.
pub struct Context {
    request: Request,
    response: Response,
    store: HashMap<String, Value>,
    aborted: bool,
    pending: Option<Next>,
    signal: Signal,
    native: Option<(Box<dyn Any + Send + Sync>, &'static str)>,
}

impl Context {
    pub fn new(request: Request, signal: Signal) -> Self {
        Self {
            request,
            response: Response::default(),
            store: HashMap::new(),
            aborted: false,
            pending: None,
            signal,
            native: None,
        }
    }

    /// Attaches the engine-native handle; see [`Context::native`].
    pub fn with_native<T: Any + Send + Sync>(mut self, native: T) -> Self {
        self.native = Some((Box::new(native), type_name::<T>()));
        self
    }

    // ── Request view ──────────────────────────────────────────────────────────

    pub fn request(&self) -> &Request { &self.request }
    pub fn method(&self) -> Method { self.request.method() }
    pub fn path(&self) -> &str { self.request.path() }
    pub fn header(&self, name: &str) -> Option<&str> { self.request.header(name) }
    pub fn param(&self, key: &str) -> Option<&str> { self.request.param(key) }
    pub fn query(&self, key: &str) -> Option<&str> { self.request.query_value(key) }
    pub fn body(&self) -> &Bytes { self.request.body() }

    // ── Response writes ───────────────────────────────────────────────────────

    /// What has been written so far.
    pub fn response(&self) -> &Response { &self.response }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.response.set_header(name, value);
    }

    /// `text/plain; charset=utf-8` body.
    pub fn text(&mut self, body: impl Into<String>) {
        self.bytes(ContentType::Text, body.into());
    }

    /// `application/json` body. Pass bytes straight from your serialiser.
    pub fn json(&mut self, body: impl Into<Bytes>) {
        self.bytes(ContentType::Json, body);
    }

    /// Body with an explicit content type.
    pub fn bytes(&mut self, content_type: ContentType, body: impl Into<Bytes>) {
        self.response.set_body(content_type.as_str(), body.into());
    }

    /// `204 No Content`, dropping any body written earlier.
    pub fn no_content(&mut self) {
        self.response.set_status(StatusCode::NO_CONTENT);
        self.response.clear_body();
    }

    /// Finalizes the response. Later writes are ignored (and logged).
    pub fn commit(&mut self) {
        self.response.commit();
    }

    /// Answers with an error unless the response is already committed.
    ///
    /// Engines call this when an error survives the whole chain.
    pub fn fail(&mut self, err: &Error) {
        self.response.fail(err.status(), &err.to_string());
    }

    /// Commits and hands the written response to the engine.
    pub fn into_response(mut self) -> Response {
        self.response.commit();
        self.response
    }

    // ── Scoped store ──────────────────────────────────────────────────────────

    /// Stores `value` under `key` for the rest of this request.
    pub fn set(&mut self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.store.insert(key.into(), Arc::new(value));
    }

    /// Typed lookup in the scoped store only.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.store.get(key)?.downcast_ref()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    // ── Continuation (trampoline) ─────────────────────────────────────────────

    /// Runs the rest of the chain from inside a
    /// [`trampoline`](crate::middleware::trampoline) stage.
    ///
    /// The pending continuation is taken out of the context before it runs,
    /// so calling `next` again in the same stage finds nothing and returns
    /// `Ok(())` without re-running anything. The same no-op happens when no
    /// continuation is pending or the request has been aborted.
    pub async fn next(&mut self) -> Result {
        match self.pending.take() {
            Some(next) => next.run(self).await,
            None => Ok(()),
        }
    }

    pub(crate) fn replace_pending(&mut self, next: Option<Next>) -> Option<Next> {
        std::mem::replace(&mut self.pending, next)
    }

    // ── Engine-native handle ──────────────────────────────────────────────────

    /// Borrows the engine-native handle as `T`.
    ///
    /// Code written against one engine's native type that ends up running on
    /// another gets [`Error::ContextMismatch`] immediately.
    pub fn native<T: Any>(&self) -> Result<&T> {
        let found = self.native.as_ref().map_or("none", |(_, name)| *name);
        self.native
            .as_ref()
            .and_then(|(native, _)| native.downcast_ref::<T>())
            .ok_or(Error::ContextMismatch { expected: type_name::<T>(), found })
    }

    /// The raw cancellation source, e.g. to hand a child to spawned work.
    pub fn signal(&self) -> &Signal { &self.signal }
}

impl Aborter for Context {
    fn abort(&mut self) {
        self.aborted = true;
    }

    fn is_aborted(&self) -> bool {
        self.aborted
    }
}

/// Delegates to the request's [`Signal`]; `value` checks the scoped store first.
impl Cancellation for Context {
    fn deadline(&self) -> Option<Instant> {
        self.signal.deadline()
    }

    fn done(&self) -> BoxFuture<'static, ()> {
        self.signal.done()
    }

    fn err(&self) -> Option<CancelReason> {
        self.signal.err()
    }

    fn value(&self, key: &str) -> Option<&Value> {
        self.store.get(key).or_else(|| self.signal.value(key))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.request.method())
            .field("path", &self.request.path())
            .field("aborted", &self.aborted)
            .field("keys", &self.store.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
