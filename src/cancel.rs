//! Request cancellation source.
//!
//! The core never starts a timer or cancels anything on its own. Engines hand
//! every [`Context`](crate::Context) a [`Signal`] derived from their own
//! lifecycle (server shutdown, per-request timeout), and the context simply
//! reports it through the [`Cancellation`] trait so downstream code can wait
//! on it the same way regardless of where it came from.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::handler::BoxFuture;

/// A value stored in a [`Signal`] or in a context's scoped store.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Why a cancellation source is done.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CancelReason {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Deadline / done / err / value, the four questions cancellation-aware code
/// asks of its surroundings.
pub trait Cancellation {
    /// When the work must be finished, if anyone said.
    fn deadline(&self) -> Option<Instant>;

    /// Resolves once the source is canceled or its deadline passes.
    fn done(&self) -> BoxFuture<'static, ()>;

    /// `None` while live; the reason once [`done`](Cancellation::done) would resolve.
    fn err(&self) -> Option<CancelReason>;

    /// A value attached to the source under `key`.
    fn value(&self, key: &str) -> Option<&Value>;
}

/// The concrete cancellation source engines attach to each request.
#[derive(Clone, Default)]
pub struct Signal {
    token: CancellationToken,
    deadline: Option<Instant>,
    values: Arc<HashMap<String, Value>>,
}

impl Signal {
    /// A source that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives from an existing token; canceling the token cancels the signal.
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token, ..Self::default() }
    }

    /// A child: canceled with its parent, cancelable on its own, same
    /// deadline and values.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            values: Arc::clone(&self.values),
        }
    }

    /// Sets a deadline. An earlier existing deadline wins.
    pub fn with_deadline(mut self, at: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < at => existing,
            _ => at,
        });
        self
    }

    /// Sets a deadline `timeout` from now. A timeout too large to represent
    /// as an instant means no deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(at) => self.with_deadline(at),
            None => self,
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Any + Send + Sync) -> Self {
        Arc::make_mut(&mut self.values).insert(key.into(), Arc::new(value));
        self
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Cancellation for Signal {
    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn done(&self) -> BoxFuture<'static, ()> {
        let token = self.token.clone();
        let deadline = self.deadline;
        Box::pin(async move {
            match deadline {
                Some(at) => tokio::select! {
                    () = token.cancelled() => {}
                    () = tokio::time::sleep_until(tokio::time::Instant::from_std(at)) => {}
                },
                None => token.cancelled().await,
            }
        })
    }

    fn err(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Canceled);
        }
        match self.deadline {
            Some(at) if Instant::now() >= at => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("canceled", &self.token.is_cancelled())
            .field("deadline", &self.deadline)
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}
