//! Per-request tracing span.
//!
//! ```text
//! INFO request{method=GET path=/users/42}: keel::middleware::trace: finished status=200 latency_us=84 aborted=false
//! ```

use std::time::{Duration, Instant};

use tracing::{Instrument, info, info_span};

use crate::context::{Aborter, Context};
use crate::error::Result;

use super::{Middleware, Next, from_fn};

/// Opens an `info` span around everything below it and logs one line when
/// control comes back up.
///
/// The logged status is the one the engine will answer with: the written
/// status on success, the error's status when an error is propagating.
/// The error itself is passed up untouched.
pub fn trace() -> impl Middleware {
    from_fn(|ctx, next| {
        let span = info_span!("request", method = %ctx.method(), path = %ctx.path());
        Box::pin(traced(ctx, next).instrument(span))
    })
}

async fn traced(ctx: &mut Context, next: Next) -> Result {
    let started = Instant::now();
    let result = next.run(ctx).await;
    let status = match &result {
        Ok(()) => ctx.response().status(),
        Err(err) => err.status(),
    };
    info!(
        status = status.as_u16(),
        latency_us = micros(started.elapsed()),
        aborted = ctx.is_aborted(),
        failed = result.is_err(),
        "finished"
    );
    result
}

/// Whole microseconds, saturating at `u64::MAX`.
fn micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_saturates_instead_of_wrapping() {
        assert_eq!(micros(Duration::from_millis(3)), 3_000);
        assert_eq!(micros(Duration::MAX), u64::MAX);
    }
}
