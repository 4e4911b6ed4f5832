//! Instrumentation hooks around dispatch.
//!
//! A [`Tracker`] is invoked at fixed points of the dispatch lifecycle:
//!
//! ```text
//! bytes ──decode fails──► notice_error
//!   │
//!   ▼
//! lookup ──not found────► notice_event_error
//!   │
//!   ▼
//! start ─► Handler::serve ─► end        (batch items: + notice_event_error on failure)
//! ```
//!
//! Every hook returns a context, possibly decorated, that the dispatcher
//! propagates to whatever runs next. [`NoOpTracker`] is the default;
//! [`TracingTracker`] logs through `tracing`.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::context::Context;
use crate::core::Event;
use crate::error::TrackedError;

/// Instrumentation capability set.
pub trait Tracker: Send + Sync + 'static {
    /// Called right before a matched handler runs.
    fn start(&self, ctx: Context, event: &Event) -> Context;

    /// Called right after a matched handler returns, failed or not.
    fn end(&self, ctx: Context, event: &Event, error: Option<&TrackedError>) -> Context;

    /// Called when inbound bytes could not be decoded into an envelope.
    fn notice_error(&self, ctx: Context, error: &TrackedError) -> Context;

    /// Called for event-level failures: no handler found, or a failing batch item.
    fn notice_event_error(&self, ctx: Context, event: &Event, error: &TrackedError) -> Context;
}

impl<T: Tracker + ?Sized> Tracker for Arc<T> {
    fn start(&self, ctx: Context, event: &Event) -> Context {
        (**self).start(ctx, event)
    }

    fn end(&self, ctx: Context, event: &Event, error: Option<&TrackedError>) -> Context {
        (**self).end(ctx, event, error)
    }

    fn notice_error(&self, ctx: Context, error: &TrackedError) -> Context {
        (**self).notice_error(ctx, error)
    }

    fn notice_event_error(&self, ctx: Context, event: &Event, error: &TrackedError) -> Context {
        (**self).notice_event_error(ctx, event, error)
    }
}

/// Tracker that does nothing and returns every context unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTracker;

impl Tracker for NoOpTracker {
    fn start(&self, ctx: Context, _event: &Event) -> Context {
        ctx
    }

    fn end(&self, ctx: Context, _event: &Event, _error: Option<&TrackedError>) -> Context {
        ctx
    }

    fn notice_error(&self, ctx: Context, _error: &TrackedError) -> Context {
        ctx
    }

    fn notice_event_error(&self, ctx: Context, _event: &Event, _error: &TrackedError) -> Context {
        ctx
    }
}

/// Instant a tracked dispatch started, stored in the context by [`TracingTracker`].
#[derive(Debug, Clone, Copy)]
pub struct DispatchStarted(pub Instant);

/// Tracker that emits structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracker;

impl Tracker for TracingTracker {
    fn start(&self, ctx: Context, event: &Event) -> Context {
        debug!(
            event_name = %event.name,
            version = event.version,
            flow_id = %event.flow_id,
            event_id = %event.id,
            "dispatching event"
        );
        ctx.with_value(DispatchStarted(Instant::now()))
    }

    fn end(&self, ctx: Context, event: &Event, error: Option<&TrackedError>) -> Context {
        let elapsed_ms = ctx
            .value::<DispatchStarted>()
            .map(|started| u64::try_from(started.0.elapsed().as_millis()).unwrap_or(u64::MAX));

        match error {
            Some(err) => warn!(
                event_name = %event.name,
                version = event.version,
                flow_id = %event.flow_id,
                elapsed_ms,
                error = %err,
                "event handler returned an error"
            ),
            None => debug!(
                event_name = %event.name,
                version = event.version,
                flow_id = %event.flow_id,
                elapsed_ms,
                "event handled"
            ),
        }
        ctx
    }

    fn notice_error(&self, ctx: Context, error: &TrackedError) -> Context {
        error!(error = %error, "invalid event request");
        ctx
    }

    fn notice_event_error(&self, ctx: Context, event: &Event, error: &TrackedError) -> Context {
        error!(
            event_name = %event.name,
            version = event.version,
            flow_id = %event.flow_id,
            error = %error,
            "event failed"
        );
        ctx
    }
}
