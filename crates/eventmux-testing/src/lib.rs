//! Testing utilities for eventmux.
//!
//! - [`MockTracker`] counts hook invocations.
//! - [`RecordingTracker`] keeps the ordered list of hook calls.
//! - [`Echo`], [`Failing`] and [`Counting`] are canned handlers.
//! - [`request`], [`request_with_payload`] and [`batch_request`] build
//!   request envelopes with fresh ids and flow ids.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use eventmux::{
    BatchPayload, Context, Envelopes, Event, Handler, ServeError, ServeResult, TrackedError,
    Tracker,
};
use serde_json::Value;
use uuid::Uuid;

// ============================================================================
// Trackers
// ============================================================================

/// Tracker counting how often each hook ran.
///
/// Share it with a mux through `Arc`:
///
/// ```ignore
/// let tracker = Arc::new(MockTracker::new());
/// let mux = Mux::builder().tracker(Arc::clone(&tracker)).build();
/// ```
#[derive(Debug, Default)]
pub struct MockTracker {
    start: AtomicUsize,
    end: AtomicUsize,
    notice_error: AtomicUsize,
    notice_event_error: AtomicUsize,
}

impl MockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_count(&self) -> usize {
        self.start.load(Ordering::SeqCst)
    }

    pub fn end_count(&self) -> usize {
        self.end.load(Ordering::SeqCst)
    }

    pub fn notice_error_count(&self) -> usize {
        self.notice_error.load(Ordering::SeqCst)
    }

    pub fn notice_event_error_count(&self) -> usize {
        self.notice_event_error.load(Ordering::SeqCst)
    }
}

impl Tracker for MockTracker {
    fn start(&self, ctx: Context, _event: &Event) -> Context {
        self.start.fetch_add(1, Ordering::SeqCst);
        ctx
    }

    fn end(&self, ctx: Context, _event: &Event, _error: Option<&TrackedError>) -> Context {
        self.end.fetch_add(1, Ordering::SeqCst);
        ctx
    }

    fn notice_error(&self, ctx: Context, _error: &TrackedError) -> Context {
        self.notice_error.fetch_add(1, Ordering::SeqCst);
        ctx
    }

    fn notice_event_error(&self, ctx: Context, _event: &Event, _error: &TrackedError) -> Context {
        self.notice_event_error.fetch_add(1, Ordering::SeqCst);
        ctx
    }
}

/// One observed hook call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCall {
    Start {
        name: String,
        flow_id: String,
    },
    End {
        name: String,
        flow_id: String,
        error: Option<String>,
    },
    NoticeError {
        error: String,
    },
    NoticeEventError {
        name: String,
        flow_id: String,
        error: String,
    },
}

/// Tracker recording every hook call in order.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    calls: Mutex<Vec<TrackerCall>>,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: TrackerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Tracker for RecordingTracker {
    fn start(&self, ctx: Context, event: &Event) -> Context {
        self.record(TrackerCall::Start {
            name: event.name.clone(),
            flow_id: event.flow_id.clone(),
        });
        ctx
    }

    fn end(&self, ctx: Context, event: &Event, error: Option<&TrackedError>) -> Context {
        self.record(TrackerCall::End {
            name: event.name.clone(),
            flow_id: event.flow_id.clone(),
            error: error.map(|err| err.to_string()),
        });
        ctx
    }

    fn notice_error(&self, ctx: Context, error: &TrackedError) -> Context {
        self.record(TrackerCall::NoticeError {
            error: error.to_string(),
        });
        ctx
    }

    fn notice_event_error(&self, ctx: Context, event: &Event, error: &TrackedError) -> Context {
        self.record(TrackerCall::NoticeEventError {
            name: event.name.clone(),
            flow_id: event.flow_id.clone(),
            error: error.to_string(),
        });
        ctx
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Responds with `<name>:response` carrying the request payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

#[async_trait]
impl Handler for Echo {
    async fn serve(&self, ctx: Context, event: &Event) -> ServeResult {
        Ok(ctx.envelopes().response(event, &event.payload)?)
    }
}

/// Fails, returning a `<name>:error` envelope on the request's flow.
#[derive(Debug, Clone)]
pub struct Failing {
    message: String,
}

impl Failing {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for Failing {
    fn default() -> Self {
        Self::new("some error")
    }
}

#[async_trait]
impl Handler for Failing {
    async fn serve(&self, ctx: Context, event: &Event) -> ServeResult {
        let response = Event {
            name: format!("{}:error", event.name),
            version: 1,
            id: ctx.envelopes().next_id(),
            flow_id: event.flow_id.clone(),
            payload: event.payload.clone(),
            metadata: None,
        };
        Err(ServeError::new(response, anyhow::anyhow!(self.message.clone())))
    }
}

/// Wraps a handler and counts its invocations.
pub struct Counting<H> {
    inner: H,
    calls: Arc<AtomicUsize>,
}

impl<H: Handler> Counting<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter, still readable after the handler moved into a mux.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl<H: Handler> Handler for Counting<H> {
    async fn serve(&self, ctx: Context, event: &Event) -> ServeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.serve(ctx, event).await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Request envelope with a fresh id and flow id and a `null` payload.
pub fn request(name: &str, version: u32) -> Event {
    request_with_payload(name, version, Value::Null)
}

pub fn request_with_payload(name: &str, version: u32, payload: Value) -> Event {
    Envelopes::default().event(name, version, Uuid::new_v4().to_string(), payload)
}

/// Batch request envelope (`batch` v1) wrapping `events`.
pub fn batch_request(events: Vec<Event>, parallel: bool) -> Event {
    let payload = BatchPayload::new(events).parallel(parallel);
    request_with_payload(
        "batch",
        1,
        serde_json::to_value(payload).unwrap_or_default(),
    )
}
