//! Handler registry and dispatcher.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::batch::Batch;
use crate::context::Context;
use crate::core::{Event, RouteKey};
use crate::doc::{Documented, EventDoc, HandlerDoc};
use crate::envelopes::{Envelopes, IdGenerator};
use crate::error::{DispatchError, TrackedError};
use crate::handler::Handler;
use crate::tracker::{NoOpTracker, Tracker};

/// Default bound on concurrently running items of a `parallel` batch.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;

struct Route {
    handler: Arc<dyn Handler>,
    doc: Option<HandlerDoc>,
}

struct Inner {
    routes: DashMap<RouteKey, Route>,
    tracker: Arc<dyn Tracker>,
    envelopes: Envelopes,
    batch_concurrency: usize,
}

/// Maps `(name, version)` to handlers and dispatches events to them.
///
/// Cloning is cheap; clones share the same registry. Routes are meant to be
/// registered at startup and only read while serving.
#[derive(Clone)]
pub struct Mux {
    inner: Arc<Inner>,
}

/// Non-owning handle to a [`Mux`], held by handlers registered inside it.
#[derive(Clone)]
pub(crate) struct WeakMux(Weak<Inner>);

impl WeakMux {
    pub(crate) fn upgrade(&self) -> Option<Mux> {
        self.0.upgrade().map(|inner| Mux { inner })
    }
}

impl Mux {
    /// Mux with a no-op tracker, UUIDv4 ids and no routes.
    pub fn new() -> Self {
        MuxBuilder::new().build()
    }

    pub fn builder() -> MuxBuilder {
        MuxBuilder::new()
    }

    /// Register `handler` for `(name, version)`, replacing any existing one.
    pub fn register(&self, name: impl Into<String>, version: u32, handler: impl Handler) {
        self.insert(
            RouteKey::new(name, version),
            Route {
                handler: Arc::new(handler),
                doc: None,
            },
        );
    }

    /// Register a handler that also documents its payloads.
    pub fn register_documented<H>(&self, name: impl Into<String>, version: u32, handler: H)
    where
        H: Handler + Documented,
    {
        let doc = HandlerDoc::describe(&handler);
        self.insert(
            RouteKey::new(name, version),
            Route {
                handler: Arc::new(handler),
                doc: Some(doc),
            },
        );
    }

    fn insert(&self, key: RouteKey, route: Route) {
        let documented = route.doc.is_some();
        if self.inner.routes.insert(key.clone(), route).is_some() {
            debug!(route = %key, documented, "replaced event handler");
        } else {
            debug!(route = %key, documented, "registered event handler");
        }
    }

    /// Handler registered for exactly `(name, version)`.
    pub fn lookup(&self, name: &str, version: u32) -> Option<Arc<dyn Handler>> {
        self.inner
            .routes
            .get(&RouteKey::new(name, version))
            .map(|route| Arc::clone(&route.handler))
    }

    pub fn contains(&self, name: &str, version: u32) -> bool {
        self.inner.routes.contains_key(&RouteKey::new(name, version))
    }

    pub fn len(&self) -> usize {
        self.inner.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.routes.is_empty()
    }

    pub fn tracker(&self) -> &dyn Tracker {
        self.inner.tracker.as_ref()
    }

    pub fn envelopes(&self) -> &Envelopes {
        &self.inner.envelopes
    }

    pub fn batch_concurrency(&self) -> usize {
        self.inner.batch_concurrency
    }

    /// Fresh root context that builds envelopes with this mux's id generator.
    pub fn context(&self) -> Context {
        Context::new().with_envelopes(self.inner.envelopes.clone())
    }

    pub(crate) fn downgrade(&self) -> WeakMux {
        WeakMux(Arc::downgrade(&self.inner))
    }

    /// Dispatch `event` and return the envelope to send back.
    ///
    /// Unknown routes are reported through
    /// [`Tracker::notice_event_error`] and answered with an `error`
    /// envelope. A failing handler's own envelope is forwarded as is; the
    /// failure is visible to the tracker through [`Tracker::end`].
    pub async fn dispatch(&self, ctx: Context, event: &Event) -> Event {
        match self.try_dispatch(ctx.clone(), event).await {
            Ok(response) => response,
            Err(err) => {
                if err.is_not_found() {
                    warn!(
                        event_name = %event.name,
                        version = event.version,
                        flow_id = %event.flow_id,
                        "event not found"
                    );
                    self.inner.tracker.notice_event_error(ctx, event, &err);
                }
                err.into_response()
            }
        }
    }

    /// Dispatch `event`, surfacing not-found and handler failures.
    ///
    /// Only [`Tracker::start`] and [`Tracker::end`] are called here; reporting
    /// the returned error is up to the caller.
    pub async fn try_dispatch(&self, ctx: Context, event: &Event) -> Result<Event, DispatchError> {
        let handler = self
            .lookup(&event.name, event.version)
            .ok_or_else(|| DispatchError::not_found(&self.inner.envelopes, event))?;

        let tracker = &self.inner.tracker;
        let ctx = tracker.start(ctx, event);
        let result = handler.serve(ctx.clone(), event).await;

        match &result {
            Ok(_) => tracker.end(ctx, event, None),
            Err(err) => tracker.end(ctx, event, Some(err as &TrackedError)),
        };

        result.map_err(DispatchError::from)
    }

    /// Documentation records for every route, sorted by name then version.
    pub fn catalog(&self) -> Vec<EventDoc> {
        let mut docs: Vec<EventDoc> = self
            .inner
            .routes
            .iter()
            .map(|entry| EventDoc::new(entry.key(), entry.value().doc.clone()))
            .collect();
        docs.sort_by(|a, b| (&a.name, a.version).cmp(&(&b.name, b.version)));
        docs
    }
}

impl Default for Mux {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Mux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mux")
            .field("routes", &self.inner.routes.len())
            .field("batch_concurrency", &self.inner.batch_concurrency)
            .finish_non_exhaustive()
    }
}

/// Startup configuration for a [`Mux`].
///
/// ```ignore
/// let mux = Mux::builder()
///     .tracker(TracingTracker)
///     .route("ping", 1, Ping)
///     .batch("batch", 1)
///     .batch_concurrency(4)
///     .build();
/// ```
pub struct MuxBuilder {
    tracker: Arc<dyn Tracker>,
    envelopes: Envelopes,
    batch: Option<RouteKey>,
    batch_concurrency: usize,
    routes: Vec<(RouteKey, Route)>,
}

impl MuxBuilder {
    pub fn new() -> Self {
        Self {
            tracker: Arc::new(NoOpTracker),
            envelopes: Envelopes::default(),
            batch: None,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            routes: Vec::new(),
        }
    }

    pub fn tracker(mut self, tracker: impl Tracker) -> Self {
        self.tracker = Arc::new(tracker);
        self
    }

    pub fn id_generator(mut self, ids: impl IdGenerator) -> Self {
        self.envelopes = Envelopes::new(ids);
        self
    }

    /// Register the batch handler under `(name, version)`.
    pub fn batch(mut self, name: impl Into<String>, version: u32) -> Self {
        self.batch = Some(RouteKey::new(name, version));
        self
    }

    /// Bound on concurrently running items of a `parallel` batch (at least 1).
    pub fn batch_concurrency(mut self, limit: usize) -> Self {
        self.batch_concurrency = limit.max(1);
        self
    }

    pub fn route(mut self, name: impl Into<String>, version: u32, handler: impl Handler) -> Self {
        self.routes.push((
            RouteKey::new(name, version),
            Route {
                handler: Arc::new(handler),
                doc: None,
            },
        ));
        self
    }

    pub fn documented_route<H>(mut self, name: impl Into<String>, version: u32, handler: H) -> Self
    where
        H: Handler + Documented,
    {
        let doc = HandlerDoc::describe(&handler);
        self.routes.push((
            RouteKey::new(name, version),
            Route {
                handler: Arc::new(handler),
                doc: Some(doc),
            },
        ));
        self
    }

    pub fn build(self) -> Mux {
        let mux = Mux {
            inner: Arc::new(Inner {
                routes: DashMap::new(),
                tracker: self.tracker,
                envelopes: self.envelopes,
                batch_concurrency: self.batch_concurrency,
            }),
        };

        for (key, route) in self.routes {
            mux.insert(key, route);
        }

        if let Some(key) = self.batch {
            let batch = Batch::new(&mux);
            mux.register(key.name, key.version, batch);
        }

        mux
    }
}

impl Default for MuxBuilder {
    fn default() -> Self {
        Self::new()
    }
}
