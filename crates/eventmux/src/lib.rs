//! # eventmux
//!
//! A name and version addressed event dispatcher.
//!
//! ## Core Concepts
//!
//! Every request and every response is an [`Event`] envelope:
//! - `name` + `version` = the routing key
//! - `flowId` = correlation id, copied from a request to everything derived from it
//! - `id` = identity of this one envelope, freshly minted by every builder
//! - `payload` / `metadata` = opaque data, only the matched handler looks inside
//!
//! A [`Mux`] maps `(name, version)` to a [`Handler`] and wraps every
//! invocation in [`Tracker`] hooks.
//!
//! ## Architecture
//!
//! ```text
//! Transport (HTTP, stdio, ...)
//!     │
//!     ▼ serve_bytes()
//! decode ──fails──► Tracker.notice_error ──► error envelope (no flowId)
//!     │
//!     ▼ dispatch()
//! Mux.lookup(name, version) ──missing──► Tracker.notice_event_error ──► error envelope
//!     │
//!     ▼
//! Tracker.start ─► Handler.serve() ─► Tracker.end
//!     │                  │
//!     │                  └─► Batch: Mux.lookup + serve per item, same hooks
//!     ▼
//! response envelope ──► encode ──► Transport
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Exact routing** - `(name, version)` selects at most one handler, no fallback
//! 2. **Flow preserved** - responses and synthesized errors keep the request's flow id
//! 3. **Handler output forwarded** - a failing handler's envelope is returned as is,
//!    the failure goes to the tracker
//! 4. **Batch isolation** - one failing item never aborts a batch, N in = N out
//!
//! ## Example
//!
//! ```ignore
//! use eventmux::{async_trait, Context, Event, Handler, Mux, ServeError, ServeResult, TracingTracker};
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl Handler for Ping {
//!     async fn serve(&self, ctx: Context, event: &Event) -> ServeResult {
//!         Ok(ctx.envelopes().response(event, &event.payload)?)
//!     }
//! }
//!
//! let mux = Mux::builder()
//!     .tracker(TracingTracker)
//!     .route("ping", 1, Ping)
//!     .batch("batch", 1)
//!     .build();
//!
//! // From a transport:
//! let reply: Vec<u8> = mux.serve_bytes(mux.context(), &body).await?;
//! ```
//!
//! ## What This Is Not
//!
//! eventmux does **not** persist events, replay them, or deliver them across
//! processes. It has no opinion on transport or authentication.

// Core modules
mod batch;
mod context;
mod core;
mod doc;
mod edge;
mod envelopes;
mod error;
mod handler;
mod mux;
mod tracker;


// Re-export envelope types
pub use crate::core::{
    ErrorPayload, Event, RouteKey, ERROR_EVENT_NAME, ERROR_EVENT_VERSION, RESPONSE_SUFFIX,
};

// Re-export builders
pub use envelopes::{Envelopes, IdGenerator, UuidV4};

// Re-export error types
pub use crate::error::{
    BatchError, DispatchError, EdgeError, ResponseError, ServeError, TrackedError,
};

// Re-export handler types
pub use context::Context;
pub use handler::{handler_fn, Handler, HandlerFn, ServeResult};

// Re-export dispatcher types
pub use mux::{Mux, MuxBuilder, DEFAULT_BATCH_CONCURRENCY};

// Re-export batch types
pub use batch::{Batch, BatchPayload};

// Re-export tracker types
pub use tracker::{DispatchStarted, NoOpTracker, Tracker, TracingTracker};

// Re-export documentation types
pub use doc::{Documented, EventDoc, HandlerDoc};

// Re-export commonly used external types
pub use async_trait::async_trait;
