//! Error types for dispatch, handlers and the byte edge.
//!
//! Every failure that happens after an [`Event`] exists still carries a
//! well-formed response envelope, so callers can always answer the request.

use thiserror::Error;

use crate::core::Event;
use crate::envelopes::Envelopes;

/// Error type handed to [`Tracker`](crate::Tracker) hooks.
pub type TrackedError = dyn std::error::Error + Send + Sync + 'static;

/// Handler failure.
///
/// Carries the envelope the handler wants forwarded to the caller alongside
/// the underlying cause. Dispatch forwards `response` unchanged.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ServeError {
    response: Event,
    #[source]
    source: anyhow::Error,
}

impl ServeError {
    pub fn new(response: Event, source: impl Into<anyhow::Error>) -> Self {
        Self {
            response,
            source: source.into(),
        }
    }

    pub fn response(&self) -> &Event {
        &self.response
    }

    pub fn into_response(self) -> Event {
        self.response
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.source
    }

    pub fn into_parts(self) -> (Event, anyhow::Error) {
        (self.response, self.source)
    }
}

impl From<ResponseError> for ServeError {
    fn from(err: ResponseError) -> Self {
        let response = err.partial().clone();
        Self::new(response, err)
    }
}

/// Outcome of a failed dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler registered for the exact `(name, version)`.
    #[error("Event \"{name}\" not found")]
    NotFound {
        name: String,
        version: u32,
        response: Event,
    },

    /// The matched handler failed.
    #[error(transparent)]
    Handler(#[from] ServeError),
}

impl DispatchError {
    /// Not-found error for `event`, with an `error` envelope on its flow.
    pub(crate) fn not_found(envelopes: &Envelopes, event: &Event) -> Self {
        let message = format!("Event \"{}\" not found", event.name);
        Self::NotFound {
            name: event.name.clone(),
            version: event.version,
            response: envelopes.error(&event.flow_id, message),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Envelope to send back for this failure.
    pub fn response(&self) -> &Event {
        match self {
            Self::NotFound { response, .. } => response,
            Self::Handler(err) => err.response(),
        }
    }

    pub fn into_response(self) -> Event {
        match self {
            Self::NotFound { response, .. } => response,
            Self::Handler(err) => err.into_response(),
        }
    }
}

/// Response payload could not be serialized.
#[derive(Debug, Error)]
#[error("failed to serialize response payload: {source}")]
pub struct ResponseError {
    partial: Event,
    #[source]
    source: serde_json::Error,
}

impl ResponseError {
    pub(crate) fn new(partial: Event, source: serde_json::Error) -> Self {
        Self { partial, source }
    }

    /// Response envelope built before serialization failed (payload `null`).
    pub fn partial(&self) -> &Event {
        &self.partial
    }

    pub fn into_partial(self) -> Event {
        self.partial
    }
}

/// Batch handler failures that abort the whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("{0}")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("dispatcher is no longer available")]
    DispatcherGone,
}

/// Transport-level failure of the byte edge.
#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type alias for the byte edge.
pub type Result<T> = std::result::Result<T, EdgeError>;
