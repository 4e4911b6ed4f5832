//! Builders for response and error envelopes.
//!
//! Every builder mints a fresh `id` through an injected [`IdGenerator`], so
//! the id source is a dependency of the builder rather than a process global.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::core::{ErrorPayload, Event, ERROR_EVENT_NAME, ERROR_EVENT_VERSION};
use crate::error::ResponseError;

/// Source of envelope ids. Must not repeat within practical operation.
pub trait IdGenerator: Send + Sync + 'static {
    fn next_id(&self) -> String;
}

/// Random UUIDv4 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV4;

impl IdGenerator for UuidV4 {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Pure constructors for well-formed envelopes.
#[derive(Clone)]
pub struct Envelopes {
    ids: Arc<dyn IdGenerator>,
}

impl Envelopes {
    pub fn new(ids: impl IdGenerator) -> Self {
        Self { ids: Arc::new(ids) }
    }

    /// Mint a fresh envelope id.
    pub fn next_id(&self) -> String {
        self.ids.next_id()
    }

    /// Build a request envelope with a fresh id.
    pub fn event(
        &self,
        name: impl Into<String>,
        version: u32,
        flow_id: impl Into<String>,
        payload: Value,
    ) -> Event {
        Event {
            name: name.into(),
            version,
            id: self.next_id(),
            flow_id: flow_id.into(),
            payload,
            metadata: None,
        }
    }

    /// Error envelope carrying `{"message": message}`.
    pub fn error(&self, flow_id: impl Into<String>, message: impl Into<String>) -> Event {
        self.error_event(
            flow_id.into(),
            ErrorPayload {
                message: message.into(),
                code: None,
            },
        )
    }

    /// Error envelope carrying `{"message": message, "code": code}`.
    pub fn error_with_code(
        &self,
        flow_id: impl Into<String>,
        message: impl Into<String>,
        code: i64,
    ) -> Event {
        self.error_event(
            flow_id.into(),
            ErrorPayload {
                message: message.into(),
                code: Some(code),
            },
        )
    }

    /// Error envelope with serialized metadata attached.
    ///
    /// Metadata that cannot be serialized is left off; the error itself is
    /// always produced.
    pub fn error_with_metadata<M>(
        &self,
        flow_id: impl Into<String>,
        message: impl Into<String>,
        metadata: &M,
    ) -> Event
    where
        M: Serialize + ?Sized,
    {
        let mut event = self.error(flow_id, message);
        event.metadata = serde_json::to_value(metadata).ok();
        event
    }

    /// Response to `request` carrying `payload`.
    ///
    /// On serialization failure the error still holds the response envelope
    /// with a `null` payload.
    pub fn response<P>(&self, request: &Event, payload: &P) -> Result<Event, ResponseError>
    where
        P: Serialize + ?Sized,
    {
        let mut response = Event {
            name: request.response_name(),
            version: request.version,
            id: self.next_id(),
            flow_id: request.flow_id.clone(),
            payload: Value::Null,
            metadata: None,
        };

        match serde_json::to_value(payload) {
            Ok(value) => {
                response.payload = value;
                Ok(response)
            }
            Err(source) => Err(ResponseError::new(response, source)),
        }
    }

    fn error_event(&self, flow_id: String, payload: ErrorPayload) -> Event {
        Event {
            name: ERROR_EVENT_NAME.to_string(),
            version: ERROR_EVENT_VERSION,
            id: self.next_id(),
            flow_id,
            payload: serde_json::to_value(payload).unwrap_or_default(),
            metadata: None,
        }
    }
}

impl Default for Envelopes {
    fn default() -> Self {
        Self::new(UuidV4)
    }
}

impl std::fmt::Debug for Envelopes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelopes").finish_non_exhaustive()
    }
}
