//! Batch handler: one envelope fanning out into many sub-dispatches.
//!
//! ```text
//! batch request ─► decode {parallel, events}
//!                       │
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!      dispatch[0]  dispatch[1]  dispatch[n]     (same Mux, same hooks)
//!          │            │            │
//!          └────────────┼────────────┘
//!                       ▼
//!           batch:response [resp0, resp1, ..., respn]
//! ```
//!
//! Item failures never abort the batch; only an undecodable batch payload
//! does. Responses line up with the input events by position, including when
//! `parallel` items complete out of order.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::core::Event;
use crate::error::{BatchError, ServeError};
use crate::handler::{Handler, ServeResult};
use crate::mux::{Mux, WeakMux};

/// Payload of a batch request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchPayload {
    pub parallel: bool,
    pub events: Vec<Event>,
}

impl BatchPayload {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            parallel: false,
            events,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Decode the batch carried by `event`. A `null` payload is an empty batch.
    pub fn from_event(event: &Event) -> serde_json::Result<Self> {
        if event.payload.is_null() {
            return Ok(Self::default());
        }
        event.decode_payload()
    }
}

/// Handler dispatching every event of a [`BatchPayload`] through its [`Mux`].
///
/// Holds a weak handle so registering it inside the same mux does not keep
/// the mux alive.
pub struct Batch {
    mux: WeakMux,
}

impl Batch {
    pub fn new(mux: &Mux) -> Self {
        Self {
            mux: mux.downgrade(),
        }
    }

    async fn dispatch_item(
        mux: &Mux,
        ctx: Context,
        batch: &Event,
        step: usize,
        parallel: bool,
        item: &Event,
    ) -> Event {
        debug!(
            step,
            parallel,
            flow_id = %item.flow_id,
            event_name = %item.name,
            batch_flow_id = %batch.flow_id,
            "batch event"
        );

        match mux.try_dispatch(ctx.clone(), item).await {
            Ok(response) => response,
            Err(err) => {
                mux.tracker().notice_event_error(ctx, item, &err);
                err.into_response()
            }
        }
    }
}

#[async_trait]
impl Handler for Batch {
    async fn serve(&self, ctx: Context, event: &Event) -> ServeResult {
        let Some(mux) = self.mux.upgrade() else {
            let response = ctx
                .envelopes()
                .error(&event.flow_id, BatchError::DispatcherGone.to_string());
            return Err(ServeError::new(response, BatchError::DispatcherGone));
        };

        let payload = match BatchPayload::from_event(event) {
            Ok(payload) => payload,
            Err(err) => {
                let response = mux.envelopes().error(&event.flow_id, err.to_string());
                return Err(ServeError::new(response, BatchError::InvalidPayload(err)));
            }
        };

        let parallel = payload.parallel;
        let responses: Vec<Event> = if parallel {
            let pending: Vec<_> = payload
                .events
                .iter()
                .enumerate()
                .map(|(step, item)| {
                    Self::dispatch_item(&mux, ctx.clone(), event, step, parallel, item)
                })
                .collect();
            stream::iter(pending)
                .buffered(mux.batch_concurrency())
                .collect()
                .await
        } else {
            let mut responses = Vec::with_capacity(payload.events.len());
            for (step, item) in payload.events.iter().enumerate() {
                let response =
                    Self::dispatch_item(&mux, ctx.clone(), event, step, parallel, item).await;
                responses.push(response);
            }
            responses
        };

        Ok(mux.envelopes().response(event, &responses)?)
    }
}
