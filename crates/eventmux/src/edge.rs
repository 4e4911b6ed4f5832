//! Byte-level edge for transports.
//!
//! A transport hands over the raw request body and writes back whatever
//! [`Mux::serve_bytes`] returns. Undecodable bodies never reach the
//! dispatcher: they are reported through [`Tracker::notice_error`] and
//! answered with an `error` envelope that has no flow id.
//!
//! [`Tracker::notice_error`]: crate::Tracker::notice_error

use tracing::warn;

use crate::context::Context;
use crate::core::Event;
use crate::error::{EdgeError, Result};
use crate::mux::Mux;

impl Mux {
    /// Decode `body`, dispatch it and encode the response.
    ///
    /// Only a failure to encode the response is returned as an error; the
    /// transport should map it to its own failure status.
    pub async fn serve_bytes(&self, ctx: Context, body: &[u8]) -> Result<Vec<u8>> {
        let event: Event = match serde_json::from_slice(body) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "invalid event request");
                let ctx = self.tracker().notice_error(ctx, &err);
                let reply = self.envelopes().error("", err.to_string());
                return self.encode(ctx, &reply);
            }
        };

        let response = self.dispatch(ctx.clone(), &event).await;
        self.encode(ctx, &response)
    }

    fn encode(&self, ctx: Context, response: &Event) -> Result<Vec<u8>> {
        serde_json::to_vec(response).map_err(|err| {
            self.tracker().notice_event_error(ctx, response, &err);
            EdgeError::Encode(err)
        })
    }
}
