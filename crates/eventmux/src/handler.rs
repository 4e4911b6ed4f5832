//! Handler contract.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::core::Event;
use crate::error::ServeError;

/// Result of serving one event.
///
/// The error side still carries an envelope; see [`ServeError`].
pub type ServeResult = std::result::Result<Event, ServeError>;

/// Unit of work bound to a `(name, version)` route.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn serve(&self, ctx: Context, event: &Event) -> ServeResult;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn serve(&self, ctx: Context, event: &Event) -> ServeResult {
        (**self).serve(ctx, event).await
    }
}

/// Adapter turning an async closure into a [`Handler`].
///
/// The closure receives its own copy of the request envelope.
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap `f` as a [`Handler`].
///
/// ```ignore
/// mux.register("ping", 1, handler_fn(|ctx: Context, event: Event| async move {
///     ctx.envelopes()
///         .response(&event, &event.payload)
///         .map_err(ServeError::from)
/// }));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Context, Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServeResult> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Context, Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServeResult> + Send + 'static,
{
    async fn serve(&self, ctx: Context, event: &Event) -> ServeResult {
        (self.f)(ctx, event.clone()).await
    }
}
