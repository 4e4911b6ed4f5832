//! Request-scoped context passed to handlers and trackers.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::envelopes::Envelopes;

type Values = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Immutable, cheaply cloneable bag of request-scoped values.
///
/// Decorating a context (`with_value`) returns a new context and leaves the
/// original untouched, so trackers can hand back an extended context
/// without affecting other holders. Values are keyed by type.
#[derive(Clone, Default)]
pub struct Context {
    envelopes: Envelopes,
    values: Arc<Values>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Envelope builders for this request.
    pub fn envelopes(&self) -> &Envelopes {
        &self.envelopes
    }

    pub fn with_envelopes(mut self, envelopes: Envelopes) -> Self {
        self.envelopes = envelopes;
        self
    }

    /// Attach `value`, replacing any earlier value of the same type.
    pub fn with_value<T: Any + Send + Sync>(mut self, value: T) -> Self {
        Arc::make_mut(&mut self.values).insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| (**value).downcast_ref::<T>())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("values", &self.values.len())
            .finish_non_exhaustive()
    }
}
