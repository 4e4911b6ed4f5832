//! The event envelope shared by requests and responses.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name carried by every synthesized error envelope.
pub const ERROR_EVENT_NAME: &str = "error";

/// Version carried by every synthesized error envelope.
pub const ERROR_EVENT_VERSION: u32 = 1;

/// Suffix appended to a request name to form its response name.
pub const RESPONSE_SUFFIX: &str = ":response";

/// Self-describing envelope used for both requests and responses.
///
/// `name` and `version` form the routing key. `flow_id` correlates a
/// request with everything derived from it, while `id` identifies this one
/// envelope instance and is never inspected by dispatch.
///
/// Missing fields decode to their zero value, so a request without `name`
/// or `version` still reaches dispatch and is answered as not found on its
/// own flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "flowId", default, skip_serializing_if = "String::is_empty")]
    pub flow_id: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Event {
    /// Routing key of this envelope.
    pub fn key(&self) -> RouteKey {
        RouteKey::new(&self.name, self.version)
    }

    /// Name a response to this envelope carries.
    pub fn response_name(&self) -> String {
        format!("{}{}", self.name, RESPONSE_SUFFIX)
    }

    /// Whether this is a synthesized error envelope.
    pub fn is_error(&self) -> bool {
        self.name == ERROR_EVENT_NAME
    }

    /// Error details, when this is an error envelope with a well-formed payload.
    pub fn error_payload(&self) -> Option<ErrorPayload> {
        if !self.is_error() {
            return None;
        }
        self.decode_payload().ok()
    }

    /// Interpret the payload as `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}

/// Payload of an `error` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

/// `(name, version)` pair selecting at most one handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub name: String,
    pub version: u32,
}

impl RouteKey {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@v{}", self.name, self.version)
    }
}
