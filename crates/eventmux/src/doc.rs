//! Optional documentation capability for handlers.
//!
//! A handler that also implements [`Documented`] can be registered with
//! [`Mux::register_documented`](crate::Mux::register_documented); its
//! description, examples and JSON schemas then show up in
//! [`Mux::catalog`](crate::Mux::catalog). Plain handlers are listed by
//! name and version only.

use schemars::{schema_for, JsonSchema};
use serde::Serialize;
use serde_json::Value;

use crate::core::RouteKey;

/// Documentation a handler can provide about its payloads.
pub trait Documented {
    type Input: JsonSchema + Serialize;
    type Output: JsonSchema + Serialize;

    /// Human-readable description.
    fn doc(&self) -> String;

    /// Example input and output payloads.
    fn example(&self) -> (Self::Input, Self::Output);
}

/// Extended documentation captured from a [`Documented`] handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerDoc {
    pub description: String,
    pub input_example: Value,
    pub output_example: Value,
    pub input_schema: Value,
    pub output_schema: Value,
}

impl HandlerDoc {
    pub fn describe<D: Documented + ?Sized>(handler: &D) -> Self {
        let (input, output) = handler.example();

        Self {
            description: handler.doc(),
            input_example: serde_json::to_value(input).unwrap_or_default(),
            output_example: serde_json::to_value(output).unwrap_or_default(),
            input_schema: serde_json::to_value(schema_for!(D::Input)).unwrap_or_default(),
            output_schema: serde_json::to_value(schema_for!(D::Output)).unwrap_or_default(),
        }
    }
}

/// Catalog entry for one registered route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDoc {
    pub name: String,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<HandlerDoc>,
}

impl EventDoc {
    pub(crate) fn new(key: &RouteKey, doc: Option<HandlerDoc>) -> Self {
        Self {
            name: key.name.clone(),
            version: key.version,
            doc,
        }
    }

    pub fn has_extended_doc(&self) -> bool {
        self.doc.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, JsonSchema)]
    struct GreetInput {
        #[serde(rename = "f1")]
        who: String,
        #[serde(rename = "someNumber")]
        times: i64,
    }

    #[derive(Serialize, JsonSchema)]
    struct GreetOutput {
        greeting: String,
    }

    struct Greet;

    impl Documented for Greet {
        type Input = GreetInput;
        type Output = GreetOutput;

        fn doc(&self) -> String {
            "Greets someone".to_string()
        }

        fn example(&self) -> (GreetInput, GreetOutput) {
            (
                GreetInput {
                    who: "ada".to_string(),
                    times: 2,
                },
                GreetOutput {
                    greeting: "hello ada".to_string(),
                },
            )
        }
    }

    #[test]
    fn test_describe_captures_examples_and_schemas() {
        let doc = HandlerDoc::describe(&Greet);

        assert_eq!(doc.description, "Greets someone");
        assert_eq!(doc.input_example["f1"], "ada");
        assert_eq!(doc.output_example["greeting"], "hello ada");
        assert_eq!(doc.input_schema["title"], "GreetInput");
        assert!(doc.input_schema["properties"].get("someNumber").is_some());
        assert!(doc.output_schema["properties"].get("greeting").is_some());
    }
}
