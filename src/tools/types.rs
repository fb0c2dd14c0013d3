//! Tool parameter schemas.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON Schema describing a tool's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentToolParameters {
    pub schema: Value,
}

impl AgentToolParameters {
    /// Create from a raw JSON Schema value.
    pub fn from_schema(schema: Value) -> Self {
        Self { schema }
    }

    /// An object schema with no properties.
    pub fn empty() -> Self {
        Self::object().build()
    }

    /// Start an object schema.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder {
            properties: Map::new(),
            required: Vec::new(),
            closed: false,
        }
    }
}

/// Builder for object-shaped parameter schemas.
#[derive(Debug, Clone)]
pub struct ParameterBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
    closed: bool,
}

impl ParameterBuilder {
    fn typed(self, kind: &str, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(
            name,
            json!({ "type": kind, "description": description.into() }),
            required,
        )
    }

    /// Add a property with an arbitrary sub-schema.
    pub fn property(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        if required && !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.typed("string", name, description, required)
    }

    pub fn number(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.typed("number", name, description, required)
    }

    pub fn integer(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.typed("integer", name, description, required)
    }

    pub fn boolean(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.typed("boolean", name, description, required)
    }

    /// Add a string property restricted to `values`.
    pub fn string_enum(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        required: bool,
    ) -> Self {
        self.property(
            name,
            json!({ "type": "string", "description": description.into(), "enum": values }),
            required,
        )
    }

    /// Reject properties not declared on the builder.
    pub fn strict(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn build(self) -> AgentToolParameters {
        let mut schema = json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        });
        if self.closed {
            schema["additionalProperties"] = Value::Bool(false);
        }
        AgentToolParameters { schema }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_required_fields() {
        let params = AgentToolParameters::object()
            .integer("a", "left operand", true)
            .integer("b", "right operand", true)
            .boolean("verbose", "log more", false)
            .build();
        assert_eq!(params.schema["properties"]["a"]["type"], "integer");
        assert_eq!(params.schema["required"], json!(["a", "b"]));
        assert!(params.schema.get("additionalProperties").is_none());
    }

    #[test]
    fn strict_builder_closes_the_object() {
        let params = AgentToolParameters::object()
            .property("tags", json!({"type": "array", "items": {"type": "string"}}), false)
            .string_enum("mode", "output mode", &["fast", "slow"], true)
            .strict()
            .build();
        assert_eq!(params.schema["additionalProperties"], false);
        assert_eq!(params.schema["properties"]["mode"]["enum"], json!(["fast", "slow"]));
    }

    #[test]
    fn empty_is_an_open_object() {
        let params = AgentToolParameters::empty();
        assert_eq!(params.schema["type"], "object");
        assert_eq!(params.schema["required"], json!([]));
    }
}
