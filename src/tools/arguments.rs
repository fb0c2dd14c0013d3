//! Typed access to tool call arguments.

use serde_json::Value;

use crate::error::StepwiseError;

/// Parsed tool call arguments with typed accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Parse raw argument text. Blank text is treated as `{}`.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new(Value::Object(Default::default())));
        }
        serde_json::from_str(trimmed).map(Self::new)
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &Value {
        &self.value
    }

    fn field<'a, T>(&'a self, key: &str, kind: &str, pick: impl FnOnce(&'a Value) -> Option<T>) -> Result<T, StepwiseError> {
        self.value
            .get(key)
            .and_then(pick)
            .ok_or_else(|| StepwiseError::InvalidArgument(format!("Missing {kind} argument: {key}")))
    }

    pub fn get_str(&self, key: &str) -> Result<&str, StepwiseError> {
        self.field(key, "string", Value::as_str)
    }

    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, StepwiseError> {
        self.field(key, "integer", Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, StepwiseError> {
        self.field(key, "float", Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, StepwiseError> {
        self.field(key, "boolean", Value::as_bool)
    }

    pub fn get_array(&self, key: &str) -> Result<&Vec<Value>, StepwiseError> {
        self.field(key, "array", Value::as_array)
    }

    /// Deserialize the whole argument object into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, StepwiseError> {
        T::deserialize(&self.value).map_err(|e| {
            StepwiseError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}
