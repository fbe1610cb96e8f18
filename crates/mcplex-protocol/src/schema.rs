//! Restricted JSON Schema support for tool inputs and outputs.
//!
//! This is not a general validator; it covers the subset MCP tools declare
//! in practice (object schemas with typed properties, enums, and numeric
//! bounds) and is used at the `tools/call` dispatch boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A JSON Schema node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl JsonSchema {
    fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            description: None,
            properties: None,
            required: None,
            items: None,
            enum_values: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn object() -> Self {
        Self::of_type("object")
    }

    pub fn string() -> Self {
        Self::of_type("string")
    }

    pub fn number() -> Self {
        Self::of_type("number")
    }

    pub fn integer() -> Self {
        Self::of_type("integer")
    }

    pub fn boolean() -> Self {
        Self::of_type("boolean")
    }

    pub fn array(items: JsonSchema) -> Self {
        let mut schema = Self::of_type("array");
        schema.items = Some(Box::new(items));
        schema
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: JsonSchema) -> Self {
        self.properties
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), schema);
        self
    }

    pub fn with_required(mut self, required: Vec<&str>) -> Self {
        self.required = Some(required.into_iter().map(String::from).collect());
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn with_range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    /// Validate a value against this schema.
    ///
    /// Returns a human-readable diagnostic on the first violation found.
    /// Unknown object properties are permitted.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self.schema_type.as_str() {
            "object" => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| format!("expected object, got {}", type_name(value)))?;
                if let Some(required) = &self.required {
                    for key in required {
                        if !obj.contains_key(key) {
                            return Err(format!("missing required property '{key}'"));
                        }
                    }
                }
                if let Some(properties) = &self.properties {
                    for (key, schema) in properties {
                        if let Some(v) = obj.get(key) {
                            schema
                                .validate(v)
                                .map_err(|e| format!("property '{key}': {e}"))?;
                        }
                    }
                }
            }
            "string" => {
                if !value.is_string() {
                    return Err(format!("expected string, got {}", type_name(value)));
                }
            }
            "number" => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| format!("expected number, got {}", type_name(value)))?;
                self.check_range(n)?;
            }
            "integer" => {
                let n = value
                    .as_i64()
                    .ok_or_else(|| format!("expected integer, got {}", type_name(value)))?;
                self.check_range(n as f64)?;
            }
            "boolean" => {
                if !value.is_boolean() {
                    return Err(format!("expected boolean, got {}", type_name(value)));
                }
            }
            "array" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| format!("expected array, got {}", type_name(value)))?;
                if let Some(items) = &self.items {
                    for (i, item) in arr.iter().enumerate() {
                        items.validate(item).map_err(|e| format!("item {i}: {e}"))?;
                    }
                }
            }
            other => return Err(format!("unsupported schema type '{other}'")),
        }

        if let Some(allowed) = &self.enum_values {
            if !allowed.contains(value) {
                return Err(format!("value {value} is not one of the allowed values"));
            }
        }
        Ok(())
    }

    fn check_range(&self, n: f64) -> Result<(), String> {
        if let Some(min) = self.minimum {
            if n < min {
                return Err(format!("value {n} is below minimum {min}"));
            }
        }
        if let Some(max) = self.maximum {
            if n > max {
                return Err(format!("value {n} is above maximum {max}"));
            }
        }
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
