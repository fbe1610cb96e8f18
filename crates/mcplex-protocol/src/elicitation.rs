//! Elicitation types: structured user-input requests in form or URL mode.
//!
//! Requested schemas are deliberately flat (primitive types only, no nested
//! objects, no arrays of objects) so any host can render them as a form.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The primitive types an elicitation field may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
}

/// Schema for a single elicitation field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveSchema {
    #[serde(rename = "type")]
    pub schema_type: PrimitiveType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiselect: Option<bool>,
}

impl PrimitiveSchema {
    pub fn new(schema_type: PrimitiveType) -> Self {
        Self {
            schema_type,
            title: None,
            description: None,
            default: None,
            pattern: None,
            min_length: None,
            max_length: None,
            minimum: None,
            maximum: None,
            enum_values: None,
            multiselect: None,
        }
    }

    pub fn string() -> Self {
        Self::new(PrimitiveType::String)
    }

    pub fn number() -> Self {
        Self::new(PrimitiveType::Number)
    }

    pub fn integer() -> Self {
        Self::new(PrimitiveType::Integer)
    }

    pub fn boolean() -> Self {
        Self::new(PrimitiveType::Boolean)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Parameters for `elicitation/create`, discriminated on `mode`.
///
/// Form mode resolves synchronously through the host's handler; URL mode is
/// acknowledged immediately and completed later by a
/// `notifications/elicitation/complete` correlated on `elicitationId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ElicitCreateParams {
    Form {
        message: String,
        requested_schema: HashMap<String, PrimitiveSchema>,
        #[serde(skip_serializing_if = "Option::is_none")]
        required: Option<Vec<String>>,
    },
    Url {
        message: String,
        elicitation_id: String,
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        confirm_url: Option<String>,
    },
}

impl ElicitCreateParams {
    pub fn form(message: impl Into<String>, schema: HashMap<String, PrimitiveSchema>) -> Self {
        Self::Form {
            message: message.into(),
            requested_schema: schema,
            required: None,
        }
    }

    pub fn url(
        message: impl Into<String>,
        elicitation_id: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::Url {
            message: message.into(),
            elicitation_id: elicitation_id.into(),
            url: url.into(),
            confirm_url: None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ElicitCreateParams::Form { message, .. } => message,
            ElicitCreateParams::Url { message, .. } => message,
        }
    }
}

/// The user's disposition toward an elicitation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElicitAction {
    Accept,
    Decline,
    Cancel,
}

/// A single submitted field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElicitValue {
    Bool(bool),
    Number(f64),
    String(String),
    StringList(Vec<String>),
}

/// Result of `elicitation/create`, and the payload of the completion
/// notification in URL mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitResult {
    pub action: ElicitAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<HashMap<String, ElicitValue>>,
}

impl ElicitResult {
    pub fn accept(content: HashMap<String, ElicitValue>) -> Self {
        Self {
            action: ElicitAction::Accept,
            content: Some(content),
        }
    }

    /// Provisional acknowledgment for URL-mode dispatch.
    pub fn accepted() -> Self {
        Self {
            action: ElicitAction::Accept,
            content: None,
        }
    }

    pub fn decline() -> Self {
        Self {
            action: ElicitAction::Decline,
            content: None,
        }
    }

    pub fn cancel() -> Self {
        Self {
            action: ElicitAction::Cancel,
            content: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_mode_wire_shape() {
        let mut schema = HashMap::new();
        schema.insert("email".to_string(), PrimitiveSchema::string());
        let params = ElicitCreateParams::form("Enter your email", schema);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["mode"], "form");
        assert_eq!(json["requestedSchema"]["email"]["type"], "string");
    }

    #[test]
    fn test_url_mode_wire_shape() {
        let params =
            ElicitCreateParams::url("Authorize", "elic-7", "https://example.com/auth");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["mode"], "url");
        assert_eq!(json["elicitationId"], "elic-7");
        assert!(json.get("confirmUrl").is_none());
    }

    #[test]
    fn test_mode_discriminates_parse() {
        let parsed: ElicitCreateParams = serde_json::from_value(json!({
            "mode": "url",
            "message": "m",
            "elicitationId": "e1",
            "url": "https://x"
        }))
        .unwrap();
        assert!(matches!(parsed, ElicitCreateParams::Url { .. }));
    }

    #[test]
    fn test_elicit_value_forms() {
        let values: HashMap<String, ElicitValue> = serde_json::from_value(json!({
            "name": "alice",
            "age": 30,
            "subscribed": true,
            "topics": ["a", "b"]
        }))
        .unwrap();
        assert_eq!(values["name"], ElicitValue::String("alice".to_string()));
        assert_eq!(values["age"], ElicitValue::Number(30.0));
        assert_eq!(values["subscribed"], ElicitValue::Bool(true));
        assert_eq!(
            values["topics"],
            ElicitValue::StringList(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_result_action_values() {
        assert_eq!(
            serde_json::to_value(ElicitResult::decline()).unwrap()["action"],
            "decline"
        );
        assert_eq!(
            serde_json::to_value(ElicitResult::cancel()).unwrap()["action"],
            "cancel"
        );
    }
}
