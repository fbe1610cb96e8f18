//! Typed parameters for the MCP notification methods.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::elicitation::{ElicitAction, ElicitValue};
use crate::json_rpc::RequestId;
use crate::meta::ProgressToken;

/// Parameters of `notifications/cancelled`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledParams {
    pub request_id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CancelledParams {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Parameters of `notifications/progress`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    pub progress_token: ProgressToken,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Parameters of `notifications/resources/updated`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUpdatedParams {
    pub uri: String,
}

/// Parameters of `notifications/elicitation/complete`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElicitationCompleteParams {
    pub elicitation_id: String,
    pub action: ElicitAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<HashMap<String, ElicitValue>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cancelled_params_wire_shape() {
        let params = CancelledParams::new(RequestId::Number(7)).with_reason("user aborted");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, json!({"requestId": 7, "reason": "user aborted"}));
    }

    #[test]
    fn test_progress_params_optional_fields() {
        let params = ProgressParams {
            progress_token: ProgressToken::from("tok"),
            progress: 0.5,
            total: None,
            message: None,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, json!({"progressToken": "tok", "progress": 0.5}));
    }

    #[test]
    fn test_elicitation_complete_parse() {
        let params: ElicitationCompleteParams = serde_json::from_value(json!({
            "elicitationId": "e1",
            "action": "accept",
            "content": {"token": "abc"}
        }))
        .unwrap();
        assert_eq!(params.elicitation_id, "e1");
        assert_eq!(params.action, ElicitAction::Accept);
    }
}
