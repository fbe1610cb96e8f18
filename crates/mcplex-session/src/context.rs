//! Per-request side channel handed to request handlers.

use mcplex_protocol::meta::ProgressToken;
use mcplex_protocol::notifications::ProgressParams;
use mcplex_protocol::{RequestId, methods};
use serde_json::Value;
use tracing::trace;

use crate::cancellation::CancellationToken;
use crate::outbound::Outbound;

/// Context for one inbound request: the cancellation token, the progress
/// reporter, and an outbound handle for emitting notifications.
///
/// Cancellation is strictly cooperative: a handler that never polls the
/// token runs to completion.
#[derive(Clone)]
pub struct RequestContext {
    request_id: RequestId,
    token: CancellationToken,
    progress_token: Option<ProgressToken>,
    outbound: Outbound,
}

impl RequestContext {
    pub(crate) fn new(
        request_id: RequestId,
        token: CancellationToken,
        progress_token: Option<ProgressToken>,
        outbound: Outbound,
    ) -> Self {
        Self {
            request_id,
            token,
            progress_token,
            outbound,
        }
    }

    /// A context with no cancel authority, no progress token, and a dangling
    /// outbound, for handlers invoked outside a live session.
    pub fn detached(request_id: RequestId) -> Self {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            request_id,
            token: CancellationToken::detached(),
            progress_token: None,
            outbound: Outbound::new(tx),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Non-blocking cancellation poll.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Emit `notifications/progress` against this request's progress token.
    /// A request that carried no token makes this a no-op.
    pub fn report_progress(&self, progress: f64, total: Option<f64>) {
        let Some(token) = &self.progress_token else {
            trace!(request_id = %self.request_id, "progress dropped: no token");
            return;
        };
        let params = ProgressParams {
            progress_token: token.clone(),
            progress,
            total,
            message: None,
        };
        match serde_json::to_value(&params) {
            Ok(value) => self
                .outbound
                .notify(methods::NOTIFICATION_PROGRESS, Some(value)),
            Err(e) => trace!(error = %e, "progress params failed to serialize"),
        }
    }

    /// Emit an arbitrary notification through the owning session.
    pub fn send_notification(&self, method: &str, params: Option<Value>) {
        self.outbound.notify(method, params);
    }
}

/// Pull `_meta.progressToken` out of request params, if present.
pub(crate) fn progress_token_of(params: Option<&Value>) -> Option<ProgressToken> {
    let meta = params?.as_object()?.get("_meta")?.as_object()?;
    serde_json::from_value(meta.get("progressToken")?.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_token_extraction() {
        let params = json!({"_meta": {"progressToken": "tok-1"}, "name": "x"});
        assert_eq!(
            progress_token_of(Some(&params)),
            Some(ProgressToken::String("tok-1".to_string()))
        );

        let params = json!({"_meta": {"progressToken": 5}});
        assert_eq!(
            progress_token_of(Some(&params)),
            Some(ProgressToken::Number(5))
        );

        assert_eq!(progress_token_of(Some(&json!({"name": "x"}))), None);
        assert_eq!(progress_token_of(None), None);
    }
}
