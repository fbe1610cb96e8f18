//! Ping request/response: both sides are empty objects.

use serde::{Deserialize, Serialize};

/// Empty params / empty result, serialized as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResult {}
