//! Progress tokens and pagination cursors.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Progress token for tracking long-running operations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ProgressToken {
    Number(i64),
    String(String),
}

impl From<i64> for ProgressToken {
    fn from(n: i64) -> Self {
        ProgressToken::Number(n)
    }
}

impl From<&str> for ProgressToken {
    fn from(s: &str) -> Self {
        ProgressToken::String(s.to_string())
    }
}

/// Opaque pagination cursor.
///
/// The wire form is an opaque string; internally it encodes an absolute
/// offset into the registration order. Clients must treat it as a token and
/// hand it back verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn new(cursor: impl Into<String>) -> Self {
        Self(cursor.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode an absolute offset as an opaque cursor.
    pub fn from_offset(offset: usize) -> Self {
        Self(URL_SAFE_NO_PAD.encode(offset.to_string()))
    }

    /// Decode the offset this cursor encodes. Fails on tokens this library
    /// did not mint.
    pub fn to_offset(&self) -> Result<usize, InvalidCursor> {
        let bytes = URL_SAFE_NO_PAD
            .decode(&self.0)
            .map_err(|_| InvalidCursor(self.0.clone()))?;
        let text = String::from_utf8(bytes).map_err(|_| InvalidCursor(self.0.clone()))?;
        text.parse().map_err(|_| InvalidCursor(self.0.clone()))
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A cursor that did not decode to a page offset.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid pagination cursor: {0}")]
pub struct InvalidCursor(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_offset_round_trip() {
        for offset in [0usize, 1, 10, 25, 1_000_000] {
            let cursor = Cursor::from_offset(offset);
            assert_eq!(cursor.to_offset().unwrap(), offset);
        }
    }

    #[test]
    fn test_cursor_is_opaque_on_the_wire() {
        let cursor = Cursor::from_offset(10);
        assert_ne!(cursor.as_str(), "10");
        let json = serde_json::to_value(&cursor).unwrap();
        assert!(json.is_string());
    }

    #[test]
    fn test_foreign_cursor_rejected() {
        assert!(Cursor::new("definitely-not-ours!").to_offset().is_err());
    }

    #[test]
    fn test_progress_token_forms() {
        let n: ProgressToken = serde_json::from_str("7").unwrap();
        assert_eq!(n, ProgressToken::Number(7));
        let s: ProgressToken = serde_json::from_str("\"tok\"").unwrap();
        assert_eq!(s, ProgressToken::String("tok".to_string()));
    }
}
