//! Stream keys
//!
//! A stream key is opaque except for its last colon-delimited segment, which
//! is the id of the user who owns the stream (`"call:123:456"` is owned by
//! `"456"`).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamKey(String);

impl StreamKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Everything after the last colon, or the whole key if it has none
    pub fn owner_id(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or(&self.0)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id() == user_id
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for StreamKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_is_last_segment() {
        let key = StreamKey::from("call:123:456");
        assert_eq!(key.owner_id(), "456");
        assert!(key.is_owned_by("456"));
        assert!(!key.is_owned_by("789"));
    }

    #[test]
    fn test_key_without_colon() {
        assert_eq!(StreamKey::from("456").owner_id(), "456");
        assert_eq!(StreamKey::from("guild:1:2:").owner_id(), "");
    }
}
