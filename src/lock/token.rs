use std::fmt;
use uuid::Uuid;

/// Opaque value identifying one lock acquisition.
///
/// Ownership checks compare this value, never the caller's identity, so a
/// fresh token should be used for every acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HolderToken(String);

impl HolderToken {
    /// Random UUID v4 token.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Token value as stored under the lock key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for HolderToken {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for HolderToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for HolderToken {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for HolderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
