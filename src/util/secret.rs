//! Secret string type for credentials and signing keys.
//!
//! Keeps JWT secrets and registry passwords out of debug output and logs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A string whose value never shows up in `Debug` or `Display` output.
///
/// Registry passwords and the token signing secret are stored in this type.
/// The value is only reachable through [`SecretString::expose_secret`], so every
/// place that actually needs it is easy to find.
///
/// # Example
/// ```ignore
/// let password = SecretString::new("hunter2");
/// assert_eq!(format!("{:?}", password), "[REDACTED]");
/// assert_eq!(password.expose_secret(), "hunter2");
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap any string-like value.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Access the wrapped value.
    #[inline]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Whether the wrapped value is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // Best-effort only; copies made by the allocator are not cleared.
        self.0.clear();
        self.0.shrink_to_fit();
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString::new)
    }
}

/// Serializes the real value: the store snapshot must be able to restore
/// registry credentials. API responses use dedicated views that skip secrets.
impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}
