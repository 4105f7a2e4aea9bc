//! Secure container for tokens.

use serde::Deserialize;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;

/// Secret string such as the webhook auth token or the ingest token.
///
/// The value never appears in `Debug` output and is zeroed when dropped.
#[derive(Clone, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretValue {
    inner: String,
}

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Get the secret as a string slice (only for immediate use)
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// True when the secret is empty or only whitespace
    pub fn is_blank(&self) -> bool {
        self.inner.trim().is_empty()
    }

    /// Constant-time comparison against a candidate value.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.inner.as_bytes();
        let candidate = candidate.as_bytes();

        // Length is not secret
        if expected.len() != candidate.len() {
            return false;
        }

        expected.ct_eq(candidate).into()
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("length", &self.inner.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}
