//! Secret string type with automatic zeroization
//!
//! Provides [`SecretString`] with controlled access via closure API to
//! prevent accidental secret copying, and automatic memory zeroization on
//! drop.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret value with automatic memory zeroization
///
/// Secrets are never exposed directly - they must be accessed within a
/// closure scope using [`expose_secret`], and are redacted in debug output.
///
/// [`expose_secret`]: SecretString::expose_secret
///
/// # Examples
///
/// ```
/// use keywheel_core::SecretString;
///
/// let secret = SecretString::new("my-api-key");
///
/// let len = secret.expose_secret(|value| value.len());
/// assert_eq!(len, 10);
///
/// assert_eq!(format!("{secret:?}"), "[REDACTED]");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Creates a new secret from any string-like value
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self { inner: s.into() }
    }

    /// Accesses the secret value within a closure scope
    ///
    /// The secret value cannot escape the closure, which prevents
    /// accidental copying or logging.
    pub fn expose_secret<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        f(&self.inner)
    }

    /// Returns the length without exposing content
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Checks if empty without exposing content
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
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

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
