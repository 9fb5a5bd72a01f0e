//! Secret handling for protection tokens and credentials.

use zeroize::Zeroizing;

/// A secret string such as a protection token, password or bearer credential.
///
/// The contents are wiped from memory on drop and never appear in `Debug`
/// output.
#[derive(Clone)]
pub struct Secret {
    inner: Zeroizing<String>,
}

impl Secret {
    /// Creates a new secret from a string.
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self {
            inner: Zeroizing::new(secret.into()),
        }
    }

    /// Creates a secret from a string, treating an empty string as absent.
    ///
    /// Entry points receive credentials as plain strings where "not supplied"
    /// is spelled as the empty string.
    pub fn non_empty<S: Into<String>>(secret: S) -> Option<Self> {
        let secret = Self::new(secret);
        if secret.is_empty() { None } else { Some(secret) }
    }

    /// Returns the secret as a string slice.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Returns true if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the length of the secret in bytes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
