use std::{
    fmt,
    fmt::{Debug, Display},
};

use thiserror::Error;

/// A value that must never end up in logs or error messages, such as an API key or a callback hash key.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

#[derive(Debug, Clone, Error)]
#[error("Secret value is empty")]
pub struct SecretError;

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl Secret<String> {
    /// Like [`Secret::new`], but refuses empty strings.
    pub fn non_empty(value: &str) -> Result<Self, SecretError> {
        if value.is_empty() {
            Err(SecretError)
        } else {
            Ok(Self::new(value.to_string()))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}
