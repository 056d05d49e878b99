//! Validated names for user created entities.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A trimmed, non-empty name for a wallet, envelope, category or subcategory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    /// Create a name for an entity of the kind `entity`, e.g. "wallet".
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyName] if `name` is empty after trimming whitespace.
    pub fn new(name: &str, entity: &'static str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyName(entity))
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, name::Name};

    #[test]
    fn trims_whitespace() {
        assert_eq!(Name::new("  Groceries ", "envelope").unwrap().as_ref(), "Groceries");
    }

    #[test]
    fn rejects_blank_names() {
        assert_eq!(Name::new("   ", "wallet"), Err(Error::EmptyName("wallet")));
    }
}
