//! Calendar references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a calendar resource.
///
/// The value is opaque and handed to the remote API unchanged. The default
/// is the authenticated user's `"primary"` calendar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarRef(String);

impl CalendarRef {
    /// The identifier the remote API uses for the user's main calendar.
    pub const PRIMARY: &'static str = "primary";

    /// Creates a reference to the calendar with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Reference to the user's primary calendar.
    pub fn primary() -> Self {
        Self::new(Self::PRIMARY)
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this points at the primary calendar.
    pub fn is_primary(&self) -> bool {
        self.0 == Self::PRIMARY
    }
}

impl Default for CalendarRef {
    fn default() -> Self {
        Self::primary()
    }
}

impl fmt::Display for CalendarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CalendarRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CalendarRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for CalendarRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_primary() {
        let calendar = CalendarRef::default();
        assert_eq!(calendar.as_str(), "primary");
        assert!(calendar.is_primary());
    }

    #[test]
    fn passes_identifier_through_unchanged() {
        let calendar = CalendarRef::from("team@group.calendar.google.com");
        assert_eq!(calendar.to_string(), "team@group.calendar.google.com");
        assert!(!calendar.is_primary());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&CalendarRef::new("work")).unwrap();
        assert_eq!(json, "\"work\"");
        let back: CalendarRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CalendarRef::new("work"));
    }
}
