//! Cache keys

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key under which a fetched query result is stored.
///
/// A key is an ordered tuple of string parts (`["tasks", "<project id>"]`).
/// Its string form is the JSON array of those parts, which is what binding
/// identities compare on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Single-part key
    pub fn named(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Append a part
    pub fn with(mut self, part: impl ToString) -> Self {
        self.0.push(part.to_string());
        self
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Vec<String> always serializes
        let rendered = serde_json::to_string(&self.0).unwrap_or_default();
        f.write_str(&rendered)
    }
}

impl From<&str> for CacheKey {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_form_is_json_array() {
        let key = CacheKey::named("tasks").with("p-1");
        assert_eq!(key.to_string(), r#"["tasks","p-1"]"#);
        assert_eq!(CacheKey::from("dashboard").to_string(), r#"["dashboard"]"#);
    }

    #[test]
    fn test_parts_are_ordered() {
        let a = CacheKey::new(["tasks", "p-1"]);
        let b = CacheKey::new(["p-1", "tasks"]);
        assert_ne!(a, b);
        assert_ne!(a.to_string(), b.to_string());
    }
}
