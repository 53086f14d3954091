//! Core type definitions

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Type tag naming a decodable entity kind (e.g. "ArmorXfer")
///
/// Keys of the type registry. An empty tag means "no type" and is what an
/// object registry lookup that found nothing collapses to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeTag(pub String);

impl TypeTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for TypeTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for TypeTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

impl Borrow<str> for TypeTag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_tag_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(TypeTag::from("ArmorXfer"), 1);
        assert_eq!(map.get("ArmorXfer"), Some(&1));
        assert_eq!(map.get("WeaponXfer"), None);
    }

    #[test]
    fn test_empty_tag() {
        assert!(TypeTag::new("").is_empty());
        assert_eq!(TypeTag::from("DefaultXfer").to_string(), "DefaultXfer");
    }
}
