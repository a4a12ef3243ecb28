//! Product category lists.
//!
//! The `products.product_category` column is text holding a bracketed,
//! quoted list such as `['Electronics', 'Audio']`. Rows written by newer
//! tooling may hold a JSON array instead. [`CategoryList`] reads both and
//! always writes the bracketed text form so existing `ilike` filters keep
//! matching.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered list of category names attached to a product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryList(Vec<String>);

impl CategoryList {
    /// Build a list from names, trimming each and dropping blanks.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .map(|name| name.as_ref().trim().to_owned())
                .filter(|name| !name.is_empty())
                .collect(),
        )
    }

    /// Parse the stored text form.
    ///
    /// Accepts `['a', 'b']`, `["a","b"]`, `[a, b]` and a bare `a, b`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(trimmed);

        Self::new(inner.split(',').map(|part| {
            part.trim()
                .trim_matches(|c| c == '\'' || c == '"')
                .trim()
        }))
    }

    /// Category names.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Whether the list has no categories.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Case-insensitive membership test.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|c| c.eq_ignore_ascii_case(name.trim()))
    }

    /// Iterate over category names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for CategoryList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{}'", name.replace('\'', ""))?;
        }
        f.write_str("]")
    }
}

impl Serialize for CategoryList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CategoryList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            List(Vec<String>),
            Missing(()),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self::parse(&text),
            Raw::List(list) => Self::new(list),
            Raw::Missing(()) => Self::default(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_legacy_text() {
        let list = CategoryList::parse("['Electronics', 'Audio']");
        assert_eq!(list.as_slice(), ["Electronics", "Audio"]);
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(
            CategoryList::parse(r#"["Home","Garden"]"#).as_slice(),
            ["Home", "Garden"]
        );
        assert_eq!(CategoryList::parse("[Toys]").as_slice(), ["Toys"]);
        assert_eq!(CategoryList::parse("Books, Comics").as_slice(), ["Books", "Comics"]);
        assert!(CategoryList::parse("[]").is_empty());
        assert!(CategoryList::parse("").is_empty());
    }

    #[test]
    fn test_display_writes_legacy_text() {
        let list = CategoryList::new(["Electronics", " Audio "]);
        assert_eq!(list.to_string(), "['Electronics', 'Audio']");
    }

    #[test]
    fn test_deserialize_text_array_and_null() {
        let from_text: CategoryList = serde_json::from_str(r#""['Shoes', 'Sale']""#).unwrap();
        let from_array: CategoryList = serde_json::from_str(r#"["Shoes","Sale"]"#).unwrap();
        let from_null: CategoryList = serde_json::from_str("null").unwrap();
        assert_eq!(from_text, from_array);
        assert!(from_null.is_empty());
    }

    #[test]
    fn test_contains_ignores_case() {
        let list = CategoryList::parse("['Kitchen']");
        assert!(list.contains("kitchen"));
        assert!(!list.contains("garden"));
    }
}
