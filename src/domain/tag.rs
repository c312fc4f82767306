//! Hierarchical tag type for categorizing documents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a tag was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    /// Declared in the structured header (`tags: [...]`).
    Frontmatter,
    /// Written in the body as `#tag`.
    Inline,
}

impl TagSource {
    /// Returns the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontmatter => "frontmatter",
            Self::Inline => "inline",
        }
    }

    /// Parses the database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "frontmatter" => Some(Self::Frontmatter),
            "inline" => Some(Self::Inline),
            _ => None,
        }
    }
}

/// A tag attached to a document.
///
/// Tags may be hierarchical: `project/alpha/design` is nested under
/// `project/alpha`, which is nested under `project`. Case is preserved as
/// written; no implicit lower-casing takes place.
///
/// # Normalization
/// - Surrounding whitespace is trimmed
/// - A single leading `#` is removed
/// - Leading and trailing `/` are removed
///
/// # Examples
///
/// ```
/// use mdindex::domain::{Tag, TagSource};
///
/// let tag = Tag::new("#project/alpha", TagSource::Inline).unwrap();
/// assert_eq!(tag.name(), "project/alpha");
/// assert!(tag.is_nested());
/// assert_eq!(tag.parent(), Some("project"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    name: String,
    source: TagSource,
}

/// Error returned when parsing an invalid tag.
#[derive(Debug, Clone)]
pub struct ParseTagError(String);

impl fmt::Display for ParseTagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseTagError {}

impl Tag {
    /// Creates a new Tag from a string.
    ///
    /// # Errors
    ///
    /// Returns `ParseTagError` if the tag is empty after normalization,
    /// contains whitespace, or has an empty path segment (`a//b`).
    pub fn new(s: &str, source: TagSource) -> Result<Self, ParseTagError> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('#').unwrap_or(trimmed);
        let normalized = trimmed.trim_matches('/');

        if normalized.is_empty() {
            return Err(ParseTagError("tag cannot be empty".to_string()));
        }

        if normalized.chars().any(char::is_whitespace) {
            return Err(ParseTagError(format!(
                "invalid tag '{}': tags cannot contain whitespace",
                normalized
            )));
        }

        if normalized.split('/').any(str::is_empty) {
            return Err(ParseTagError(format!(
                "invalid tag '{}': empty hierarchy segment",
                normalized
            )));
        }

        Ok(Self {
            name: normalized.to_string(),
            source,
        })
    }

    /// Returns the tag text.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns where the tag was declared.
    pub fn source(&self) -> TagSource {
        self.source
    }

    /// Returns true if the tag has a parent (`a/b`).
    pub fn is_nested(&self) -> bool {
        self.name.contains('/')
    }

    /// Returns the immediate parent tag, if nested.
    pub fn parent(&self) -> Option<&str> {
        self.name.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// Returns the hierarchy segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.name.split('/')
    }

    /// Returns every ancestor, outermost first (`a`, `a/b` for `a/b/c`).
    pub fn ancestors(&self) -> Vec<&str> {
        self.name
            .match_indices('/')
            .map(|(i, _)| &self.name[..i])
            .collect()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag(\"{}\", {})", self.name, self.source.as_str())
    }
}

impl Serialize for Tag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.name)
    }
}
