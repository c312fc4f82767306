//! Document dialects: the note-taking convention a parser understands.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The markdown convention a corpus is written in.
///
/// Selected once per indexer; every document indexed by that indexer is
/// tagged with the dialect that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// Plain YAML header, inline `#tags`, markdown links.
    #[default]
    Generic,
    /// Generic plus `[[cross references]]`, embeds and callouts.
    Wikilink,
    /// Header-driven blogs: YAML or TOML header, no inline tags.
    HeaderOnly,
}

/// Error returned when parsing an unknown dialect name.
#[derive(Debug, Clone)]
pub struct ParseDialectError(String);

impl fmt::Display for ParseDialectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown dialect '{}': expected one of generic, wikilink, header-only",
            self.0
        )
    }
}

impl std::error::Error for ParseDialectError {}

impl Dialect {
    /// Returns the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Wikilink => "wikilink",
            Self::HeaderOnly => "header-only",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = ParseDialectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" | "plain" => Ok(Self::Generic),
            "wikilink" | "obsidian" => Ok(Self::Wikilink),
            "header-only" | "header_only" | "frontmatter" => Ok(Self::HeaderOnly),
            other => Err(ParseDialectError(other.to_string())),
        }
    }
}
