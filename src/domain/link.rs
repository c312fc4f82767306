//! Link type representing a directional reference out of a document.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The syntactic form a link was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// `[text](target)`, `<target>` autolinks and images.
    Inline,
    /// `[text][label]` resolved through a `[label]: target` definition.
    Reference,
    /// `[[target]]` cross-reference (wikilink dialect only).
    Wikilink,
    /// Any link whose target carries a URL scheme.
    External,
}

impl LinkKind {
    /// Returns the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Reference => "reference",
            Self::Wikilink => "wikilink",
            Self::External => "external",
        }
    }

    /// Parses the database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inline" => Some(Self::Inline),
            "reference" => Some(Self::Reference),
            "wikilink" => Some(Self::Wikilink),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if the target carries a URL scheme (`https:`, `mailto:`...).
///
/// Windows drive letters (`C:\notes`) are single-letter schemes and are not
/// treated as URLs.
pub fn has_url_scheme(target: &str) -> bool {
    match target.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// A link as extracted from a document body.
///
/// Only syntactic information is known here. Whether the target exists in
/// the corpus is decided by the indexer's resolution pass.
///
/// # Examples
///
/// ```
/// use mdindex::domain::{Link, LinkKind};
///
/// let link = Link::new("other-note", LinkKind::Wikilink, 3).with_section("Intro");
/// assert_eq!(link.target(), "other-note");
/// assert_eq!(link.section(), Some("Intro"));
/// assert!(link.is_syntactically_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    target: String,
    display_text: Option<String>,
    kind: LinkKind,
    line: u32,
    section: Option<String>,
    is_embed: bool,
}

impl Link {
    /// Creates a link. `line` is 1-based within the source file.
    pub fn new(target: impl Into<String>, kind: LinkKind, line: u32) -> Self {
        Self {
            target: target.into(),
            display_text: None,
            kind,
            line,
            section: None,
            is_embed: false,
        }
    }

    /// Sets the display text, ignoring blank text.
    pub fn with_display_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.display_text = Some(text);
        }
        self
    }

    /// Sets the section, heading or block anchor (`#intro`, `#^block`).
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        let section = section.into();
        if !section.is_empty() {
            self.section = Some(section);
        }
        self
    }

    /// Marks the link as an embed (`![[...]]` or an image).
    pub fn embedded(mut self) -> Self {
        self.is_embed = true;
        self
    }

    /// Returns the raw target as written, without section suffix.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the display text, if any.
    pub fn display_text(&self) -> Option<&str> {
        self.display_text.as_deref()
    }

    /// Returns the link kind.
    pub fn kind(&self) -> LinkKind {
        self.kind
    }

    /// Returns the 1-based line number.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Returns the section or block anchor, if any.
    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    /// Returns true if this is an embed.
    pub fn is_embed(&self) -> bool {
        self.is_embed
    }

    /// Returns true for links pointing outside the corpus.
    pub fn is_external(&self) -> bool {
        self.kind == LinkKind::External
    }

    /// First-phase validity: does the link have anything to point at?
    ///
    /// External links are valid by syntax alone. Internal links need a target
    /// or a same-document section (`[[#Heading]]`).
    pub fn is_syntactically_valid(&self) -> bool {
        match self.kind {
            LinkKind::External => true,
            _ => !self.target.trim().is_empty() || self.section.is_some(),
        }
    }
}
