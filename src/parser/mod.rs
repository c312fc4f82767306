//! Dialect-aware document parsing.
//!
//! Each [`Dialect`] has one [`DocumentParser`] implementation. The indexer
//! picks one with [`parser_for`] at construction and uses it for every file.

mod generic;
mod header_only;
mod markdown;
mod wikilink;

pub use generic::GenericParser;
pub use header_only::HeaderOnlyParser;
pub use markdown::MarkdownBody;
pub use wikilink::WikilinkParser;

use crate::domain::{Callout, Dialect, FieldValue, Heading, Link, Tag};
use crate::infra::Header;
use crate::infra::frontmatter::SplitDocument;

/// Everything extracted from one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    /// Header `title`, else the first level-1 heading.
    pub title: Option<String>,
    pub has_frontmatter: bool,
    pub fields: Vec<FieldValue>,
    pub tags: Vec<Tag>,
    pub links: Vec<Link>,
    pub headings: Vec<Heading>,
    pub callouts: Vec<Callout>,
    /// Body text after the header block.
    pub body: String,
}

/// Parses one markdown dialect.
///
/// Implementations must never fail: malformed headers degrade to a headerless
/// document and extraction continues on the body.
pub trait DocumentParser: Send + Sync {
    /// The dialect this parser implements.
    fn dialect(&self) -> Dialect;

    /// Splits and parses the structured header.
    fn parse_header<'a>(&self, content: &'a str) -> (Header, SplitDocument<'a>);

    /// Extracts tags from header fields and body.
    fn extract_tags(&self, header: &Header, body: &MarkdownBody<'_>) -> Vec<Tag>;

    /// Extracts outgoing links from the body.
    fn extract_links(&self, header: &Header, body: &MarkdownBody<'_>) -> Vec<Link>;

    /// Extracts callout blocks. Only the wikilink dialect has them.
    fn extract_callouts(&self, _body: &MarkdownBody<'_>) -> Vec<Callout> {
        Vec::new()
    }

    /// Prepares the body before extraction (masking template syntax).
    fn prepare_body<'a>(&self, body: MarkdownBody<'a>) -> MarkdownBody<'a> {
        body
    }

    /// Parses a whole document.
    fn parse(&self, content: &str) -> ParsedDocument {
        let (header, split) = self.parse_header(content);
        let body = self.prepare_body(MarkdownBody::analyze(split.body, split.body_line));

        let tags = self.extract_tags(&header, &body);
        let links = self.extract_links(&header, &body);
        let callouts = self.extract_callouts(&body);

        let title = header
            .string("title")
            .map(str::to_string)
            .or_else(|| body.first_h1().map(str::to_string));

        ParsedDocument {
            title,
            has_frontmatter: header.is_present(),
            tags,
            links,
            headings: body.headings().to_vec(),
            callouts,
            body: split.body.to_string(),
            fields: header.into_fields(),
        }
    }
}

/// Returns the parser for a dialect.
pub fn parser_for(dialect: Dialect) -> Box<dyn DocumentParser> {
    match dialect {
        Dialect::Generic => Box::new(GenericParser),
        Dialect::Wikilink => Box::new(WikilinkParser),
        Dialect::HeaderOnly => Box::new(HeaderOnlyParser),
    }
}
