//! Blog-style markdown: YAML or TOML header carries all metadata.
//!
//! `#` in the body is left alone (anchors, colours), so tags come only from
//! the header.

use super::generic::header_tags;
use super::{DocumentParser, MarkdownBody};
use crate::domain::{Dialect, Link, Tag};
use crate::infra::frontmatter::SplitDocument;
use crate::infra::{Header, read_header};

const TAG_KEYS: &[&str] = &["tags", "categories", "keywords"];

#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderOnlyParser;

impl DocumentParser for HeaderOnlyParser {
    fn dialect(&self) -> Dialect {
        Dialect::HeaderOnly
    }

    fn parse_header<'a>(&self, content: &'a str) -> (Header, SplitDocument<'a>) {
        read_header(content, true)
    }

    fn extract_tags(&self, header: &Header, _body: &MarkdownBody<'_>) -> Vec<Tag> {
        header_tags(header, TAG_KEYS)
    }

    fn extract_links(&self, _header: &Header, body: &MarkdownBody<'_>) -> Vec<Link> {
        body.markdown_links().to_vec()
    }
}
