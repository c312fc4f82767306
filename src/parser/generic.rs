//! Plain markdown: YAML header, `#tags`, standard links.

use super::markdown::push_unique;
use super::{DocumentParser, MarkdownBody};
use crate::domain::{Dialect, Link, Tag, TagSource};
use crate::infra::frontmatter::SplitDocument;
use crate::infra::{Header, read_header};

/// Header keys that hold tags in the generic and wikilink dialects.
pub(super) const TAG_KEYS: &[&str] = &["tags", "tag"];

#[derive(Debug, Clone, Copy, Default)]
pub struct GenericParser;

impl DocumentParser for GenericParser {
    fn dialect(&self) -> Dialect {
        Dialect::Generic
    }

    fn parse_header<'a>(&self, content: &'a str) -> (Header, SplitDocument<'a>) {
        read_header(content, false)
    }

    fn extract_tags(&self, header: &Header, body: &MarkdownBody<'_>) -> Vec<Tag> {
        let mut tags = header_tags(header, TAG_KEYS);
        push_unique(&mut tags, body.inline_tags());
        tags
    }

    fn extract_links(&self, _header: &Header, body: &MarkdownBody<'_>) -> Vec<Link> {
        body.markdown_links().to_vec()
    }
}

/// Collects header tags from the given keys, skipping malformed entries.
pub(super) fn header_tags(header: &Header, keys: &[&str]) -> Vec<Tag> {
    let mut tags = Vec::new();
    for key in keys {
        let parsed = header
            .list(key)
            .iter()
            .filter_map(|raw| Tag::new(raw, TagSource::Frontmatter).ok())
            .collect::<Vec<_>>();
        push_unique(&mut tags, parsed);
    }
    tags
}
