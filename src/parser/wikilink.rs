//! Vault-style markdown: `[[wikilinks]]`, embeds, callouts, template blocks.

use super::generic::{TAG_KEYS, header_tags};
use super::markdown::push_unique;
use super::{DocumentParser, MarkdownBody};
use crate::domain::{Callout, Dialect, Link, LinkKind, Tag};
use crate::infra::frontmatter::SplitDocument;
use crate::infra::{Header, read_header};
use regex::Regex;
use std::sync::LazyLock;

/// `[[target#section|alias]]`, optionally `!`-prefixed for embeds.
static WIKILINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(!)?\[\[([^\[\]|#\n]*)(?:#([^\[\]|\n]*))?(?:\|([^\[\]\n]*))?\]\]")
        .expect("wikilink pattern is valid")
});

static CALLOUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*>[ \t]*\[!([A-Za-z][\w-]*)\][+-]?[ \t]*(.*)$")
        .expect("callout pattern is valid")
});

static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<%.*?%>|\{\{.*?\}\}").expect("template pattern is valid")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct WikilinkParser;

impl DocumentParser for WikilinkParser {
    fn dialect(&self) -> Dialect {
        Dialect::Wikilink
    }

    fn parse_header<'a>(&self, content: &'a str) -> (Header, SplitDocument<'a>) {
        read_header(content, false)
    }

    fn prepare_body<'a>(&self, mut body: MarkdownBody<'a>) -> MarkdownBody<'a> {
        let ranges: Vec<_> = TEMPLATE_RE
            .find_iter(body.masked())
            .map(|m| m.range())
            .collect();
        body.mask(&ranges);
        body
    }

    fn extract_tags(&self, header: &Header, body: &MarkdownBody<'_>) -> Vec<Tag> {
        let mut tags = header_tags(header, TAG_KEYS);
        push_unique(&mut tags, body.inline_tags());
        tags
    }

    fn extract_links(&self, _header: &Header, body: &MarkdownBody<'_>) -> Vec<Link> {
        let wikilinks = WIKILINK_RE.captures_iter(body.masked()).filter_map(|cap| {
            let whole = cap.get(0)?;
            let target = cap.get(2).map_or("", |m| m.as_str()).trim();
            let section = cap.get(3).map_or("", |m| m.as_str()).trim();
            if target.is_empty() && section.is_empty() {
                return None;
            }
            let link = Link::new(target, LinkKind::Wikilink, body.line_of(whole.start()))
                .with_section(section)
                .with_display_text(cap.get(4).map_or("", |m| m.as_str()).trim());
            Some(if cap.get(1).is_some() { link.embedded() } else { link })
        });

        let mut links: Vec<Link> = body.markdown_links().to_vec();
        links.extend(wikilinks);
        // stable: same-line links keep markdown-then-wikilink order
        links.sort_by_key(|link| link.line());
        links
    }

    fn extract_callouts(&self, body: &MarkdownBody<'_>) -> Vec<Callout> {
        CALLOUT_RE
            .captures_iter(body.masked())
            .filter_map(|cap| {
                let whole = cap.get(0)?;
                let title = cap
                    .get(2)
                    .map(|m| m.as_str().trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                Some(Callout {
                    kind: cap[1].to_lowercase(),
                    title,
                    line: body.line_of(whole.start()),
                })
            })
            .collect()
    }
}
