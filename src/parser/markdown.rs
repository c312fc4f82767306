//! Dialect-independent analysis of a markdown body.
//!
//! One pulldown-cmark pass collects headings, markdown links and the byte
//! ranges of code. Regex-based extractors (inline tags, wikilinks, callouts)
//! then run over a copy of the text with those code ranges blanked out, so
//! offsets and line numbers stay aligned with the original.

use crate::domain::{Heading, Link, LinkKind, Tag, TagSource, has_url_scheme};
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag as MdTag};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static INLINE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^|\s)#([\p{L}\p{N}_/\-]+)").expect("inline tag pattern is valid")
});

/// A markdown body with code masked out and structure extracted.
#[derive(Debug, Clone)]
pub struct MarkdownBody<'a> {
    text: &'a str,
    masked: String,
    first_line: u32,
    line_starts: Vec<usize>,
    headings: Vec<Heading>,
    links: Vec<Link>,
}

struct OpenLink {
    kind: LinkKind,
    target: String,
    text: String,
    start: usize,
    embed: bool,
}

impl<'a> MarkdownBody<'a> {
    /// Analyzes `text`, which starts on line `first_line` of its file.
    pub fn analyze(text: &'a str, first_line: u32) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        let mut body = Self {
            text,
            masked: String::new(),
            first_line,
            line_starts,
            headings: Vec::new(),
            links: Vec::new(),
        };

        let mut code_ranges: Vec<Range<usize>> = Vec::new();
        let mut heading: Option<(u8, usize, String)> = None;
        let mut open_link: Option<OpenLink> = None;

        let options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_FOOTNOTES;

        for (event, range) in Parser::new_ext(text, options).into_offset_iter() {
            match event {
                Event::Start(MdTag::CodeBlock(_)) => code_ranges.push(range),
                Event::Code(code) => {
                    code_ranges.push(range);
                    if let Some((_, _, buf)) = heading.as_mut() {
                        buf.push_str(&code);
                    }
                    if let Some(link) = open_link.as_mut() {
                        link.text.push_str(&code);
                    }
                }
                Event::Start(MdTag::Heading(level, _, _)) => {
                    heading = Some((level as u8, range.start, String::new()));
                }
                Event::End(MdTag::Heading(..)) => {
                    if let Some((level, start, text)) = heading.take() {
                        let text = text.trim().to_string();
                        if !text.is_empty() {
                            body.headings.push(Heading {
                                level,
                                text,
                                line: body.line_of(start),
                            });
                        }
                    }
                }
                Event::Start(MdTag::Link(link_type, dest, _)) => {
                    open_link = Some(OpenLink {
                        kind: markdown_link_kind(link_type, &dest),
                        target: link_target(link_type, &dest),
                        text: String::new(),
                        start: range.start,
                        embed: false,
                    });
                }
                Event::Start(MdTag::Image(link_type, dest, _)) => {
                    open_link = Some(OpenLink {
                        kind: markdown_link_kind(link_type, &dest),
                        target: link_target(link_type, &dest),
                        text: String::new(),
                        start: range.start,
                        embed: true,
                    });
                }
                Event::End(MdTag::Link(..)) | Event::End(MdTag::Image(..)) => {
                    if let Some(open) = open_link.take() {
                        let link = body.finish_link(open);
                        body.links.push(link);
                    }
                }
                Event::Text(t) => {
                    if let Some((_, _, buf)) = heading.as_mut() {
                        buf.push_str(&t);
                    }
                    if let Some(link) = open_link.as_mut() {
                        link.text.push_str(&t);
                    }
                }
                _ => {}
            }
        }

        body.masked = blank_ranges(text, &code_ranges);
        body
    }

    fn finish_link(&self, open: OpenLink) -> Link {
        let line = self.line_of(open.start);
        let (target, section) = match open.kind {
            LinkKind::External => (open.target, String::new()),
            _ => split_fragment(&open.target),
        };
        let link = Link::new(target, open.kind, line)
            .with_display_text(open.text)
            .with_section(section);
        if open.embed { link.embedded() } else { link }
    }

    /// Returns the original body text.
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Returns the body with code blanked out.
    pub fn masked(&self) -> &str {
        &self.masked
    }

    /// Returns headings in document order.
    pub fn headings(&self) -> &[Heading] {
        &self.headings
    }

    /// Returns inline, reference, autolink and image links in document order.
    pub fn markdown_links(&self) -> &[Link] {
        &self.links
    }

    /// Returns the text of the first level-1 heading.
    pub fn first_h1(&self) -> Option<&str> {
        self.headings
            .iter()
            .find(|h| h.level == 1)
            .map(|h| h.text.as_str())
    }

    /// Blanks additional ranges of the masked text (template blocks).
    pub fn mask(&mut self, ranges: &[Range<usize>]) {
        self.masked = blank_ranges(&self.masked, ranges);
    }

    /// Converts a byte offset in the body to a 1-based file line.
    pub fn line_of(&self, offset: usize) -> u32 {
        let index = self.line_starts.partition_point(|&start| start <= offset);
        self.first_line + index.saturating_sub(1) as u32
    }

    /// Extracts `#tags` from the masked body.
    ///
    /// A tag must follow whitespace or start a line and contain at least one
    /// non-digit (`#123` is an issue reference, not a tag).
    pub fn inline_tags(&self) -> Vec<Tag> {
        INLINE_TAG_RE
            .captures_iter(&self.masked)
            .filter_map(|cap| cap.get(1))
            .map(|m| m.as_str())
            .filter(|s| s.chars().any(|c| !c.is_ascii_digit() && c != '/'))
            .filter_map(|s| Tag::new(s, TagSource::Inline).ok())
            .collect()
    }
}

fn markdown_link_kind(link_type: LinkType, dest: &str) -> LinkKind {
    if has_url_scheme(dest) || link_type == LinkType::Email {
        return LinkKind::External;
    }
    match link_type {
        LinkType::Reference
        | LinkType::ReferenceUnknown
        | LinkType::Collapsed
        | LinkType::CollapsedUnknown
        | LinkType::Shortcut
        | LinkType::ShortcutUnknown => LinkKind::Reference,
        _ => LinkKind::Inline,
    }
}

fn link_target(link_type: LinkType, dest: &str) -> String {
    if link_type == LinkType::Email && !dest.starts_with("mailto:") {
        format!("mailto:{}", dest)
    } else {
        dest.to_string()
    }
}

/// Splits `path#fragment` into its parts.
pub(crate) fn split_fragment(target: &str) -> (String, String) {
    match target.split_once('#') {
        Some((path, fragment)) => (path.to_string(), fragment.to_string()),
        None => (target.to_string(), String::new()),
    }
}

fn blank_ranges(text: &str, ranges: &[Range<usize>]) -> String {
    if ranges.is_empty() {
        return text.to_string();
    }
    let mut bytes = text.as_bytes().to_vec();
    for range in ranges {
        let end = range.end.min(bytes.len());
        for b in &mut bytes[range.start.min(end)..end] {
            if *b != b'\n' {
                *b = b' ';
            }
        }
    }
    String::from_utf8(bytes).unwrap_or_else(|_| text.to_string())
}

/// Adds tags not already present, preserving first-seen order.
pub(crate) fn push_unique(tags: &mut Vec<Tag>, new: impl IntoIterator<Item = Tag>) {
    for tag in new {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
}
