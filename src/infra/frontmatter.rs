//! Structured header splitting and parsing.
//!
//! A header is a YAML block fenced by `---` lines, or (when accepted) a TOML
//! block fenced by `+++` lines, at the very start of a document. Parsing never
//! fails outward: [`read_header`] degrades a malformed header to "no fields"
//! and still strips the delimited block from the body.

use crate::domain::{FieldKind, FieldValue};
use thiserror::Error;

/// The syntax of a structured header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFormat {
    /// `---` fenced YAML.
    Yaml,
    /// `+++` fenced TOML.
    Toml,
}

impl HeaderFormat {
    fn delimiter(&self) -> &'static str {
        match self {
            Self::Yaml => "---",
            Self::Toml => "+++",
        }
    }
}

/// Errors while parsing a delimited header block.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("invalid YAML in header: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("invalid TOML in header: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("header is not a key/value mapping")]
    NotAMapping,
}

/// A delimited header block, not yet parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader<'a> {
    pub format: HeaderFormat,
    pub text: &'a str,
}

/// A document split into an optional header block and its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitDocument<'a> {
    pub header: Option<RawHeader<'a>>,
    pub body: &'a str,
    /// 1-based line of the file on which `body` starts.
    pub body_line: u32,
}

/// Parsed header fields, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    fields: Vec<FieldValue>,
    present: bool,
}

impl Header {
    /// A document without a usable header.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Returns true if a header block parsed successfully (even if empty).
    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Returns all fields.
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    /// Consumes the header, returning its fields.
    pub fn into_fields(self) -> Vec<FieldValue> {
        self.fields
    }

    /// Looks up a field by key (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key().eq_ignore_ascii_case(key))
    }

    /// Returns a scalar field's raw text, if present and non-empty.
    pub fn string(&self, key: &str) -> Option<&str> {
        self.get(key)
            .filter(|f| !matches!(f.kind(), FieldKind::Array | FieldKind::Object))
            .map(|f| f.raw().trim())
            .filter(|s| !s.is_empty())
    }

    /// Returns a field as a list of strings, empty when absent.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key).map(FieldValue::items).unwrap_or_default()
    }
}

/// Splits a header block off the start of a document.
///
/// The opening delimiter must be the first line. Without a closing delimiter
/// the whole content is body.
pub fn split(content: &str, accept_toml: bool) -> SplitDocument<'_> {
    let headerless = SplitDocument {
        header: None,
        body: content,
        body_line: 1,
    };

    let format = if opens_with(content, HeaderFormat::Yaml) {
        HeaderFormat::Yaml
    } else if accept_toml && opens_with(content, HeaderFormat::Toml) {
        HeaderFormat::Toml
    } else {
        return headerless;
    };

    let after_opening = match content[3..].find('\n') {
        Some(offset) => 3 + offset + 1,
        None => return headerless,
    };

    let mut pos = after_opening;
    let mut line = 2u32;
    while pos <= content.len() {
        let rest = &content[pos..];
        let line_end = rest.find('\n').map(|i| pos + i).unwrap_or(content.len());
        let text = content[pos..line_end].trim_end_matches('\r');

        if text == format.delimiter() || (format == HeaderFormat::Yaml && text == "...") {
            let body_start = (line_end + 1).min(content.len());
            return SplitDocument {
                header: Some(RawHeader {
                    format,
                    text: &content[after_opening..pos],
                }),
                body: &content[body_start..],
                body_line: line + 1,
            };
        }

        if line_end >= content.len() {
            break;
        }
        pos = line_end + 1;
        line += 1;
    }

    headerless
}

fn opens_with(content: &str, format: HeaderFormat) -> bool {
    let delimiter = format.delimiter();
    content
        .strip_prefix(delimiter)
        .is_some_and(|rest| rest.starts_with('\n') || rest.starts_with("\r\n"))
}

/// Parses a delimited header block into fields.
///
/// # Errors
///
/// Returns `HeaderError` if the block is not valid YAML/TOML or is not a
/// mapping at the top level. An empty block is a present, empty header.
pub fn parse_header(raw: &RawHeader<'_>) -> Result<Header, HeaderError> {
    if raw.text.trim().is_empty() {
        return Ok(Header {
            fields: Vec::new(),
            present: true,
        });
    }

    let fields = match raw.format {
        HeaderFormat::Yaml => {
            let value: serde_yaml::Value = serde_yaml::from_str(raw.text)?;
            let serde_yaml::Value::Mapping(mapping) = value else {
                return Err(HeaderError::NotAMapping);
            };
            mapping
                .iter()
                .map(|(k, v)| FieldValue::from_yaml(yaml_key(k), v))
                .collect()
        }
        HeaderFormat::Toml => {
            let table: toml::Table = toml::from_str(raw.text)?;
            table
                .iter()
                .map(|(k, v)| FieldValue::from_toml(k.as_str(), v))
                .collect()
        }
    };

    Ok(Header {
        fields,
        present: true,
    })
}

fn yaml_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Splits and parses a header, degrading gracefully.
///
/// A malformed header yields [`Header::absent`] but its delimited block is
/// still removed from the returned body.
pub fn read_header(content: &str, accept_toml: bool) -> (Header, SplitDocument<'_>) {
    let split = split(content, accept_toml);
    let header = match &split.header {
        Some(raw) => parse_header(raw).unwrap_or_else(|e| {
            tracing::debug!("treating document as headerless: {}", e);
            Header::absent()
        }),
        None => Header::absent(),
    };
    (header, split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ===========================================
    // Splitting
    // ===========================================

    #[test]
    fn split_yaml_header_and_body() {
        let doc = split("---\ntitle: A\n---\nbody text", false);
        assert_eq!(doc.header.unwrap().text, "title: A\n");
        assert_eq!(doc.header.unwrap().format, HeaderFormat::Yaml);
        assert_eq!(doc.body, "body text");
        assert_eq!(doc.body_line, 4);
    }

    #[test]
    fn split_without_header_keeps_everything() {
        let doc = split("# Title\nbody", false);
        assert!(doc.header.is_none());
        assert_eq!(doc.body, "# Title\nbody");
        assert_eq!(doc.body_line, 1);
    }

    #[test]
    fn split_missing_closing_delimiter_is_headerless() {
        let content = "---\ntitle: A\nno closing";
        let doc = split(content, false);
        assert!(doc.header.is_none());
        assert_eq!(doc.body, content);
    }

    #[test]
    fn split_header_at_end_of_file() {
        let doc = split("---\ntitle: A\n---", false);
        assert_eq!(doc.header.unwrap().text, "title: A\n");
        assert_eq!(doc.body, "");
    }

    #[test]
    fn split_handles_crlf() {
        let doc = split("---\r\ntitle: A\r\n---\r\nbody", false);
        assert_eq!(doc.header.unwrap().text, "title: A\r\n");
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn split_requires_delimiter_on_first_line() {
        let doc = split("\n---\ntitle: A\n---\n", false);
        assert!(doc.header.is_none());
    }

    #[test]
    fn split_triple_dash_inside_line_is_not_a_delimiter() {
        let doc = split("---\na: --- b\n---\nbody", false);
        assert_eq!(doc.header.unwrap().text, "a: --- b\n");
    }

    #[test]
    fn split_toml_only_when_accepted() {
        let content = "+++\ntitle = \"A\"\n+++\nbody";
        assert!(split(content, false).header.is_none());
        let doc = split(content, true);
        assert_eq!(doc.header.unwrap().format, HeaderFormat::Toml);
        assert_eq!(doc.body, "body");
    }

    // ===========================================
    // Parsing
    // ===========================================

    #[test]
    fn parse_yaml_fields_in_order() {
        let (header, _) = read_header("---\ntitle: A\ncount: 3\ndraft: true\n---\n", false);
        assert!(header.is_present());
        let keys: Vec<&str> = header.fields().iter().map(|f| f.key()).collect();
        assert_eq!(keys, vec!["title", "count", "draft"]);
        assert_eq!(header.get("count").unwrap().kind(), FieldKind::Number);
        assert_eq!(header.get("draft").unwrap().kind(), FieldKind::Boolean);
    }

    #[test]
    fn parse_toml_fields() {
        let (header, split) = read_header("+++\ntitle = \"A\"\ntags = [\"x\", \"y\"]\n+++\nbody", true);
        assert_eq!(header.string("title"), Some("A"));
        assert_eq!(header.list("tags"), vec!["x", "y"]);
        assert_eq!(split.body, "body");
    }

    #[test]
    fn empty_header_is_present_without_fields() {
        let (header, split) = read_header("---\n---\nbody", false);
        assert!(header.is_present());
        assert!(header.fields().is_empty());
        assert_eq!(split.body, "body");
    }

    #[test]
    fn malformed_yaml_degrades_to_headerless_and_strips_block() {
        let (header, split) = read_header("---\nkey: [unclosed\n---\nbody text", false);
        assert!(!header.is_present());
        assert!(header.fields().is_empty());
        assert_eq!(split.body, "body text");
    }

    #[test]
    fn scalar_yaml_header_is_not_a_mapping() {
        let raw = RawHeader {
            format: HeaderFormat::Yaml,
            text: "just a string\n",
        };
        assert!(matches!(parse_header(&raw), Err(HeaderError::NotAMapping)));
    }

    #[test]
    fn list_splits_scalar_on_commas_and_whitespace() {
        let (header, _) = read_header("---\ntags: rust, cli  tools\n---\n", false);
        assert_eq!(header.list("tags"), vec!["rust", "cli", "tools"]);
    }

    #[test]
    fn list_of_missing_key_is_empty() {
        let (header, _) = read_header("---\ntitle: A\n---\n", false);
        assert!(header.list("tags").is_empty());
    }

    #[test]
    fn get_is_case_insensitive() {
        let (header, _) = read_header("---\nTitle: A\n---\n", false);
        assert_eq!(header.string("title"), Some("A"));
    }

    #[test]
    fn numeric_keys_become_strings() {
        let (header, _) = read_header("---\n2024: leap\n---\n", false);
        assert_eq!(header.fields()[0].key(), "2024");
    }
}
