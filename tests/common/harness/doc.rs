//! Builder for test documents with a YAML header.

/// Builder for creating markdown documents with a fluent API.
///
/// The header is only written when at least one header entry was set.
#[derive(Debug, Clone)]
pub struct TestDoc {
    path: String,
    title: Option<String>,
    tags: Vec<String>,
    fields: Vec<(String, String)>,
    body: String,
}

impl TestDoc {
    /// Creates a document at `path`, relative to the corpus root.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: None,
            tags: Vec::new(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    /// Sets the header title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Adds a header tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Adds a raw header entry; `value` is written as YAML verbatim.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Sets the body content.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the path relative to the corpus root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Renders the document as it is written to disk.
    pub fn render(&self) -> String {
        let mut header = String::new();
        if let Some(title) = &self.title {
            header.push_str(&format!("title: \"{}\"\n", title));
        }
        if !self.tags.is_empty() {
            header.push_str(&format!("tags: [{}]\n", self.tags.join(", ")));
        }
        for (key, value) in &self.fields {
            header.push_str(&format!("{}: {}\n", key, value));
        }

        if header.is_empty() {
            self.body.clone()
        } else {
            format!("---\n{}---\n{}", header, self.body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_without_header_is_body_only() {
        let doc = TestDoc::new("a.md").body("hello");
        assert_eq!(doc.render(), "hello");
        assert_eq!(doc.path(), "a.md");
    }

    #[test]
    fn test_doc_renders_header_entries() {
        let doc = TestDoc::new("a.md")
            .title("Alpha")
            .tag("rust")
            .tag("db")
            .field("status", "draft")
            .body("text");
        assert_eq!(
            doc.render(),
            "---\ntitle: \"Alpha\"\ntags: [rust, db]\nstatus: draft\n---\ntext"
        );
    }
}
