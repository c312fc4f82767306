//! Core types: DocumentRecord, Dialect, Tag, Link, FieldValue

mod dialect;
mod document;
mod field;
mod link;
mod tag;

pub use dialect::{Dialect, ParseDialectError};
pub use document::{Callout, ContentCounts, DocumentRecord, Heading, slash_path};
pub use field::{FieldKind, FieldValue, infer_kind, list_items};
pub use link::{Link, LinkKind, has_url_scheme};
pub use tag::{ParseTagError, Tag, TagSource};
