//! File I/O, scanning, fingerprints, header parsing

mod content_hash;
pub mod frontmatter;
mod fs;

pub use content_hash::{ContentHash, ContentHashError, fingerprint};
pub use frontmatter::{Header, HeaderError, HeaderFormat, read_header};
pub use fs::{DEFAULT_MAX_FILE_SIZE, FsError, ScanOptions, Scanner, decode, read_file};
