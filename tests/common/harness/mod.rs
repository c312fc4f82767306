//! Test harness for integration tests.
//!
//! Provides isolated corpora on disk, programmatic document creation,
//! and CLI assertion helpers using `assert_cmd`.

mod command;
mod doc;
mod env;

// Re-export main types for external use
#[allow(unused_imports)]
pub use command::MdindexCommand;
#[allow(unused_imports)]
pub use doc::TestDoc;
#[allow(unused_imports)]
pub use env::TestEnv;
