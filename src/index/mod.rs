//! SQLite store, schema migrations and the incremental indexer

mod builder;
mod repository;
mod resolve;
pub mod schema;
mod sqlite;
mod value;

pub use builder::{
    BuildError, CancellationToken, FailedDocument, IndexOneResult, IndexOptions, IndexStats, Indexer,
    IndexerConfig, NoopReporter, ProgressReporter, STORE_DIR, store_path,
};
pub use repository::{
    ConsistencyReport, DocumentRepository, IndexError, IndexResult, IndexedPath, LinkResolution,
    StoredLink,
};
pub use resolve::LinkResolver;
pub use schema::{SCHEMA_VERSION, SchemaError};
pub use sqlite::{Store, Transaction};
pub use value::{Row, Value};
