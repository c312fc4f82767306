//! Read-only query engine: validation, bounding, builder and derived views.

mod builder;
mod engine;
mod error;
mod validate;
mod views;

pub use builder::{BuiltQuery, QueryBuilder};
pub use engine::{QueryEngine, QueryResult};
pub use error::{ExecuteOptions, QueryError, QueryLimits};
pub use validate::{ValidatedQuery, validate};
pub use views::SearchOptions;
