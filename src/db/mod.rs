pub mod connection;
pub mod indexer;
pub mod naming;
pub mod schema;

pub use connection::DbPool;
pub use indexer::{FieldValues, Indexer};
pub use schema::{FieldChange, FieldLayout, IndexLayout, SchemaManager};
