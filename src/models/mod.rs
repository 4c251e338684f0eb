// Schema value types shared across connectors and the orchestrator

pub mod datastore;
pub mod document;
pub mod index;
pub mod query;

pub use datastore::{Datastore, DatastoreField, DatastoreStats, FieldType};
pub use document::{Document, ID_FIELD};
pub use index::Index;
pub use query::{DocumentEmbedding, QueryResult, DEFAULT_TOP_K};
