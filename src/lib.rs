// Multi-backend retrieval core: datastore CRUD over a lexical document
// store plus dense retrieval through ANN and embedding services

pub mod clients;
pub mod config;
pub mod connector;
pub mod error;
pub mod models;
pub mod retrieval;

pub use clients::{AnnServiceClient, EmbeddingServiceClient, QueryEncoder, VectorSearch};
pub use config::Settings;
pub use connector::{DatastoreConnector, DocumentStream, LexicalConnector};
pub use error::{Result, RetrievalError};
pub use models::{
    Datastore, DatastoreField, DatastoreStats, Document, DocumentEmbedding, FieldType, Index,
    QueryResult, DEFAULT_TOP_K, ID_FIELD,
};
pub use retrieval::DenseRetrieval;
