// Backend-agnostic connector contract for datastore backends

pub mod lexical;

pub use lexical::LexicalConnector;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::models::{Datastore, DatastoreStats, Document, Index, QueryResult};

/// Lazy, forward-only stream of documents backed by a server-side cursor.
///
/// The stream is not restartable and must not buffer the whole collection;
/// consumers iterate it once, front to back.
pub type DocumentStream<'a> = BoxStream<'a, Result<Document>>;

/// Capability set every concrete datastore backend implements.
///
/// Read operations report missing resources as `None`/`false`, never as
/// errors; only network and backend failures propagate as `Err`. Connectors
/// hold no per-call state and are safe to share across concurrent requests.
#[async_trait]
pub trait DatastoreConnector: Send + Sync {
    // --- Datastore schemas ---

    /// Returns all datastores.
    async fn get_datastores(&self) -> Result<Vec<Datastore>>;

    /// Returns a datastore by name.
    async fn get_datastore(&self, datastore_name: &str) -> Result<Option<Datastore>>;

    /// Creates a datastore. `Ok(false)` means the backend rejected the
    /// create (e.g. the datastore already exists).
    async fn add_datastore(&self, datastore: &Datastore) -> Result<bool>;

    /// Merges additional fields into a datastore's schema. Fields are
    /// additive; removal and retyping are not exposed. `Ok(false)` if the
    /// datastore does not exist.
    async fn update_datastore(&self, datastore: &Datastore) -> Result<bool>;

    /// Deletes a datastore with all its documents and indices. `Ok(false)`
    /// if it does not exist.
    async fn delete_datastore(&self, datastore_name: &str) -> Result<bool>;

    /// Returns document count and storage size of a datastore.
    async fn get_datastore_stats(&self, datastore_name: &str) -> Result<Option<DatastoreStats>>;

    // --- Index configurations ---

    /// Returns all indices of a datastore.
    async fn get_indices(&self, datastore_name: &str) -> Result<Vec<Index>>;

    /// Returns an index by name.
    async fn get_index(&self, datastore_name: &str, index_name: &str) -> Result<Option<Index>>;

    /// Adds a new index configuration.
    async fn add_index(&self, index: &Index) -> Result<bool>;

    /// Updates an index. Returns `(success, created)` so callers can
    /// distinguish a fresh create from a merge-update.
    async fn update_index(&self, index: &Index) -> Result<(bool, bool)>;

    /// Deletes an index independently of its datastore's documents.
    async fn delete_index(&self, datastore_name: &str, index_name: &str) -> Result<bool>;

    // --- Documents ---

    /// Streams all documents of a datastore. A missing datastore yields an
    /// empty stream.
    fn get_documents<'a>(&'a self, datastore_name: &str) -> DocumentStream<'a>;

    /// Returns a document by id.
    async fn get_document(&self, datastore_name: &str, document_id: &str)
        -> Result<Option<Document>>;

    /// Returns the documents existing under the given ids; missing ids are
    /// silently dropped from the result.
    async fn get_document_batch(
        &self,
        datastore_name: &str,
        document_ids: &[String],
    ) -> Result<Vec<Document>>;

    /// Upserts a document under the given id. Returns `(success, created)`.
    async fn add_document(
        &self,
        datastore_name: &str,
        document_id: &str,
        document: &Document,
    ) -> Result<(bool, bool)>;

    /// Writes a batch of documents, never aborting on per-item failures.
    /// Returns `(successes, errors)`; error counts come from the backend's
    /// per-item results plus locally rejected malformed documents.
    async fn add_document_batch(
        &self,
        datastore_name: &str,
        documents: &[Document],
    ) -> Result<(usize, usize)>;

    /// Partially updates a document. Returns `(success, created)`.
    async fn update_document(
        &self,
        datastore_name: &str,
        document_id: &str,
        document: &Document,
    ) -> Result<(bool, bool)>;

    /// Deletes a document by id. `Ok(false)` if it does not exist.
    async fn delete_document(&self, datastore_name: &str, document_id: &str) -> Result<bool>;

    /// Checks whether a document exists.
    async fn has_document(&self, datastore_name: &str, document_id: &str) -> Result<bool>;

    // --- Lexical search ---

    /// Full-text search over a datastore's documents.
    async fn search(
        &self,
        datastore_name: &str,
        query: &str,
        n_hits: usize,
    ) -> Result<Vec<QueryResult>>;

    /// Scores one specific document against a query. `Ok(None)` if the
    /// document does not exist.
    async fn search_for_id(
        &self,
        datastore_name: &str,
        query: &str,
        document_id: &str,
    ) -> Result<Option<QueryResult>>;

    // --- Management ---

    /// Flushes pending writes so that subsequent reads observe them.
    async fn commit(&self) -> Result<()>;
}
