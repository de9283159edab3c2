//! Search index abstraction.
//!
//! The indexer is the only writer of the search engine. It needs collection management
//! (create, list, delete), per-document mutations, bulk import and alias management, which
//! is what [`SearchIndex`] exposes.
//!
//! # Collections and aliases
//!
//! ```text
//!  consumers ──▶ alias "equipments" ──▶ equipments-7d1e…   (current generation)
//!                                       equipments-03ab…   (stale, deleted on cleanup)
//! ```
//!
//! Each rebuild writes a fresh collection and only then points the alias at it, so
//! consumers never observe a partially built index.
//!
//! # Implementations
//!
//! - `TypesenseClient` (in `equipment-search-typesense`): production implementation
//! - `InMemorySearchIndex` (in `equipment-search-testing`): deterministic testing

use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

/// Errors returned by search index operations.
#[derive(Error, Debug)]
pub enum SearchIndexError {
    /// The collection, document or alias does not exist.
    ///
    /// Callers deleting a document are expected to treat this as benign.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The resource already exists (e.g. creating an existing collection).
    #[error("Already exists: {0}")]
    Conflict(String),

    /// The search engine answered with an unexpected status.
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or error message
        message: String,
    },

    /// One or more documents of a bulk import were rejected.
    #[error("Import into {collection} rejected {failed} documents; first error: {first_error}")]
    Import {
        /// Target collection
        collection: String,
        /// Number of rejected documents
        failed: usize,
        /// First error reported by the engine
        first_error: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request or response body could not be encoded/decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SearchIndexError {
    /// Whether this error reports a missing resource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for search index operations.
pub type Result<T> = std::result::Result<T, SearchIndexError>;

/// The document persisted for an indexable equipment.
///
/// Wire shape: `{ "id": "<equipment id>", "name": "<display name>" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SearchDocument {
    /// Equipment identifier, stringified
    pub id: String,
    /// Equipment display name
    pub name: String,
}

impl SearchDocument {
    /// Create a document.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Field types supported by the collection schemas the indexer creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free-text string field
    String,
}

/// One field of a collection schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Field type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field can be used for faceting
    pub facet: bool,
    /// Whether the field may be missing from documents
    pub optional: bool,
    /// Whether the field is indexed for search
    pub index: bool,
}

impl Field {
    /// An indexed, required, non-faceted string field.
    #[must_use]
    pub fn indexed_string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::String,
            facet: false,
            optional: false,
            index: true,
        }
    }
}

/// Schema of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Collection name
    pub name: String,
    /// Field definitions
    pub fields: Vec<Field>,
}

impl CollectionSchema {
    /// The equipment schema: `{id: string, name: string}`, both indexed, neither faceted.
    ///
    /// # Example
    ///
    /// ```
    /// use equipment_search_core::search::CollectionSchema;
    ///
    /// let schema = CollectionSchema::equipment("equipments-1");
    /// assert_eq!(schema.fields.len(), 2);
    /// assert!(schema.fields.iter().all(|f| f.index && !f.facet));
    /// ```
    #[must_use]
    pub fn equipment(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: vec![Field::indexed_string("id"), Field::indexed_string("name")],
        }
    }
}

/// Summary of an existing collection, as returned by [`SearchIndex::list_collections`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    /// Collection name
    pub name: String,
    /// Number of stored documents
    #[serde(default)]
    pub num_documents: u64,
}

/// Write access to the search engine.
///
/// All operations are single requests; none of them retries internally.
pub trait SearchIndex: Send + Sync {
    /// Create a collection.
    ///
    /// # Errors
    ///
    /// Returns [`SearchIndexError::Conflict`] if it already exists.
    fn create_collection(
        &self,
        schema: &CollectionSchema,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete a collection and all of its documents.
    ///
    /// # Errors
    ///
    /// Returns [`SearchIndexError::NotFound`] if it does not exist.
    fn delete_collection(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// List all collections.
    ///
    /// # Errors
    ///
    /// Returns [`SearchIndexError`] if the request fails.
    fn list_collections(&self) -> impl Future<Output = Result<Vec<CollectionSummary>>> + Send;

    /// Insert or replace a document.
    ///
    /// # Errors
    ///
    /// Returns [`SearchIndexError`] if the request fails.
    fn upsert_document(
        &self,
        collection: &str,
        document: &SearchDocument,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Update an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`SearchIndexError::NotFound`] if the document does not exist.
    fn update_document(
        &self,
        collection: &str,
        id: &str,
        document: &SearchDocument,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete a document.
    ///
    /// # Errors
    ///
    /// Returns [`SearchIndexError::NotFound`] if the document does not exist; callers are
    /// expected to treat that case as benign.
    fn delete_document(&self, collection: &str, id: &str)
    -> impl Future<Output = Result<()>> + Send;

    /// Bulk-import documents (upsert semantics), letting the engine process them in
    /// batches of `batch_size`.
    ///
    /// Returns the number of imported documents.
    ///
    /// # Errors
    ///
    /// Returns [`SearchIndexError::Import`] if any document is rejected.
    fn import_documents(
        &self,
        collection: &str,
        documents: &[SearchDocument],
        batch_size: usize,
    ) -> impl Future<Output = Result<usize>> + Send;

    /// Create `alias` or re-point it at `collection` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`SearchIndexError`] if the request fails.
    fn upsert_alias(&self, alias: &str, collection: &str)
    -> impl Future<Output = Result<()>> + Send;
}
