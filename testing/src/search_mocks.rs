//! In-memory search index for testing projections and the index lifecycle.
//!
//! Mirrors the behavior of the real engine that matters to the indexer:
//! - creating an existing collection is a conflict
//! - writing to a missing collection, updating or deleting a missing document and
//!   deleting a missing collection are `NotFound`
//! - aliases are plain pointers and may dangle after their collection is deleted
//!
//! Every call is appended to an operation log (even when it fails) so tests can assert on
//! ordering, e.g. that the alias is switched only after the bulk import.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use equipment_search_core::search::{
    CollectionSchema, CollectionSummary, Result, SearchDocument, SearchIndex, SearchIndexError,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock};

/// A recorded search index call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `create_collection`
    CreateCollection(String),
    /// `delete_collection`
    DeleteCollection(String),
    /// `list_collections`
    ListCollections,
    /// `upsert_document`
    UpsertDocument {
        /// Target collection
        collection: String,
        /// Document id
        id: String,
    },
    /// `update_document`
    UpdateDocument {
        /// Target collection
        collection: String,
        /// Document id
        id: String,
    },
    /// `delete_document`
    DeleteDocument {
        /// Target collection
        collection: String,
        /// Document id
        id: String,
    },
    /// `import_documents`
    Import {
        /// Target collection
        collection: String,
        /// Number of documents in the call
        documents: usize,
        /// Requested batch size
        batch_size: usize,
    },
    /// `upsert_alias`
    UpsertAlias {
        /// Alias name
        alias: String,
        /// Target collection
        collection: String,
    },
}

impl Operation {
    /// The kind of this operation.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::CreateCollection(_) => OperationKind::CreateCollection,
            Self::DeleteCollection(_) => OperationKind::DeleteCollection,
            Self::ListCollections => OperationKind::ListCollections,
            Self::UpsertDocument { .. } => OperationKind::UpsertDocument,
            Self::UpdateDocument { .. } => OperationKind::UpdateDocument,
            Self::DeleteDocument { .. } => OperationKind::DeleteDocument,
            Self::Import { .. } => OperationKind::Import,
            Self::UpsertAlias { .. } => OperationKind::UpsertAlias,
        }
    }
}

/// Operation kinds, used for failure injection and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// `create_collection`
    CreateCollection,
    /// `delete_collection`
    DeleteCollection,
    /// `list_collections`
    ListCollections,
    /// `upsert_document`
    UpsertDocument,
    /// `update_document`
    UpdateDocument,
    /// `delete_document`
    DeleteDocument,
    /// `import_documents`
    Import,
    /// `upsert_alias`
    UpsertAlias,
}

#[derive(Debug)]
struct Collection {
    schema: CollectionSchema,
    documents: BTreeMap<String, SearchDocument>,
}

#[derive(Debug, Default)]
struct IndexState {
    collections: BTreeMap<String, Collection>,
    aliases: BTreeMap<String, String>,
    operations: Vec<Operation>,
    failures: VecDeque<OperationKind>,
}

impl IndexState {
    /// Record `operation` and consume a matching injected failure, if any.
    fn record(&mut self, operation: Operation) -> Result<()> {
        let kind = operation.kind();
        self.operations.push(operation);
        if let Some(position) = self.failures.iter().position(|k| *k == kind) {
            self.failures.remove(position);
            tracing::debug!(?kind, "Injected search index failure");
            return Err(SearchIndexError::Transport(format!(
                "injected failure for {kind:?}"
            )));
        }
        Ok(())
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut Collection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| SearchIndexError::NotFound(format!("collection {name}")))
    }
}

/// In-memory search index.
///
/// Cloning shares the underlying state.
///
/// # Example
///
/// ```
/// use equipment_search_testing::InMemorySearchIndex;
/// use equipment_search_core::search::{CollectionSchema, SearchDocument, SearchIndex};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let index = InMemorySearchIndex::new();
/// index.create_collection(&CollectionSchema::equipment("equipments-1")).await?;
/// index.upsert_document("equipments-1", &SearchDocument::new("e1", "Splice1")).await?;
/// index.upsert_alias("equipments", "equipments-1").await?;
///
/// assert_eq!(index.aliased_documents("equipments").len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemorySearchIndex {
    state: Arc<RwLock<IndexState>>,
}

impl InMemorySearchIndex {
    /// Create an empty search index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next operation of `kind` fail with a transport error.
    ///
    /// Multiple calls queue multiple failures.
    pub fn fail_next(&self, kind: OperationKind) {
        self.state.write().unwrap().failures.push_back(kind);
    }

    /// All operations attempted so far, in call order.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.state.read().unwrap().operations.clone()
    }

    /// Operations of one kind, in call order.
    #[must_use]
    pub fn operations_of(&self, kind: OperationKind) -> Vec<Operation> {
        self.operations()
            .into_iter()
            .filter(|operation| operation.kind() == kind)
            .collect()
    }

    /// Forget the operation log (state is kept).
    pub fn clear_operations(&self) {
        self.state.write().unwrap().operations.clear();
    }

    /// Names of all existing collections, sorted.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.state.read().unwrap().collections.keys().cloned().collect()
    }

    /// Schema of a collection.
    #[must_use]
    pub fn schema(&self, collection: &str) -> Option<CollectionSchema> {
        self.state
            .read()
            .unwrap()
            .collections
            .get(collection)
            .map(|c| c.schema.clone())
    }

    /// Documents of a collection sorted by id (empty if the collection is missing).
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<SearchDocument> {
        self.state
            .read()
            .unwrap()
            .collections
            .get(collection)
            .map(|c| c.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    /// One document, if present.
    #[must_use]
    pub fn document(&self, collection: &str, id: &str) -> Option<SearchDocument> {
        self.state
            .read()
            .unwrap()
            .collections
            .get(collection)
            .and_then(|c| c.documents.get(id).cloned())
    }

    /// Collection an alias points to.
    #[must_use]
    pub fn alias_target(&self, alias: &str) -> Option<String> {
        self.state.read().unwrap().aliases.get(alias).cloned()
    }

    /// Documents visible through an alias, the way a consumer would query them.
    #[must_use]
    pub fn aliased_documents(&self, alias: &str) -> Vec<SearchDocument> {
        self.alias_target(alias)
            .map(|collection| self.documents(&collection))
            .unwrap_or_default()
    }
}

impl SearchIndex for InMemorySearchIndex {
    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.record(Operation::CreateCollection(schema.name.clone()))?;
        if state.collections.contains_key(&schema.name) {
            return Err(SearchIndexError::Conflict(format!(
                "collection {}",
                schema.name
            )));
        }
        state.collections.insert(
            schema.name.clone(),
            Collection {
                schema: schema.clone(),
                documents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.record(Operation::DeleteCollection(name.to_string()))?;
        state
            .collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SearchIndexError::NotFound(format!("collection {name}")))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let mut state = self.state.write().unwrap();
        state.record(Operation::ListCollections)?;
        Ok(state
            .collections
            .iter()
            .map(|(name, collection)| CollectionSummary {
                name: name.clone(),
                num_documents: collection.documents.len() as u64,
            })
            .collect())
    }

    async fn upsert_document(&self, collection: &str, document: &SearchDocument) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.record(Operation::UpsertDocument {
            collection: collection.to_string(),
            id: document.id.clone(),
        })?;
        state
            .collection_mut(collection)?
            .documents
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        document: &SearchDocument,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.record(Operation::UpdateDocument {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        let existing = state
            .collection_mut(collection)?
            .documents
            .get_mut(id)
            .ok_or_else(|| SearchIndexError::NotFound(format!("document {id}")))?;
        *existing = document.clone();
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.record(Operation::DeleteDocument {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        state
            .collection_mut(collection)?
            .documents
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SearchIndexError::NotFound(format!("document {id}")))
    }

    async fn import_documents(
        &self,
        collection: &str,
        documents: &[SearchDocument],
        batch_size: usize,
    ) -> Result<usize> {
        let mut state = self.state.write().unwrap();
        state.record(Operation::Import {
            collection: collection.to_string(),
            documents: documents.len(),
            batch_size,
        })?;
        let target = state.collection_mut(collection)?;
        for document in documents {
            target
                .documents
                .insert(document.id.clone(), document.clone());
        }
        Ok(documents.len())
    }

    async fn upsert_alias(&self, alias: &str, collection: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.record(Operation::UpsertAlias {
            alias: alias.to_string(),
            collection: collection.to_string(),
        })?;
        if !state.collections.contains_key(collection) {
            return Err(SearchIndexError::NotFound(format!("collection {collection}")));
        }
        state
            .aliases
            .insert(alias.to_string(), collection.to_string());
        Ok(())
    }
}
