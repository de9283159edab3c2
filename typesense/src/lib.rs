//! Typesense implementation of [`SearchIndex`](equipment_search_core::search::SearchIndex).
//!
//! # Overview
//!
//! [`TypesenseClient`] talks to a single Typesense node over its REST API:
//!
//! | Operation | Request |
//! |---|---|
//! | `create_collection` | `POST /collections` |
//! | `delete_collection` | `DELETE /collections/{name}` |
//! | `list_collections` | `GET /collections` |
//! | `upsert_document` | `POST /collections/{c}/documents?action=upsert` |
//! | `update_document` | `PATCH /collections/{c}/documents/{id}` |
//! | `delete_document` | `DELETE /collections/{c}/documents/{id}` |
//! | `import_documents` | `POST /collections/{c}/documents/import?action=upsert&batch_size=N` |
//! | `upsert_alias` | `PUT /aliases/{alias}` |
//!
//! `404` maps to `SearchIndexError::NotFound`, `409` to `SearchIndexError::Conflict`, any
//! other non-success status to `SearchIndexError::Api`. Requests are never retried.

pub mod client;
pub mod import;

pub use client::{TypesenseClient, TypesenseClientBuilder};
