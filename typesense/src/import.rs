//! JSONL encoding of bulk imports and decoding of their per-document results.
//!
//! Typesense answers an import with `200 OK` even when documents are rejected; the body
//! holds one result line per submitted document:
//!
//! ```text
//! {"success": true}
//! {"success": false, "error": "Bad JSON.", "document": "..."}
//! ```

use equipment_search_core::search::{Result, SearchDocument, SearchIndexError};
use serde::Deserialize;

/// One result line of an import response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportLine {
    /// Whether the document was imported
    pub success: bool,
    /// Rejection reason
    #[serde(default)]
    pub error: Option<String>,
}

/// Encode documents as newline-delimited JSON.
///
/// # Errors
///
/// Returns [`SearchIndexError::Serialization`] if a document cannot be encoded.
pub fn encode_jsonl(documents: &[SearchDocument]) -> Result<String> {
    let lines = documents
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SearchIndexError::Serialization(e.to_string()))?;
    Ok(lines.join("\n"))
}

/// Count successful lines, failing if any document was rejected.
///
/// # Errors
///
/// Returns [`SearchIndexError::Import`] with the number of rejected documents and the
/// first reported error.
pub fn summarize(collection: &str, lines: &[ImportLine]) -> Result<usize> {
    let failed: Vec<&ImportLine> = lines.iter().filter(|line| !line.success).collect();
    match failed.first() {
        None => Ok(lines.len()),
        Some(first) => Err(SearchIndexError::Import {
            collection: collection.to_string(),
            failed: failed.len(),
            first_error: first
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        }),
    }
}
