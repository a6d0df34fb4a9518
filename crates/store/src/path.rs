//! Document and collection path types
//!
//! Paths alternate collection and document segments, Firestore style:
//! `rooms` is a collection, `rooms/{roomId}` a document,
//! `rooms/{roomId}/chat` a sub-collection. Segments must not contain `/`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Path to an ordered collection of documents
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionPath(String);

/// Path to a single document inside a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocPath(String);

impl CollectionPath {
    /// Create a top-level collection path
    pub fn root(name: &str) -> Self {
        debug_assert!(!name.is_empty() && !name.contains('/'));
        Self(name.to_string())
    }

    /// Path to a document in this collection
    pub fn doc(&self, id: &str) -> DocPath {
        debug_assert!(!id.is_empty() && !id.contains('/'));
        DocPath(format!("{}/{}", self.0, id))
    }

    /// Full slash-separated path string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DocPath {
    /// Path to a sub-collection of this document
    pub fn collection(&self, name: &str) -> CollectionPath {
        debug_assert!(!name.is_empty() && !name.contains('/'));
        CollectionPath(format!("{}/{}", self.0, name))
    }

    /// The document id (final path segment)
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The collection this document belongs to
    pub fn parent(&self) -> CollectionPath {
        match self.0.rfind('/') {
            Some(idx) => CollectionPath(self.0[..idx].to_string()),
            None => CollectionPath(self.0.clone()),
        }
    }

    /// Full slash-separated path string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
