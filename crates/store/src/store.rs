//! The document store contract
//!
//! Backends guarantee that subscription updates for a given document are
//! delivered in write order. There is no cross-document ordering guarantee,
//! and consumers must tolerate duplicate delivery of the same logical
//! update; all writes in this contract are idempotent upserts, not deltas.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::path::{CollectionPath, DocPath};

/// A document snapshot: store-assigned id plus JSON payload
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document id (final path segment)
    pub id: String,

    /// Document payload (always a JSON object)
    pub data: Value,
}

/// Outcome of [`DocumentStore::create_if_absent`]
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// No document existed; the provided payload was written
    Created,

    /// A document already existed; its current payload is returned and the
    /// provided payload was NOT written
    Existing(Value),
}

impl CreateOutcome {
    /// Whether this call won the creation
    pub fn created(&self) -> bool {
        matches!(self, CreateOutcome::Created)
    }
}

/// Stream of snapshots for a single document
///
/// The current state (possibly `None`) is delivered immediately on
/// subscribe, then once per write in write order. Dropping the
/// subscription releases it.
pub struct DocSubscription {
    rx: mpsc::UnboundedReceiver<Option<Value>>,
}

impl DocSubscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Option<Value>>) -> Self {
        Self { rx }
    }

    /// Next snapshot: `Some(None)` means the document does not exist,
    /// `None` means the store side closed the subscription.
    pub async fn next(&mut self) -> Option<Option<Value>> {
        self.rx.recv().await
    }
}

/// Stream of full snapshots for a collection
///
/// Each update carries every document in the collection in insertion
/// order; consumers needing "newly appended" semantics track how far they
/// have read. The current snapshot is delivered immediately on subscribe.
pub struct CollectionSubscription {
    rx: mpsc::UnboundedReceiver<Vec<Document>>,
}

impl CollectionSubscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Vec<Document>>) -> Self {
        Self { rx }
    }

    /// Next collection snapshot, or `None` if the store side closed the
    /// subscription.
    pub async fn next(&mut self) -> Option<Vec<Document>> {
        self.rx.recv().await
    }
}

/// Async contract for the shared document database
///
/// All payloads are JSON objects. `set` overwrites, `merge` upserts
/// field-by-field, `update` merges into an existing document only.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document, `None` if it does not exist
    async fn get(&self, doc: &DocPath) -> Result<Option<Value>>;

    /// Create or fully overwrite a document
    async fn set(&self, doc: &DocPath, value: Value) -> Result<()>;

    /// Create or merge into a document (top-level fields of `value` replace
    /// the corresponding fields; other fields are preserved)
    async fn merge(&self, doc: &DocPath, value: Value) -> Result<()>;

    /// Merge into an existing document; fails with `NotFound` otherwise
    async fn update(&self, doc: &DocPath, value: Value) -> Result<()>;

    /// Atomically create the document if absent, otherwise return the
    /// existing payload untouched
    async fn create_if_absent(&self, doc: &DocPath, value: Value) -> Result<CreateOutcome>;

    /// Delete a document (idempotent; deleting a missing document is Ok)
    async fn delete(&self, doc: &DocPath) -> Result<()>;

    /// Append a document with a store-assigned id; returns the new id
    async fn add(&self, collection: &CollectionPath, value: Value) -> Result<String>;

    /// Subscribe to a single document
    async fn watch_doc(&self, doc: &DocPath) -> Result<DocSubscription>;

    /// Subscribe to a collection
    async fn watch_collection(&self, collection: &CollectionPath) -> Result<CollectionSubscription>;
}
