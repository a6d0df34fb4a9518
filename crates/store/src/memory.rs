//! In-process store backend
//!
//! A single mutex serializes all writes, so per-document (in fact global)
//! write order of subscription delivery falls out of the locking. Intended
//! for tests, examples, and single-host deployments; the contract it
//! implements is the same one a remote backend would.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::path::{CollectionPath, DocPath};
use crate::store::{
    CollectionSubscription, CreateOutcome, DocSubscription, Document, DocumentStore,
};

#[derive(Default)]
struct Inner {
    /// Document path -> payload
    docs: HashMap<String, Value>,

    /// Collection path -> document ids in insertion order
    order: HashMap<String, Vec<String>>,

    /// Document path -> subscribers
    doc_watchers: HashMap<String, Vec<mpsc::UnboundedSender<Option<Value>>>>,

    /// Collection path -> subscribers
    coll_watchers: HashMap<String, Vec<mpsc::UnboundedSender<Vec<Document>>>>,
}

impl Inner {
    fn collection_snapshot(&self, collection: &str) -> Vec<Document> {
        let Some(ids) = self.order.get(collection) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| {
                let path = format!("{}/{}", collection, id);
                self.docs.get(&path).map(|data| Document {
                    id: id.clone(),
                    data: data.clone(),
                })
            })
            .collect()
    }

    fn notify_doc(&mut self, doc: &DocPath) {
        let snapshot = self.docs.get(doc.as_str()).cloned();
        if let Some(watchers) = self.doc_watchers.get_mut(doc.as_str()) {
            watchers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }

    fn notify_collection(&mut self, collection: &CollectionPath) {
        let snapshot = self.collection_snapshot(collection.as_str());
        if let Some(watchers) = self.coll_watchers.get_mut(collection.as_str()) {
            watchers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }

    fn insert(&mut self, doc: &DocPath, value: Value) {
        let parent = doc.parent();
        let ids = self.order.entry(parent.as_str().to_string()).or_default();
        if !ids.iter().any(|id| id == doc.id()) {
            ids.push(doc.id().to_string());
        }
        self.docs.insert(doc.as_str().to_string(), value);
        self.notify_doc(doc);
        self.notify_collection(&parent);
    }
}

/// In-memory [`DocumentStore`] backend
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn require_object(value: &Value) -> Result<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(Error::InvalidPayload(format!(
            "expected a JSON object, got {}",
            value
        )))
    }
}

fn merge_into(target: &mut Value, patch: Value) {
    match (target.as_object_mut(), patch) {
        (Some(map), Value::Object(fields)) => {
            for (key, field) in fields {
                map.insert(key, field);
            }
        }
        (_, patch) => *target = patch,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, doc: &DocPath) -> Result<Option<Value>> {
        Ok(self.inner.lock().docs.get(doc.as_str()).cloned())
    }

    async fn set(&self, doc: &DocPath, value: Value) -> Result<()> {
        require_object(&value)?;
        self.inner.lock().insert(doc, value);
        Ok(())
    }

    async fn merge(&self, doc: &DocPath, value: Value) -> Result<()> {
        require_object(&value)?;
        let mut inner = self.inner.lock();
        let mut merged = inner
            .docs
            .get(doc.as_str())
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        merge_into(&mut merged, value);
        inner.insert(doc, merged);
        Ok(())
    }

    async fn update(&self, doc: &DocPath, value: Value) -> Result<()> {
        require_object(&value)?;
        let mut inner = self.inner.lock();
        let Some(mut existing) = inner.docs.get(doc.as_str()).cloned() else {
            return Err(Error::NotFound(doc.to_string()));
        };
        merge_into(&mut existing, value);
        inner.insert(doc, existing);
        Ok(())
    }

    async fn create_if_absent(&self, doc: &DocPath, value: Value) -> Result<CreateOutcome> {
        require_object(&value)?;
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.docs.get(doc.as_str()) {
            return Ok(CreateOutcome::Existing(existing.clone()));
        }
        inner.insert(doc, value);
        Ok(CreateOutcome::Created)
    }

    async fn delete(&self, doc: &DocPath) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.docs.remove(doc.as_str()).is_none() {
            return Ok(());
        }
        let parent = doc.parent();
        if let Some(ids) = inner.order.get_mut(parent.as_str()) {
            ids.retain(|id| id != doc.id());
        }
        inner.notify_doc(doc);
        inner.notify_collection(&parent);
        Ok(())
    }

    async fn add(&self, collection: &CollectionPath, value: Value) -> Result<String> {
        require_object(&value)?;
        let id = uuid::Uuid::new_v4().to_string();
        self.inner.lock().insert(&collection.doc(&id), value);
        Ok(id)
    }

    async fn watch_doc(&self, doc: &DocPath) -> Result<DocSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let snapshot = inner.docs.get(doc.as_str()).cloned();
        let _ = tx.send(snapshot);
        inner
            .doc_watchers
            .entry(doc.as_str().to_string())
            .or_default()
            .push(tx);
        debug!(path = %doc, "document subscription opened");
        Ok(DocSubscription::new(rx))
    }

    async fn watch_collection(&self, collection: &CollectionPath) -> Result<CollectionSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let snapshot = inner.collection_snapshot(collection.as_str());
        let _ = tx.send(snapshot);
        inner
            .coll_watchers
            .entry(collection.as_str().to_string())
            .or_default()
            .push(tx);
        debug!(path = %collection, "collection subscription opened");
        Ok(CollectionSubscription::new(rx))
    }
}
