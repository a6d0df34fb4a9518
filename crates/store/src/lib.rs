//! Document store contract for WatchParty rooms
//!
//! This crate defines the storage abstraction the coordination engines are
//! built against: a document database with per-room documents and
//! sub-collections, merge upserts, and subscribe-for-changes delivery in
//! write order per document.
//!
//! The crate is a pure contract plus one backend:
//! - [`DocumentStore`], the async trait every backend implements
//! - [`MemoryStore`], an in-process backend used by tests, examples, and
//!   single-host deployments
//!
//! Engines never talk to a concrete database; they receive an
//! `Arc<dyn DocumentStore>` at construction time.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use watchparty_store::{CollectionPath, DocumentStore, MemoryStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> watchparty_store::Result<()> {
//! let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
//!
//! let rooms = CollectionPath::root("rooms");
//! let room_id = store.add(&rooms, json!({"status": "pause"})).await?;
//!
//! let doc = store.get(&rooms.doc(&room_id)).await?;
//! assert!(doc.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

mod error;
mod memory;
mod path;
mod store;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use path::{CollectionPath, DocPath};
pub use store::{
    CollectionSubscription, CreateOutcome, DocSubscription, Document, DocumentStore,
};
