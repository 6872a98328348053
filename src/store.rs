/// Persistence seam for the knowledge base.
///
/// The [`Store`] trait mirrors the remote REST API. `HttpStore` talks to the
/// real server; `InMemoryStore` backs tests and offline snapshot browsing.
mod client;
mod memory;

use std::sync::Arc;

use thiserror::Error;

use crate::models::{EntryId, EntryRecord, Snapshot, TagId, TagRecord};

pub use client::{DEFAULT_HOST, HttpStore, HttpStoreBuilder};
pub use memory::{InMemoryStore, StoreCall};

/// Errors that can occur when talking to a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The store refused a request naming something it does not hold
    #[error("Not found: {0}")]
    NotFound(String),

    /// The store is unreachable
    #[error("Store unavailable")]
    Unavailable,
}

/// Operations offered by the knowledge-base backend.
///
/// Creation calls return the server's record so callers never invent ids.
/// Every call is attempted exactly once.
pub trait Store: Send + Sync {
    /// Downloads every tag and entry.
    fn fetch_all(&self) -> Result<Snapshot, StoreError>;

    /// Creates a child of `parent`. Without a name the server assigns `new-<id>`.
    fn create_tag(&self, name: Option<&str>, parent: TagId) -> Result<TagRecord, StoreError>;

    /// Renames and/or moves a tag. `parent` is `None` only for the root.
    fn edit_tag(&self, id: TagId, name: &str, parent: Option<TagId>) -> Result<(), StoreError>;

    /// Deletes a tag, its descendants and every entry under them.
    fn delete_tag(&self, id: TagId) -> Result<(), StoreError>;

    fn create_entry(&self, parent: TagId, title: &str) -> Result<EntryRecord, StoreError>;

    fn update_entry(&self, id: EntryId, title: &str, content: &str) -> Result<(), StoreError>;

    /// Refiles an entry; the server identifies the new tag by name.
    fn update_entry_category(&self, id: EntryId, tag_name: &str) -> Result<(), StoreError>;

    fn delete_entry(&self, id: EntryId) -> Result<(), StoreError>;
}

/// Shared handles delegate to the underlying store, so a caller can keep an
/// `Arc` to inspect a store it has handed to a `KnowledgeBase`.
impl<S: Store + ?Sized> Store for Arc<S> {
    fn fetch_all(&self) -> Result<Snapshot, StoreError> {
        (**self).fetch_all()
    }

    fn create_tag(&self, name: Option<&str>, parent: TagId) -> Result<TagRecord, StoreError> {
        (**self).create_tag(name, parent)
    }

    fn edit_tag(&self, id: TagId, name: &str, parent: Option<TagId>) -> Result<(), StoreError> {
        (**self).edit_tag(id, name, parent)
    }

    fn delete_tag(&self, id: TagId) -> Result<(), StoreError> {
        (**self).delete_tag(id)
    }

    fn create_entry(&self, parent: TagId, title: &str) -> Result<EntryRecord, StoreError> {
        (**self).create_entry(parent, title)
    }

    fn update_entry(&self, id: EntryId, title: &str, content: &str) -> Result<(), StoreError> {
        (**self).update_entry(id, title, content)
    }

    fn update_entry_category(&self, id: EntryId, tag_name: &str) -> Result<(), StoreError> {
        (**self).update_entry_category(id, tag_name)
    }

    fn delete_entry(&self, id: EntryId) -> Result<(), StoreError> {
        (**self).delete_entry(id)
    }
}
