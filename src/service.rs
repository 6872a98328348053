use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use time::OffsetDateTime;

use crate::graph::{Graph, GraphError};
use crate::models::{EntryId, TagId, Vector};
use crate::store::{Store, StoreError};

/// Title given to entries created from the client.
pub const NEW_ENTRY_TITLE: &str = "New entry";

/// Errors from knowledge-base operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("store request failed: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Service layer over the graph and its backing store.
///
/// KnowledgeBase owns both the in-memory [`Graph`] and the [`Store`] it
/// mirrors. Structural operations (creating, deleting and moving tags,
/// creating and deleting entries) call the store first and touch the graph
/// only once the store has confirmed. Content edits (titles, bodies, entry
/// categories and tag names) are applied locally first and then mirrored; if
/// the store call fails the local change stays and the error is returned.
///
/// # Examples
///
/// ```
/// use tagmap::store::InMemoryStore;
/// use tagmap::{KnowledgeBase, Snapshot, TagId, TagRecord, Vector};
///
/// # fn main() -> anyhow::Result<()> {
/// let store = InMemoryStore::from_snapshot(Snapshot {
///     tags: vec![TagRecord::new(TagId::new(1), "main")],
///     entries: vec![],
/// });
/// let mut kb = KnowledgeBase::load(Box::new(store), Vector::new(4000.0, 4000.0))?;
///
/// let child = kb.create_tag(TagId::new(1))?;
/// assert_eq!(kb.graph().tag(child).unwrap().name(), "new-2");
/// # Ok(())
/// # }
/// ```
pub struct KnowledgeBase {
    graph: Graph,
    store: Box<dyn Store>,
    rng: StdRng,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

impl KnowledgeBase {
    /// Fetches the full snapshot from `store` and builds the graph around `center`.
    pub fn load(store: Box<dyn Store>, center: Vector) -> Result<Self> {
        Self::load_with_rng(store, center, StdRng::from_entropy())
    }

    /// Like [`load`](Self::load) with a caller-provided random source, so
    /// placement is reproducible.
    pub fn load_with_rng(store: Box<dyn Store>, center: Vector, mut rng: StdRng) -> Result<Self> {
        let snapshot = store.fetch_all()?;
        let graph = Graph::load(&snapshot, center, &mut rng)?;
        log::info!(
            "event=kb_load tags={} entries={} status=ok",
            graph.tag_count(),
            graph.entry_count()
        );
        Ok(Self { graph, store, rng })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Direct graph access for edits that never reach the store
    /// (selection, positions, the detach half of a reparent gesture).
    pub(crate) fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn select_tag(&mut self, id: TagId) -> Result<()> {
        Ok(self.graph.select_tag(id)?)
    }

    /// Creates a child tag under `parent`. The server picks the id and name.
    pub fn create_tag(&mut self, parent: TagId) -> Result<TagId> {
        self.graph
            .tag(parent)
            .ok_or(GraphError::UnknownTag(parent))?;
        let record = self.store.create_tag(None, parent).inspect_err(|e| {
            log::warn!("event=tag_create parent={} status=error error={}", parent, e);
        })?;
        self.graph.insert_tag(&record, parent, &mut self.rng)?;
        log::info!(
            "event=tag_create id={} parent={} status=ok",
            record.id,
            parent
        );
        Ok(record.id)
    }

    /// Deletes a tag with its whole subtree and every entry in it.
    pub fn delete_tag(&mut self, id: TagId) -> Result<()> {
        self.graph.check_removable(id)?;
        self.store.delete_tag(id).inspect_err(|e| {
            log::warn!("event=tag_delete id={} status=error error={}", id, e);
        })?;
        let removed = self.graph.remove_subtree(id)?;
        log::info!(
            "event=tag_delete id={} tags={} entries={} status=ok",
            id,
            removed.tags.len(),
            removed.entries.len()
        );
        Ok(())
    }

    /// Moves a tag under a new parent once the store has accepted the move.
    ///
    /// Works for attached tags and for tags detached mid-gesture.
    pub fn reparent_tag(&mut self, id: TagId, parent: TagId) -> Result<()> {
        self.graph.check_reparent(id, parent)?;
        let name = self
            .graph
            .tag(id)
            .map(|tag| tag.name().to_string())
            .ok_or(GraphError::UnknownTag(id))?;
        self.store
            .edit_tag(id, &name, Some(parent))
            .inspect_err(|e| {
                log::warn!(
                    "event=tag_reparent id={} parent={} status=error error={}",
                    id,
                    parent,
                    e
                );
            })?;
        self.graph.reparent_tag(id, parent)?;
        log::info!("event=tag_reparent id={} parent={} status=ok", id, parent);
        Ok(())
    }

    /// Renames a tag locally, then mirrors the new name to the store.
    pub fn rename_tag(&mut self, id: TagId, name: &str) -> Result<()> {
        self.graph.rename_tag(id, name)?;
        let parent = self.graph.tag(id).and_then(|tag| tag.parent());
        self.mirror("tag_rename", |store| store.edit_tag(id, name, parent))
    }

    /// Creates an entry titled "New entry" under the selected tag.
    pub fn create_entry(&mut self) -> Result<EntryId> {
        let parent = self.graph.selected().ok_or(GraphError::NoSelection)?;
        let record = self
            .store
            .create_entry(parent, NEW_ENTRY_TITLE)
            .inspect_err(|e| {
                log::warn!("event=entry_create parent={} status=error error={}", parent, e);
            })?;
        let id = record.id;
        self.graph.insert_entry(record)?;
        log::info!("event=entry_create id={} parent={} status=ok", id, parent);
        Ok(id)
    }

    pub fn delete_entry(&mut self, id: EntryId) -> Result<()> {
        self.graph.entry(id).ok_or(GraphError::UnknownEntry(id))?;
        self.store.delete_entry(id).inspect_err(|e| {
            log::warn!("event=entry_delete id={} status=error error={}", id, e);
        })?;
        self.graph.remove_entry(id, OffsetDateTime::now_utc())?;
        log::info!("event=entry_delete id={} status=ok", id);
        Ok(())
    }

    pub fn update_entry_title(&mut self, id: EntryId, title: &str) -> Result<()> {
        self.graph
            .set_entry_title(id, title, OffsetDateTime::now_utc())?;
        self.mirror_entry(id)
    }

    pub fn update_entry_content(&mut self, id: EntryId, content: &str) -> Result<()> {
        self.graph
            .set_entry_content(id, content, OffsetDateTime::now_utc())?;
        self.mirror_entry(id)
    }

    /// Refiles an entry under `tag` locally, then tells the store by tag name.
    pub fn change_entry_parent(&mut self, id: EntryId, tag: TagId) -> Result<()> {
        self.graph.move_entry(id, tag, OffsetDateTime::now_utc())?;
        let name = self
            .graph
            .tag(tag)
            .map(|tag| tag.name().to_string())
            .ok_or(GraphError::UnknownTag(tag))?;
        self.mirror("entry_move", |store| {
            store.update_entry_category(id, &name)
        })
    }

    fn mirror_entry(&self, id: EntryId) -> Result<()> {
        let entry = self.graph.entry(id).ok_or(GraphError::UnknownEntry(id))?;
        let (title, content) = (entry.title(), entry.content());
        self.mirror("entry_update", |store| {
            store.update_entry(id, title, content)
        })
    }

    /// Sends an already-applied edit to the store, logging the outcome.
    fn mirror(
        &self,
        event: &str,
        call: impl FnOnce(&dyn Store) -> std::result::Result<(), StoreError>,
    ) -> Result<()> {
        match call(self.store.as_ref()) {
            Ok(()) => {
                log::debug!("event={} status=ok", event);
                Ok(())
            }
            Err(e) => {
                log::warn!("event={} status=error error={}", event, e);
                Err(e.into())
            }
        }
    }
}
