use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use time::OffsetDateTime;

use super::{Store, StoreError};
use crate::models::{EntryId, EntryRecord, Snapshot, TagId, TagRecord};

/// A store call as observed by [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    FetchAll,
    CreateTag {
        name: Option<String>,
        parent: TagId,
    },
    EditTag {
        id: TagId,
        name: String,
        parent: Option<TagId>,
    },
    DeleteTag(TagId),
    CreateEntry {
        parent: TagId,
        title: String,
    },
    UpdateEntry {
        id: EntryId,
        title: String,
        content: String,
    },
    UpdateEntryCategory {
        id: EntryId,
        tag: String,
    },
    DeleteEntry(EntryId),
}

#[derive(Debug, Default)]
struct State {
    snapshot: Snapshot,
    calls: Vec<StoreCall>,
    failing: bool,
}

/// Server-like store kept in memory.
///
/// Assigns ids the way the server does (one past the current maximum), logs
/// every call in order, and can be switched into a failing mode where every
/// call returns [`StoreError::Unavailable`] after being logged.
///
/// # Examples
///
/// ```
/// use tagmap::store::{InMemoryStore, Store, StoreCall};
/// use tagmap::{Snapshot, TagId, TagRecord};
///
/// let store = InMemoryStore::from_snapshot(Snapshot {
///     tags: vec![TagRecord::new(TagId::new(1), "main")],
///     entries: vec![],
/// });
///
/// let tag = store.create_tag(None, TagId::new(1)).unwrap();
/// assert_eq!(tag.name, "new-2");
/// assert_eq!(
///     store.calls(),
///     vec![StoreCall::CreateTag { name: None, parent: TagId::new(1) }]
/// );
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(State {
                snapshot,
                ..State::default()
            }),
        }
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Makes every subsequent call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Copy of the current server-side state.
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Logs `call` and returns the state unless the store is failing.
    fn begin(&self, call: StoreCall) -> Result<MutexGuard<'_, State>, StoreError> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.failing {
            return Err(StoreError::Unavailable);
        }
        Ok(state)
    }
}

impl State {
    fn tag_mut(&mut self, id: TagId) -> Result<&mut TagRecord, StoreError> {
        self.snapshot
            .tags
            .iter_mut()
            .find(|tag| tag.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("tag {id}")))
    }

    fn entry_mut(&mut self, id: EntryId) -> Result<&mut EntryRecord, StoreError> {
        self.snapshot
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("entry {id}")))
    }

    fn next_tag_id(&self) -> TagId {
        let max = self.snapshot.tags.iter().map(|tag| tag.id.get()).max();
        TagId::new(max.unwrap_or(0) + 1)
    }

    fn next_entry_id(&self) -> EntryId {
        let max = self.snapshot.entries.iter().map(|entry| entry.id.get()).max();
        EntryId::new(max.unwrap_or(0) + 1)
    }

    fn unlink_child(&mut self, child: TagId) {
        for tag in &mut self.snapshot.tags {
            tag.children.retain(|&id| id != child);
        }
    }

    fn subtree(&self, id: TagId) -> HashSet<TagId> {
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(tag) = self.snapshot.tags.iter().find(|tag| tag.id == current) {
                stack.extend(tag.children.iter().copied());
            }
        }
        seen
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

impl Store for InMemoryStore {
    fn fetch_all(&self) -> Result<Snapshot, StoreError> {
        let state = self.begin(StoreCall::FetchAll)?;
        Ok(state.snapshot.clone())
    }

    fn create_tag(&self, name: Option<&str>, parent: TagId) -> Result<TagRecord, StoreError> {
        let mut state = self.begin(StoreCall::CreateTag {
            name: name.map(str::to_string),
            parent,
        })?;
        let id = state.next_tag_id();
        state.tag_mut(parent)?.children.push(id);

        let name = name.map_or_else(|| format!("new-{id}"), str::to_string);
        let mut record = TagRecord::new(id, name);
        record.modified_at = Some(now());
        state.snapshot.tags.push(record.clone());
        Ok(record)
    }

    fn edit_tag(&self, id: TagId, name: &str, parent: Option<TagId>) -> Result<(), StoreError> {
        let mut state = self.begin(StoreCall::EditTag {
            id,
            name: name.to_string(),
            parent,
        })?;
        if let Some(parent) = parent {
            state.tag_mut(parent)?;
        }
        let tag = state.tag_mut(id)?;
        tag.name = name.to_string();
        tag.modified_at = Some(now());

        if let Some(parent) = parent
            && !state.tag_mut(parent)?.children.contains(&id)
        {
            state.unlink_child(id);
            state.tag_mut(parent)?.children.push(id);
        }
        Ok(())
    }

    fn delete_tag(&self, id: TagId) -> Result<(), StoreError> {
        let mut state = self.begin(StoreCall::DeleteTag(id))?;
        state.tag_mut(id)?;
        let doomed = state.subtree(id);
        state.unlink_child(id);
        state.snapshot.tags.retain(|tag| !doomed.contains(&tag.id));
        state
            .snapshot
            .entries
            .retain(|entry| !doomed.contains(&entry.category));
        Ok(())
    }

    fn create_entry(&self, parent: TagId, title: &str) -> Result<EntryRecord, StoreError> {
        let mut state = self.begin(StoreCall::CreateEntry {
            parent,
            title: title.to_string(),
        })?;
        state.tag_mut(parent)?;
        let at = now();
        let record = EntryRecord {
            id: state.next_entry_id(),
            title: title.to_string(),
            content: String::new(),
            created_at: at,
            modified_at: at,
            category: parent,
        };
        state.snapshot.entries.push(record.clone());
        Ok(record)
    }

    fn update_entry(&self, id: EntryId, title: &str, content: &str) -> Result<(), StoreError> {
        let mut state = self.begin(StoreCall::UpdateEntry {
            id,
            title: title.to_string(),
            content: content.to_string(),
        })?;
        let entry = state.entry_mut(id)?;
        entry.title = title.to_string();
        entry.content = content.to_string();
        entry.modified_at = now();
        Ok(())
    }

    fn update_entry_category(&self, id: EntryId, tag_name: &str) -> Result<(), StoreError> {
        let mut state = self.begin(StoreCall::UpdateEntryCategory {
            id,
            tag: tag_name.to_string(),
        })?;
        let category = state
            .snapshot
            .tags
            .iter()
            .find(|tag| tag.name == tag_name)
            .map(|tag| tag.id)
            .ok_or_else(|| StoreError::NotFound(format!("tag named {tag_name}")))?;
        let entry = state.entry_mut(id)?;
        entry.category = category;
        entry.modified_at = now();
        Ok(())
    }

    fn delete_entry(&self, id: EntryId) -> Result<(), StoreError> {
        let mut state = self.begin(StoreCall::DeleteEntry(id))?;
        state.entry_mut(id)?;
        state.snapshot.entries.retain(|entry| entry.id != id);
        Ok(())
    }
}
