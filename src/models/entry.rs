use time::OffsetDateTime;

use super::{EntryId, EntryRecord, TagId};

/// A short text entry filed under exactly one tag.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryNode {
    pub(crate) id: EntryId,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) category: TagId,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) modified_at: OffsetDateTime,
}

impl EntryNode {
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// The owning tag.
    pub fn category(&self) -> TagId {
        self.category
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn modified_at(&self) -> OffsetDateTime {
        self.modified_at
    }
}

impl From<EntryRecord> for EntryNode {
    fn from(record: EntryRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            content: record.content,
            category: record.category,
            created_at: record.created_at,
            modified_at: record.modified_at,
        }
    }
}

impl From<&EntryNode> for EntryRecord {
    fn from(entry: &EntryNode) -> Self {
        EntryRecord {
            id: entry.id,
            title: entry.title.clone(),
            content: entry.content.clone(),
            category: entry.category,
            created_at: entry.created_at,
            modified_at: entry.modified_at,
        }
    }
}
